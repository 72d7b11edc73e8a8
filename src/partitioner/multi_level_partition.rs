//! Compact multi-level cell index.
//!
//! The cell ids of all levels of one node are packed into a single 64bit
//! `PartitionId`, one bit range per level. Cell ids are renumbered to
//! consecutive integers per level such that children of one parent are
//! numbered contiguously, and a sentinel entry behind the last node carries
//! the per-level cell counts.

use super::{CellId, LevelId, PartitionId};
use crate::datastr::graph::NodeId;
use crate::io::*;

#[derive(Debug)]
pub struct MultiLevelPartition {
    // per node, plus the sentinel entry in the end
    partition: Vec<PartitionId>,
    // number of cells per level index (level - 1)
    lidx_to_num_cells: Vec<u32>,
    // for each cell of level l < top, its parent cell at level l + 1
    cell_to_parent: Vec<CellId>,
    // derived, not persisted
    lidx_to_offset: Vec<u8>,
    lidx_to_mask: Vec<PartitionId>,
    lidx_to_parent_offset: Vec<u32>,
}

impl MultiLevelPartition {
    /// Build the index from one cell id array per level (finest first, as
    /// produced by `bisection_to_partition`) and the per-level cell counts.
    pub fn new(partitions: &[Vec<CellId>], lidx_to_num_cells: &[u32]) -> MultiLevelPartition {
        assert!(!partitions.is_empty());
        assert_eq!(partitions.len(), lidx_to_num_cells.len());
        let num_nodes = partitions[0].len();

        let (lidx_to_offset, lidx_to_mask) = make_level_offsets(lidx_to_num_cells);

        let mut result = MultiLevelPartition {
            partition: vec![0; num_nodes + 1],
            lidx_to_num_cells: lidx_to_num_cells.to_vec(),
            cell_to_parent: Vec::new(),
            lidx_to_offset,
            lidx_to_mask,
            lidx_to_parent_offset: make_parent_offsets(lidx_to_num_cells),
        };

        // Sort nodes by cell id once per level, bottom up. After the last
        // round the node order groups parent cells, and within each parent
        // its children, so assigning ids in this order numbers children of
        // one parent contiguously.
        let mut permutation: Vec<NodeId> = (0..num_nodes as NodeId).collect();
        for partition in partitions {
            permutation.sort_by_key(|&node| partition[node as usize]);
        }

        // top down assign new consecutive cell ids
        let sentinel = num_nodes;
        let mut level = partitions.len() as LevelId;
        for partition in partitions.iter().rev() {
            let mut last_cell_id = partition[permutation[0] as usize];
            let mut cell_id: CellId = 0;
            for &node in &permutation {
                if last_cell_id != partition[node as usize] {
                    cell_id += 1;
                    last_cell_id = partition[node as usize];
                }
                result.set_cell(level, node as usize, cell_id);
            }
            // the sentinel stores the number of cells of the level
            result.set_cell(level, sentinel, cell_id + 1);
            level -= 1;
        }

        // record the parent of every non-top-level cell
        result.cell_to_parent = vec![0; result.lidx_to_parent_offset.last().copied().unwrap_or(0) as usize];
        for level in 1..partitions.len() as LevelId {
            let offset = result.lidx_to_parent_offset[usize::from(level) - 1];
            for node in 0..num_nodes as NodeId {
                let child = result.cell(level, node);
                let parent = result.cell(level + 1, node);
                result.cell_to_parent[offset as usize + child as usize] = parent;
            }
        }

        result
    }

    /// Number of levels including the base graph as level 0.
    pub fn num_levels(&self) -> LevelId {
        self.lidx_to_num_cells.len() as LevelId + 1
    }

    pub fn num_nodes(&self) -> usize {
        self.partition.len() - 1
    }

    /// The cell containing the node at the given level. Level must be in `1..num_levels()`.
    pub fn cell(&self, level: LevelId, node: NodeId) -> CellId {
        let lidx = usize::from(level) - 1;
        ((self.partition[node as usize] & self.lidx_to_mask[lidx]) >> self.lidx_to_offset[lidx]) as CellId
    }

    pub fn num_cells(&self, level: LevelId) -> u32 {
        // the sentinel has the highest id of each level
        self.cell(level, self.num_nodes() as NodeId)
    }

    /// The cell at `level + 1` containing all nodes of the given cell at `level`.
    /// Level must be in `1..num_levels() - 1`.
    pub fn parent_cell(&self, level: LevelId, cell: CellId) -> CellId {
        let offset = self.lidx_to_parent_offset[usize::from(level) - 1];
        self.cell_to_parent[offset as usize + cell as usize]
    }

    fn set_cell(&mut self, level: LevelId, node_index: usize, cell: CellId) {
        let lidx = usize::from(level) - 1;
        let shifted = PartitionId::from(cell) << self.lidx_to_offset[lidx];
        debug_assert_eq!(shifted & !self.lidx_to_mask[lidx], 0);
        self.partition[node_index] = (self.partition[node_index] & !self.lidx_to_mask[lidx]) | shifted;
    }
}

/// Bit offsets and masks of each level's id range within a `PartitionId`.
/// A level with c cells gets enough bits to also store the count c itself,
/// which the sentinel needs.
fn make_level_offsets(lidx_to_num_cells: &[u32]) -> (Vec<u8>, Vec<PartitionId>) {
    let mut offsets = Vec::with_capacity(lidx_to_num_cells.len());
    let mut masks = Vec::with_capacity(lidx_to_num_cells.len());
    let mut sum_bits = 0u32;
    for &num_cells in lidx_to_num_cells {
        let bits = u32::BITS - num_cells.leading_zeros();
        assert!(
            sum_bits + bits <= PartitionId::BITS,
            "can't pack the partition information into a 64bit integer, would require {} bits",
            sum_bits + bits
        );
        offsets.push(sum_bits as u8);
        let mask = ((1 as PartitionId) << bits).wrapping_sub(1);
        masks.push(mask << sum_bits);
        sum_bits += bits;
    }
    (offsets, masks)
}

/// Offsets into the flat `cell_to_parent` array, one entry per level below
/// the top, plus a final total size entry.
fn make_parent_offsets(lidx_to_num_cells: &[u32]) -> Vec<u32> {
    let mut offsets = Vec::with_capacity(lidx_to_num_cells.len());
    let mut sum = 0;
    for &num_cells in &lidx_to_num_cells[..lidx_to_num_cells.len() - 1] {
        offsets.push(sum);
        sum += num_cells;
    }
    offsets.push(sum);
    offsets
}

impl Deconstruct for MultiLevelPartition {
    fn store_each(&self, store: &dyn Fn(&str, &dyn Store) -> std::io::Result<()>) -> std::io::Result<()> {
        store("partition_ids", &self.partition)?;
        store("level_cell_counts", &self.lidx_to_num_cells)?;
        store("cell_to_parent", &self.cell_to_parent)?;
        Ok(())
    }
}

impl Reconstruct for MultiLevelPartition {
    fn reconstruct_with(loader: Loader) -> std::io::Result<Self> {
        let partition: Vec<PartitionId> = loader.load("partition_ids")?;
        let lidx_to_num_cells: Vec<u32> = loader.load("level_cell_counts")?;
        let cell_to_parent: Vec<CellId> = loader.load("cell_to_parent")?;
        let (lidx_to_offset, lidx_to_mask) = make_level_offsets(&lidx_to_num_cells);
        let lidx_to_parent_offset = make_parent_offsets(&lidx_to_num_cells);
        Ok(MultiLevelPartition {
            partition,
            lidx_to_num_cells,
            cell_to_parent,
            lidx_to_offset,
            lidx_to_mask,
            lidx_to_parent_offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_level_groups_match() {
        // node:          0  1  2  3  4  5  6  7  8  9 10 11
        let l1 = vec![4, 4, 2, 2, 1, 1, 3, 3, 2, 2, 5, 5];
        let mlp = MultiLevelPartition::new(&[l1], &[6]);

        assert_eq!(mlp.num_levels(), 2);
        for pair in [(0, 1), (2, 3), (4, 5), (6, 7), (8, 9), (10, 11)] {
            assert_eq!(mlp.cell(1, pair.0), mlp.cell(1, pair.1));
        }
        assert_eq!(mlp.cell(1, 2), mlp.cell(1, 8));
        assert_ne!(mlp.cell(1, 0), mlp.cell(1, 2));
    }

    #[test]
    fn shuffled_input_cells_renumber_consistently() {
        // node:          0  1  2  3  4  5  6  7  8  9 10 11
        let l1 = vec![4, 4, 2, 2, 1, 1, 3, 3, 2, 2, 5, 5];
        let l2 = vec![3, 3, 3, 3, 1, 1, 1, 1, 2, 2, 0, 0];
        let l3 = vec![0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 1, 1];
        let l4 = vec![0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        let mlp = MultiLevelPartition::new(&[l1.clone(), l2.clone(), l3.clone(), l4.clone()], &[6, 4, 2, 1]);

        assert_eq!(mlp.num_levels(), 5);
        assert_eq!(mlp.num_cells(1), 6);
        assert_eq!(mlp.num_cells(2), 4);
        assert_eq!(mlp.num_cells(3), 2);
        assert_eq!(mlp.num_cells(4), 1);

        // nodes sharing an input cell within one parent stay together
        for pair in [(0, 1), (2, 3), (4, 5), (6, 7), (8, 9), (10, 11)] {
            assert_eq!(mlp.cell(1, pair.0), mlp.cell(1, pair.1));
        }
        for (level, input) in [(2, &l2), (3, &l3), (4, &l4)] {
            for a in 0..12 {
                for b in 0..12 {
                    assert_eq!(input[a as usize] == input[b as usize], mlp.cell(level, a) == mlp.cell(level, b));
                }
            }
        }
        // input cell 2 of level 1 spans two different level 2 cells, the
        // renumbering pulls it apart to keep the hierarchy nested
        assert_ne!(mlp.cell(1, 2), mlp.cell(1, 8));

        // cell ids are consecutive starting at 0
        for level in 1..5 {
            let mut seen: Vec<CellId> = (0..12).map(|node| mlp.cell(level, node)).collect();
            seen.sort_unstable();
            seen.dedup();
            assert_eq!(seen, (0..mlp.num_cells(level)).collect::<Vec<_>>());
        }
    }

    #[test]
    fn parent_cells_are_consistent_with_node_lookups() {
        let l1 = vec![0, 0, 1, 1, 2, 2, 3, 3];
        let l2 = vec![0, 0, 0, 0, 1, 1, 1, 1];
        let l3 = vec![0, 0, 0, 0, 0, 0, 0, 0];
        let mlp = MultiLevelPartition::new(&[l1, l2, l3], &[4, 2, 1]);

        for node in 0..8 {
            for level in 1..3 {
                assert_eq!(mlp.parent_cell(level, mlp.cell(level, node)), mlp.cell(level + 1, node));
            }
        }
    }

    #[test]
    fn nesting_invariant_on_random_hierarchies() {
        use rand::prelude::*;
        let mut rng = StdRng::seed_from_u64(0xba5eba11);

        for _ in 0..10 {
            let num_nodes = 50;
            // build a random but strictly nested hierarchy bottom up
            let l1: Vec<CellId> = (0..num_nodes).map(|_| rng.gen_range(0..12)).collect();
            let num_l1 = 12;
            let l1_to_l2: Vec<CellId> = (0..num_l1).map(|_| rng.gen_range(0..4)).collect();
            let l2: Vec<CellId> = l1.iter().map(|&cell| l1_to_l2[cell as usize]).collect();
            let l3: Vec<CellId> = vec![0; num_nodes];

            let count = |cells: &[CellId]| {
                let mut distinct = cells.to_vec();
                distinct.sort_unstable();
                distinct.dedup();
                distinct.len() as u32
            };
            // renumber inputs to consecutive ids to get accurate counts
            let compact = |cells: &[CellId]| {
                let mut distinct = cells.to_vec();
                distinct.sort_unstable();
                distinct.dedup();
                cells.iter().map(|cell| distinct.binary_search(cell).unwrap() as CellId).collect::<Vec<_>>()
            };
            let l1 = compact(&l1);
            let l2 = compact(&l2);
            let num_cells = vec![count(&l1), count(&l2), 1];
            let mlp = MultiLevelPartition::new(&[l1, l2, l3], &num_cells);

            for a in 0..num_nodes as NodeId {
                for b in 0..num_nodes as NodeId {
                    // nodes sharing a cell at a lower level share all higher cells
                    if mlp.cell(1, a) == mlp.cell(1, b) {
                        assert_eq!(mlp.cell(2, a), mlp.cell(2, b));
                    }
                    if mlp.cell(2, a) == mlp.cell(2, b) {
                        assert_eq!(mlp.cell(3, a), mlp.cell(3, b));
                    }
                }
            }
            for node in 0..num_nodes as NodeId {
                assert_eq!(mlp.parent_cell(1, mlp.cell(1, node)), mlp.cell(2, node));
                assert_eq!(mlp.parent_cell(2, mlp.cell(2, node)), mlp.cell(3, node));
            }
        }
    }
}
