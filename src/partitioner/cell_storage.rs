//! Per-cell boundary nodes and distance matrices.
//!
//! For every (level, cell) pair the storage keeps the cell's source boundary
//! nodes (boundary nodes which can start paths into the cell - the matrix
//! rows) and destination boundary nodes (boundary nodes reachable within the
//! cell - the columns). The matrix values live in one flat weight vector,
//! the `CellMetric`, filled by the customizer; the structural part is
//! independent of any metric.

use super::multi_level_partition::MultiLevelPartition;
use super::{CellId, LevelId};
use crate::datastr::graph::*;
use crate::io::*;
use rayon::prelude::*;
use std::ops::Range;

/// Offsets and sizes of one cell's slice of the boundary and value arrays.
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct CellData {
    value_offset: u32,
    source_boundary_offset: u32,
    destination_boundary_offset: u32,
    num_source_nodes: u32,
    num_destination_nodes: u32,
}

#[derive(Debug)]
pub struct CellStorage {
    source_boundary: Vec<NodeId>,
    destination_boundary: Vec<NodeId>,
    cells: Vec<CellData>,
    level_to_cell_offset: Vec<u64>,
}

/// The boundary-to-boundary weights of all cells for one set of edge weights.
#[derive(Debug)]
pub struct CellMetric {
    pub weights: Vec<Weight>,
}

/// Read access to one cell's boundary lists and distance matrix.
#[derive(Debug, Clone, Copy)]
pub struct Cell<'a> {
    source: &'a [NodeId],
    destination: &'a [NodeId],
    weights: &'a [Weight],
}

impl CellStorage {
    /// Determine boundary nodes and matrix shapes for every cell of every level.
    pub fn new<G: for<'a> LinkIterGraph<'a>>(partition: &MultiLevelPartition, graph: &G) -> CellStorage {
        let reversed = graph.reverse();

        let mut cells = Vec::new();
        let mut level_to_cell_offset = Vec::new();
        let mut number_of_cells = 0u64;
        for level in 1..partition.num_levels() {
            level_to_cell_offset.push(number_of_cells);
            number_of_cells += u64::from(partition.num_cells(level));
        }
        level_to_cell_offset.push(number_of_cells);
        cells.resize(number_of_cells as usize, CellData::default());

        let mut source_boundary = Vec::new();
        let mut destination_boundary = Vec::new();
        let mut number_of_unconnected = 0usize;

        for level in 1..partition.num_levels() {
            let level_offset = level_to_cell_offset[usize::from(level) - 1] as usize;

            let mut level_source_boundary: Vec<(CellId, NodeId)> = Vec::new();
            let mut level_destination_boundary: Vec<(CellId, NodeId)> = Vec::new();

            for node in 0..graph.num_nodes() as NodeId {
                let cell = partition.cell(level, node);
                let mut is_boundary_node = false;
                let mut is_source_node = false;
                let mut is_destination_node = false;

                for link in graph.neighbor_iter(node) {
                    let same_cell = partition.cell(level, link.node) == cell;
                    is_boundary_node |= !same_cell;
                    is_source_node |= same_cell;
                }
                for link in reversed.neighbor_iter(node) {
                    let same_cell = partition.cell(level, link.node) == cell;
                    is_boundary_node |= !same_cell;
                    is_destination_node |= same_cell;
                }

                if is_boundary_node {
                    if is_source_node {
                        level_source_boundary.push((cell, node));
                    }
                    if is_destination_node {
                        level_destination_boundary.push((cell, node));
                    }
                    // an unconnected boundary node still needs a slot for
                    // correctness, it becomes an empty destination column
                    if !is_source_node && !is_destination_node {
                        number_of_unconnected += 1;
                        level_destination_boundary.push((cell, node));
                    }
                }
            }

            level_source_boundary.par_sort_unstable();
            level_destination_boundary.par_sort_unstable();

            for run in runs_by_cell(&level_source_boundary) {
                let cell = &mut cells[level_offset + level_source_boundary[run.start].0 as usize];
                cell.num_source_nodes = run.len() as u32;
                cell.source_boundary_offset = source_boundary.len() as u32;
                source_boundary.extend(level_source_boundary[run].iter().map(|&(_, node)| node));
            }
            for run in runs_by_cell(&level_destination_boundary) {
                let cell = &mut cells[level_offset + level_destination_boundary[run.start].0 as usize];
                cell.num_destination_nodes = run.len() as u32;
                cell.destination_boundary_offset = destination_boundary.len() as u32;
                destination_boundary.extend(level_destination_boundary[run].iter().map(|&(_, node)| node));
            }
        }

        if number_of_unconnected > 0 {
            eprintln!("warning: {} boundary nodes without incoming or outgoing edges in their cell", number_of_unconnected);
        }

        let mut value_offset = 0u32;
        for cell in &mut cells {
            cell.value_offset = value_offset;
            value_offset += cell.num_source_nodes * cell.num_destination_nodes;
        }

        CellStorage {
            source_boundary,
            destination_boundary,
            cells,
            level_to_cell_offset,
        }
    }

    /// A fresh all-infinity metric matching this storage, one sentinel slot
    /// at the end so empty cells still view valid slices.
    pub fn make_metric(&self) -> CellMetric {
        CellMetric {
            weights: vec![INFINITY; self.total_value_size() + 1],
        }
    }

    pub fn total_value_size(&self) -> usize {
        self.cells
            .last()
            .map(|cell| cell.value_offset as usize + (cell.num_source_nodes * cell.num_destination_nodes) as usize)
            .unwrap_or(0)
    }

    /// The source and destination boundary nodes of a cell.
    pub fn boundary(&self, level: LevelId, cell: CellId) -> (&[NodeId], &[NodeId]) {
        let data = &self.cells[self.cell_index(level, cell)];
        let source_offset = data.source_boundary_offset as usize;
        let destination_offset = data.destination_boundary_offset as usize;
        (
            &self.source_boundary[source_offset..source_offset + data.num_source_nodes as usize],
            &self.destination_boundary[destination_offset..destination_offset + data.num_destination_nodes as usize],
        )
    }

    /// View one cell together with its distance matrix.
    pub fn cell<'a>(&'a self, metric: &'a CellMetric, level: LevelId, cell: CellId) -> Cell<'a> {
        self.cell_from_weights(&metric.weights, level, cell)
    }

    /// Like `cell`, but against any prefix of the metric weights which fully
    /// contains the cell's values. The customizer uses this to read lower
    /// level tables while it writes the current level.
    pub(crate) fn cell_from_weights<'a>(&'a self, weights: &'a [Weight], level: LevelId, cell: CellId) -> Cell<'a> {
        let data = &self.cells[self.cell_index(level, cell)];
        let (source, destination) = self.boundary(level, cell);
        let values = data.value_offset as usize..data.value_offset as usize + (data.num_source_nodes * data.num_destination_nodes) as usize;
        Cell {
            source,
            destination,
            weights: &weights[values],
        }
    }

    /// The indices into `cells` belonging to one level.
    pub(crate) fn cells_of_level(&self, level: LevelId) -> Range<usize> {
        let lidx = usize::from(level) - 1;
        self.level_to_cell_offset[lidx] as usize..self.level_to_cell_offset[lidx + 1] as usize
    }

    /// The slice of the metric value array covered by one level.
    pub(crate) fn value_range_of_level(&self, level: LevelId) -> Range<usize> {
        let cells = self.cells_of_level(level);
        if cells.is_empty() {
            return 0..0;
        }
        let first = &self.cells[cells.start];
        let last = &self.cells[cells.end - 1];
        first.value_offset as usize..last.value_offset as usize + (last.num_source_nodes * last.num_destination_nodes) as usize
    }

    pub(crate) fn matrix_shape(&self, cell_index: usize) -> (usize, usize) {
        let data = &self.cells[cell_index];
        (data.num_source_nodes as usize, data.num_destination_nodes as usize)
    }

    fn cell_index(&self, level: LevelId, cell: CellId) -> usize {
        let index = self.level_to_cell_offset[usize::from(level) - 1] as usize + cell as usize;
        debug_assert!(index < self.cells.len());
        index
    }
}

/// Ranges of equal cell ids in a sorted (cell, node) list.
fn runs_by_cell(sorted: &[(CellId, NodeId)]) -> Vec<Range<usize>> {
    let mut runs = Vec::new();
    let mut start = 0;
    for index in 1..=sorted.len() {
        if index == sorted.len() || sorted[index].0 != sorted[start].0 {
            runs.push(start..index);
            start = index;
        }
    }
    runs
}

impl<'a> Cell<'a> {
    pub fn source_nodes(&self) -> &'a [NodeId] {
        self.source
    }

    pub fn destination_nodes(&self) -> &'a [NodeId] {
        self.destination
    }

    /// The matrix row of a source boundary node, one weight per destination
    /// node in `destination_nodes` order. Empty if the node is no source.
    pub fn out_weights(&self, node: NodeId) -> &'a [Weight] {
        match self.source.iter().position(|&source| source == node) {
            Some(row) => &self.weights[row * self.destination.len()..(row + 1) * self.destination.len()],
            None => &[],
        }
    }

    /// The matrix column of a destination boundary node, one weight per
    /// source node in `source_nodes` order. Empty if the node is no destination.
    pub fn in_weights(&self, node: NodeId) -> impl Iterator<Item = Weight> + 'a {
        let stride = self.destination.len();
        let num_rows = self.source.len();
        let weights = self.weights;
        let column = self.destination.iter().position(|&destination| destination == node);
        column
            .into_iter()
            .flat_map(move |column| (0..num_rows).map(move |row| weights[row * stride + column]))
    }
}

impl Deconstruct for CellStorage {
    fn store_each(&self, store: &dyn Fn(&str, &dyn Store) -> std::io::Result<()>) -> std::io::Result<()> {
        store("source_boundary", &self.source_boundary)?;
        store("destination_boundary", &self.destination_boundary)?;
        store("cells", &self.cells)?;
        store("level_to_cell_offset", &self.level_to_cell_offset)?;
        Ok(())
    }
}

impl Reconstruct for CellStorage {
    fn reconstruct_with(loader: Loader) -> std::io::Result<Self> {
        Ok(CellStorage {
            source_boundary: loader.load("source_boundary")?,
            destination_boundary: loader.load("destination_boundary")?,
            cells: loader.load("cells")?,
            level_to_cell_offset: loader.load("level_to_cell_offset")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_cell_square() -> (MultiLevelPartition, OwnedGraph) {
        // 0 --- 1
        // |     |
        // 2 --- 3
        // directed arcs: 0->1, 0->2, 2->3, 3->1, 3->2
        let partition = MultiLevelPartition::new(&[vec![0, 0, 1, 1]], &[2]);
        let mut adjacency = vec![Vec::new(); 4];
        for (from, to) in [(0, 1), (0, 2), (2, 3), (3, 1), (3, 2)] {
            adjacency[from as usize].push(Link { node: to, weight: 1 });
        }
        (partition, OwnedGraph::from_adjacency_lists(adjacency))
    }

    #[test]
    fn classifies_boundary_nodes() {
        let (partition, graph) = two_cell_square();
        let storage = CellStorage::new(&partition, &graph);

        let (sources, destinations) = storage.boundary(1, 0);
        assert_eq!(sources, &[0]);
        assert_eq!(destinations, &[1]);

        let (sources, destinations) = storage.boundary(1, 1);
        assert_eq!(sources, &[2, 3]);
        assert_eq!(destinations, &[2, 3]);
    }

    #[test]
    fn matrix_slices_are_disjoint_and_cover_everything() {
        let (partition, graph) = two_cell_square();
        let storage = CellStorage::new(&partition, &graph);

        assert_eq!(storage.total_value_size(), 1 + 4);
        assert_eq!(storage.value_range_of_level(1), 0..5);

        let metric = storage.make_metric();
        assert_eq!(metric.weights.len(), 6);
        let cell = storage.cell(&metric, 1, 1);
        assert_eq!(cell.out_weights(2).len(), 2);
        assert_eq!(cell.out_weights(0).len(), 0);
        assert_eq!(cell.in_weights(3).count(), 2);
    }
}
