//! Flattening of bisection bitstrings into per-level cell arrays.
//!
//! Every entry of `max_cell_sizes` materializes one level: the bisection
//! tree is cut at the shallowest depth at which a cell satisfies the level's
//! size bound. A cell whose bitstring prefix is exhausted before it fits the
//! bound cannot be split any further and is accepted oversized.

use super::{BisectionId, CellId};
use crate::datastr::graph::NodeId;
use std::ops::Range;

/// Returns one cell id array per level (finest first) and the number of
/// cells per level. `max_cell_sizes` must be ascending, which is what keeps
/// the levels nested.
pub fn bisection_to_partition(bisection_ids: &[BisectionId], max_cell_sizes: &[usize]) -> (Vec<Vec<CellId>>, Vec<u32>) {
    assert!(!max_cell_sizes.is_empty());
    assert!(max_cell_sizes.windows(2).all(|pair| pair[0] <= pair[1]));

    let num_nodes = bisection_ids.len();
    let mut permutation: Vec<NodeId> = (0..num_nodes as NodeId).collect();
    permutation.sort_by_key(|&node| bisection_ids[node as usize]);

    let mut partitions = Vec::with_capacity(max_cell_sizes.len());
    let mut num_cells = Vec::with_capacity(max_cell_sizes.len());
    for &max_cell_size in max_cell_sizes {
        let mut partition = vec![0 as CellId; num_nodes];
        let mut next_cell = 0;
        assign_cells(bisection_ids, &permutation, 0..num_nodes, 0, max_cell_size, &mut next_cell, &mut partition);
        partitions.push(partition);
        num_cells.push(next_cell);
    }

    (partitions, num_cells)
}

fn assign_cells(
    bisection_ids: &[BisectionId],
    permutation: &[NodeId],
    range: Range<usize>,
    depth: u32,
    max_cell_size: usize,
    next_cell: &mut u32,
    partition: &mut [CellId],
) {
    if range.len() <= max_cell_size || depth == BisectionId::BITS {
        let cell = *next_cell;
        *next_cell += 1;
        for &node in &permutation[range] {
            partition[node as usize] = cell;
        }
        return;
    }

    // the range agrees on all bits above `depth` and is sorted by id,
    // so it splits at the point where the bit at `depth` flips
    let bit = 1 << (BisectionId::BITS - 1 - depth);
    let split = range.start + permutation[range.clone()].partition_point(|&node| bisection_ids[node as usize] & bit == 0);
    if split == range.start || split == range.end {
        // bit unused in this subtree, descend without splitting
        assign_cells(bisection_ids, permutation, range, depth + 1, max_cell_size, next_cell, partition);
    } else {
        assign_cells(bisection_ids, permutation, range.start..split, depth + 1, max_cell_size, next_cell, partition);
        assign_cells(bisection_ids, permutation, split..range.end, depth + 1, max_cell_size, next_cell, partition);
    }
}
