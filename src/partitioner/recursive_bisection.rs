//! Fork/join driver of the recursive bisection.
//!
//! Each task owns one contiguous, still-unsplit range of the id array.
//! Splitting produces two disjoint subranges which can be processed
//! completely independently, so the recursion parallelizes without any
//! locking; small ranges recurse sequentially to keep task granularity
//! reasonable.

use super::balanced_cut::compute_balanced_cut;
use super::bisection_graph::BisectionGraph;
use super::bisection_state::{apply_bisection_to_range, RecursiveBisectionState, SharedSlice};
use super::graph_view::GraphView;
use super::{BisectionConfig, BisectionId};
use crate::datastr::graph::NodeId;

/// Recursively bisect the graph and return the final bisection id of every node.
pub fn recursive_bisection(graph: &BisectionGraph, config: &BisectionConfig) -> Vec<BisectionId> {
    let mut state = RecursiveBisectionState::new(graph.number_of_nodes());
    {
        let (id_array, bisection_ids) = state.split_mut();
        recurse(graph, id_array, bisection_ids, 0, config);
    }
    state.into_bisection_ids()
}

fn recurse(graph: &BisectionGraph, ids: &mut [NodeId], bisection_ids: SharedSlice<BisectionId>, depth: u32, config: &BisectionConfig) {
    if ids.len() <= config.small_component_size.max(1) || depth >= BisectionId::BITS {
        return;
    }

    let mask = {
        let view = GraphView::new(graph, ids);
        compute_balanced_cut(&view, config)
    };
    let split = apply_bisection_to_range(ids, bisection_ids, depth, &mask);
    if split == 0 || split == ids.len() {
        // degenerate split, recursing again would not make progress
        return;
    }

    let (front, back) = ids.split_at_mut(split);
    let sequential_below = graph.number_of_nodes() / (32 * rayon::current_num_threads().max(1));
    if front.len().max(back.len()) > sequential_below {
        rayon::join(
            || recurse(graph, front, bisection_ids, depth + 1, config),
            || recurse(graph, back, bisection_ids, depth + 1, config),
        );
    } else {
        recurse(graph, front, bisection_ids, depth + 1, config);
        recurse(graph, back, bisection_ids, depth + 1, config);
    }
}
