//! Induced subgraph view over one contiguous, still-unsplit id range.
//!
//! Only edges with both endpoints inside the range count. The bisector keeps
//! every range sorted ascending (the initial id array is sorted and splits
//! are stable), so membership is a binary search and the view needs no
//! allocation at all.

use super::bisection_graph::BisectionGraph;
use crate::datastr::graph::NodeId;

#[derive(Debug)]
pub struct GraphView<'a> {
    graph: &'a BisectionGraph,
    ids: &'a [NodeId],
}

impl<'a> GraphView<'a> {
    pub fn new(graph: &'a BisectionGraph, ids: &'a [NodeId]) -> GraphView<'a> {
        debug_assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
        GraphView { graph, ids }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// The global node id at a position of the range.
    pub fn node_id(&self, local: usize) -> NodeId {
        self.ids[local]
    }

    /// The position of a global node id in the range, if it is contained.
    pub fn local_id(&self, node: NodeId) -> Option<usize> {
        self.ids.binary_search(&node).ok()
    }

    /// Positions of all in-view neighbors of the node at the given position.
    pub fn neighbors(&self, local: usize) -> impl Iterator<Item = usize> + '_ {
        self.graph.neighbors(self.ids[local]).filter_map(move |target| self.local_id(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partitioner::bisection_graph::BisectionInputEdge;

    #[test]
    fn only_in_view_edges_count() {
        // path 0 - 1 - 2 - 3
        let mut edges = Vec::new();
        for (a, b) in [(0, 1), (1, 2), (2, 3)] {
            edges.push(BisectionInputEdge { source: a, target: b });
            edges.push(BisectionInputEdge { source: b, target: a });
        }
        let graph = BisectionGraph::new(4, edges);

        let ids = [1, 2];
        let view = GraphView::new(&graph, &ids);
        assert_eq!(view.len(), 2);
        assert_eq!(view.local_id(2), Some(1));
        assert_eq!(view.local_id(0), None);
        // node 1 sees only node 2, the edge to 0 leaves the view
        assert_eq!(view.neighbors(0).collect::<Vec<_>>(), vec![1]);
    }
}
