//! Traits and basic types for working with weighted graphs.

pub mod first_out_graph;

pub use self::first_out_graph::{FirstOutGraph, OwnedGraph};

/// Node ids are 32bit unsigned ints
pub type NodeId = u32;
/// Edge ids are 32bit unsigned ints
pub type EdgeId = u32;
/// Basic weights are 32bit unsigned ints
pub type Weight = u32;
/// A sufficiently large infinity constant.
/// Set to `u32::MAX / 2` so that `INFINITY + x` for `x <= INFINITY` does not overflow.
pub const INFINITY: Weight = u32::MAX / 2;

/// Simple struct for weighted links.
/// No behaviour, just a pure data struct.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Link {
    pub node: NodeId,
    pub weight: Weight,
}

/// Base trait for graphs.
pub trait Graph {
    fn num_nodes(&self) -> usize;
    fn num_arcs(&self) -> usize;
    fn degree(&self, node: NodeId) -> usize;
}

/// Trait for graph data structures which allow iterating over outgoing links of a node.
pub trait LinkIterGraph<'a>: Graph {
    /// Type of the outgoing neighbor iterator.
    /// The lifetime bound has to come from a lifetime param of the trait
    /// until we can use GATs here.
    type Iter: Iterator<Item = Link> + 'a;

    /// Get an iterator over the outgoing links of the given node.
    fn neighbor_iter(&'a self, node: NodeId) -> Self::Iter;

    /// Create a new graph with all edges reversed
    fn reverse(&'a self) -> OwnedGraph {
        let mut reversed: Vec<Vec<Link>> = (0..self.num_nodes()).map(|_| Vec::<Link>::new()).collect();

        for node in 0..(self.num_nodes() as NodeId) {
            for Link { node: neighbor, weight } in self.neighbor_iter(node) {
                reversed[neighbor as usize].push(Link { node, weight });
            }
        }

        OwnedGraph::from_adjacency_lists(reversed)
    }
}

/// A hash over the topology of a graph.
///
/// Both preprocessing phases derive this value from the graph they actually
/// loaded and store it next to their artifacts. A loader comparing artifact
/// and graph snapshot ids can thus detect stale or mismatched data before
/// using it. Weights are deliberately excluded - reweighting the same
/// topology keeps partition and cell structure valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphSnapshotId(pub u32);

impl GraphSnapshotId {
    /// Compute the snapshot id from CSR topology arrays. FNV-1a, 32bit.
    pub fn from_topology(first_out: &[EdgeId], head: &[NodeId]) -> GraphSnapshotId {
        let mut hash: u32 = 0x811c_9dc5;
        let mut mix = |value: u32| {
            for byte in value.to_le_bytes() {
                hash ^= u32::from(byte);
                hash = hash.wrapping_mul(0x0100_0193);
            }
        };

        mix(first_out.len() as u32);
        for &e in first_out {
            mix(e);
        }
        for &n in head {
            mix(n);
        }

        GraphSnapshotId(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_id_tracks_topology() {
        let id = GraphSnapshotId::from_topology(&[0, 1, 2], &[1, 0]);
        assert_eq!(id, GraphSnapshotId::from_topology(&[0, 1, 2], &[1, 0]));
        assert_ne!(id, GraphSnapshotId::from_topology(&[0, 2, 2], &[1, 0]));
        assert_ne!(id, GraphSnapshotId::from_topology(&[0, 1, 2], &[1, 1]));
    }
}
