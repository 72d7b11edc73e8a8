//! Static CSR graph representation.
//!
//! Nodes and edges are identified by ids from `0` to `n-1` and `m-1`.
//! The graph is stored as an adjacency array in three collections:
//! `first_out` (n+1 elements, starts with 0, ends with m), `head` and
//! `weight` (m elements each). `head[first_out[x]..first_out[x+1]]` contains
//! all neighbors of `x`.

use super::*;
use crate::io::*;

/// Container struct for the three collections of a graph.
/// Generic over the types of the data collections,
/// so both owned and borrowed data works.
#[derive(Debug, Clone)]
pub struct FirstOutGraph<FirstOutContainer, HeadContainer, WeightContainer> {
    // index of the first outgoing edge of each node, +1 sentinel entry in the end
    first_out: FirstOutContainer,
    // the node each edge points to
    head: HeadContainer,
    // the weight of each edge
    weight: WeightContainer,
}

pub type OwnedGraph = FirstOutGraph<Vec<EdgeId>, Vec<NodeId>, Vec<Weight>>;

impl<FirstOutContainer, HeadContainer, WeightContainer> FirstOutGraph<FirstOutContainer, HeadContainer, WeightContainer>
where
    FirstOutContainer: AsRef<[EdgeId]>,
    HeadContainer: AsRef<[NodeId]>,
    WeightContainer: AsRef<[Weight]>,
{
    pub fn first_out(&self) -> &[EdgeId] {
        self.first_out.as_ref()
    }
    pub fn head(&self) -> &[NodeId] {
        self.head.as_ref()
    }
    pub fn weight(&self) -> &[Weight] {
        self.weight.as_ref()
    }

    /// Create a new `FirstOutGraph` from the three containers.
    pub fn new(first_out: FirstOutContainer, head: HeadContainer, weight: WeightContainer) -> Self {
        assert!(first_out.as_ref().len() < NodeId::MAX as usize);
        assert!(head.as_ref().len() < EdgeId::MAX as usize);
        assert_eq!(*first_out.as_ref().first().unwrap(), 0);
        assert_eq!(*first_out.as_ref().last().unwrap() as usize, head.as_ref().len());
        assert_eq!(weight.as_ref().len(), head.as_ref().len());

        FirstOutGraph { first_out, head, weight }
    }

    /// The snapshot id of this graph's topology.
    pub fn snapshot_id(&self) -> GraphSnapshotId {
        GraphSnapshotId::from_topology(self.first_out(), self.head())
    }
}

impl<FirstOutContainer, HeadContainer, WeightContainer> Graph for FirstOutGraph<FirstOutContainer, HeadContainer, WeightContainer>
where
    FirstOutContainer: AsRef<[EdgeId]>,
    HeadContainer: AsRef<[NodeId]>,
    WeightContainer: AsRef<[Weight]>,
{
    fn num_nodes(&self) -> usize {
        self.first_out().len() - 1
    }

    fn num_arcs(&self) -> usize {
        self.head().len()
    }

    fn degree(&self, node: NodeId) -> usize {
        let node = node as usize;
        (self.first_out()[node + 1] - self.first_out()[node]) as usize
    }
}

impl<'a, FirstOutContainer, HeadContainer, WeightContainer> LinkIterGraph<'a> for FirstOutGraph<FirstOutContainer, HeadContainer, WeightContainer>
where
    FirstOutContainer: AsRef<[EdgeId]>,
    HeadContainer: AsRef<[NodeId]>,
    WeightContainer: AsRef<[Weight]>,
{
    type Iter = std::iter::Map<std::iter::Zip<std::slice::Iter<'a, NodeId>, std::slice::Iter<'a, Weight>>, fn((&NodeId, &Weight)) -> Link>;

    fn neighbor_iter(&'a self, node: NodeId) -> Self::Iter {
        let range = (self.first_out()[node as usize] as usize)..(self.first_out()[node as usize + 1] as usize);
        self.head()[range.clone()]
            .iter()
            .zip(self.weight()[range].iter())
            .map(|(&node, &weight)| Link { node, weight })
    }
}

impl OwnedGraph {
    pub fn from_adjacency_lists(adjacency_lists: Vec<Vec<Link>>) -> OwnedGraph {
        // create first_out array by a prefix sum over the adjacency list sizes
        let first_out = {
            let degrees = adjacency_lists.iter().map(|neighbors| neighbors.len() as EdgeId);
            degrees_to_first_out(degrees).collect()
        };

        // append all adjacency lists and split the pairs into two vectors
        let (head, weight) = adjacency_lists
            .into_iter()
            .flat_map(|neighbors| neighbors.into_iter().map(|Link { node, weight }| (node, weight)))
            .unzip();

        OwnedGraph::new(first_out, head, weight)
    }
}

pub fn degrees_to_first_out<I: Iterator<Item = EdgeId>>(degrees: I) -> impl Iterator<Item = EdgeId> {
    std::iter::once(0).chain(degrees.scan(0, |state, degree| {
        *state += degree;
        Some(*state)
    }))
}

impl<FirstOutContainer, HeadContainer, WeightContainer> Deconstruct for FirstOutGraph<FirstOutContainer, HeadContainer, WeightContainer>
where
    FirstOutContainer: AsRef<[EdgeId]>,
    HeadContainer: AsRef<[NodeId]>,
    WeightContainer: AsRef<[Weight]>,
{
    fn store_each(&self, store: &dyn Fn(&str, &dyn Store) -> std::io::Result<()>) -> std::io::Result<()> {
        store("first_out", &self.first_out())?;
        store("head", &self.head())?;
        store("weights", &self.weight())?;
        Ok(())
    }
}

impl Reconstruct for OwnedGraph {
    fn reconstruct_with(loader: Loader) -> std::io::Result<Self> {
        let first_out = loader.load("first_out")?;
        let head = loader.load("head")?;
        let weight = loader.load("weights")?;
        Ok(OwnedGraph::new(first_out, head, weight))
    }
}
