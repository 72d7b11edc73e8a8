//! Filling cell distance tables, level by level.
//!
//! Level 1 runs one Dijkstra per source boundary node restricted to the
//! cell's interior edges. Higher levels do not expand interior edges again:
//! they relax the already computed tables of the sub-cells one level below,
//! plus only those graph edges that cross a sub-cell border inside the cell.
//! The computed weights are exactly the shortest path weights within the
//! cell, the reuse is purely an optimization.
//!
//! Cells of one level are independent and processed in parallel, each task
//! writing only its own cell's slice of the metric. Per-thread Dijkstra
//! state lives in a scoped thread local, like the workspaces of a CCH
//! customization.

use rayon::prelude::*;
use scoped_tls::scoped_thread_local;
use std::cell::RefCell;

use crate::datastr::graph::*;
use crate::datastr::index_heap::{IndexedMinHeap, Indexing};
use crate::datastr::timestamped_vector::TimestampedVector;
use crate::partitioner::{CellId, CellMetric, CellStorage, LevelId, MultiLevelPartition};

scoped_thread_local!(static WORKSPACE: RefCell<DijkstraWorkspace>);

/// Reusable Dijkstra state of one worker thread.
struct DijkstraWorkspace {
    distances: TimestampedVector<Weight>,
    heap: IndexedMinHeap<State>,
}

impl DijkstraWorkspace {
    fn new(num_nodes: usize) -> DijkstraWorkspace {
        DijkstraWorkspace {
            distances: TimestampedVector::new(num_nodes, INFINITY),
            heap: IndexedMinHeap::new(num_nodes),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct State {
    distance: Weight,
    node: NodeId,
}

impl Indexing for State {
    fn as_index(&self) -> usize {
        self.node as usize
    }
}

pub struct CellCustomizer<'a> {
    partition: &'a MultiLevelPartition,
}

impl<'a> CellCustomizer<'a> {
    pub fn new(partition: &'a MultiLevelPartition) -> CellCustomizer<'a> {
        CellCustomizer { partition }
    }

    /// Fill the whole metric. `requested_num_threads` of 0 uses all cores.
    pub fn customize<G>(&self, graph: &G, storage: &CellStorage, metric: &mut CellMetric, requested_num_threads: usize)
    where
        G: for<'g> LinkIterGraph<'g> + Sync,
    {
        let num_nodes = graph.num_nodes();
        rayon::ThreadPoolBuilder::new()
            .num_threads(requested_num_threads)
            .build_scoped(
                |thread| WORKSPACE.set(&RefCell::new(DijkstraWorkspace::new(num_nodes)), || thread.run()),
                |pool| pool.install(|| self.customize_levels(graph, storage, metric)),
            )
            .unwrap();
    }

    fn customize_levels<G>(&self, graph: &G, storage: &CellStorage, metric: &mut CellMetric)
    where
        G: for<'g> LinkIterGraph<'g> + Sync,
    {
        for level in 1..self.partition.num_levels() {
            let value_range = storage.value_range_of_level(level);
            // tables below value_range.start are complete and read only now
            let (lower_weights, current) = metric.weights.split_at_mut(value_range.start);
            let mut current = &mut current[..value_range.len()];
            let lower_weights = &lower_weights[..];

            let mut jobs = Vec::new();
            for cell_index in storage.cells_of_level(level) {
                let (rows, columns) = storage.matrix_shape(cell_index);
                let (cell_weights, rest) = std::mem::take(&mut current).split_at_mut(rows * columns);
                let cell = (cell_index - storage.cells_of_level(level).start) as CellId;
                jobs.push((cell, cell_weights));
                current = rest;
            }

            jobs.into_par_iter().for_each(|(cell, cell_weights)| {
                WORKSPACE.with(|workspace| {
                    let mut workspace = workspace.borrow_mut();
                    self.customize_cell(graph, &mut workspace, storage, lower_weights, level, cell, cell_weights);
                });
            });
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn customize_cell<G>(
        &self,
        graph: &G,
        workspace: &mut DijkstraWorkspace,
        storage: &CellStorage,
        lower_weights: &[Weight],
        level: LevelId,
        cell: CellId,
        output: &mut [Weight],
    ) where
        G: for<'g> LinkIterGraph<'g>,
    {
        let (sources, destinations) = storage.boundary(level, cell);
        let num_destinations = destinations.len();
        let first_level = level == 1;
        let DijkstraWorkspace { distances, heap } = workspace;

        for (row, &source) in sources.iter().enumerate() {
            distances.reset();
            heap.clear();
            distances.set(source as usize, 0);
            heap.push(State { distance: 0, node: source });

            while let Some(State { distance, node }) = heap.pop() {
                // interior edges, or at higher levels only sub-cell border crossings
                for Link { node: to, weight } in graph.neighbor_iter(node) {
                    if self.partition.cell(level, to) != cell {
                        continue;
                    }
                    if !first_level && self.partition.cell(level - 1, to) == self.partition.cell(level - 1, node) {
                        continue;
                    }
                    relax(distances, heap, to, distance + weight);
                }

                // shortcuts over the sub-cell the node is a source boundary node of
                if !first_level {
                    let sub_cell = storage.cell_from_weights(lower_weights, level - 1, self.partition.cell(level - 1, node));
                    for (&weight, &to) in sub_cell.out_weights(node).iter().zip(sub_cell.destination_nodes()) {
                        if weight < INFINITY {
                            relax(distances, heap, to, distance + weight);
                        }
                    }
                }
            }

            for (column, &destination) in destinations.iter().enumerate() {
                output[row * num_destinations + column] = distances[destination as usize];
            }
        }
    }
}

fn relax(distances: &mut TimestampedVector<Weight>, heap: &mut IndexedMinHeap<State>, node: NodeId, distance: Weight) {
    if distance < distances[node as usize] {
        distances.set(node as usize, distance);
        let state = State { distance, node };
        if heap.contains_index(node as usize) {
            heap.decrease_key(state);
        } else {
            heap.push(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_from_arcs(num_nodes: usize, arcs: &[(NodeId, NodeId, Weight)]) -> OwnedGraph {
        let mut adjacency = vec![Vec::new(); num_nodes];
        for &(from, to, weight) in arcs {
            adjacency[from as usize].push(Link { node: to, weight });
        }
        OwnedGraph::from_adjacency_lists(adjacency)
    }

    fn customized(partition: &MultiLevelPartition, graph: &OwnedGraph) -> (CellStorage, CellMetric) {
        let storage = CellStorage::new(partition, graph);
        let mut metric = storage.make_metric();
        CellCustomizer::new(partition).customize(graph, &storage, &mut metric, 1);
        (storage, metric)
    }

    #[test]
    fn two_cells_of_a_square() {
        // 0 --- 1
        // |     |
        // 2 --- 3
        let partition = MultiLevelPartition::new(&[vec![0, 0, 1, 1]], &[2]);
        let graph = graph_from_arcs(4, &[(0, 1, 1), (0, 2, 1), (2, 3, 1), (3, 1, 1), (3, 2, 1)]);
        let (storage, metric) = customized(&partition, &graph);

        let cell_0 = storage.cell(&metric, 1, 0);
        assert_eq!(cell_0.out_weights(0), &[1]);
        assert_eq!(cell_0.in_weights(1).collect::<Vec<_>>(), vec![1]);

        let cell_1 = storage.cell(&metric, 1, 1);
        assert_eq!(cell_1.out_weights(2), &[0, 1]);
        assert_eq!(cell_1.out_weights(3), &[1, 0]);
        assert_eq!(cell_1.in_weights(2).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(cell_1.in_weights(3).collect::<Vec<_>>(), vec![1, 0]);
    }

    #[test]
    fn upper_levels_reuse_lower_tables() {
        // two levels: pairs {0,1} {2,3} nested in {0,1,2,3}, chain with a detour
        //
        //   0 -> 1 -> 2 -> 3 -> 4
        //        |         ^
        //        +----5----+
        let partition = MultiLevelPartition::new(
            &[vec![0, 0, 1, 1, 2, 3], vec![0, 0, 0, 0, 1, 2]],
            &[4, 3],
        );
        let graph = graph_from_arcs(
            6,
            &[(0, 1, 1), (1, 2, 1), (2, 3, 1), (3, 4, 1), (1, 5, 1), (5, 3, 3)],
        );
        let (storage, metric) = customized(&partition, &graph);

        // level 1 tables first: cell {2,3} has source 2 and destination 3
        let sub_cell = storage.cell(&metric, 1, 1);
        assert_eq!(sub_cell.source_nodes(), &[2]);
        assert_eq!(sub_cell.destination_nodes(), &[3]);
        assert_eq!(sub_cell.out_weights(2), &[1]);

        // level 2 cell 0 spans nodes 0..=3; only node 1 can start interior
        // paths, nodes 1 and 3 can be reached from outside
        let cell = storage.cell(&metric, 2, 0);
        assert_eq!(cell.source_nodes(), &[1]);
        assert_eq!(cell.destination_nodes(), &[1, 3]);
        assert_eq!(cell.out_weights(1), &[0, 2]);

        for &source in cell.source_nodes() {
            let row = cell.out_weights(source);
            for (column, &destination) in cell.destination_nodes().iter().enumerate() {
                let expected = brute_force_within(&graph, &partition, 2, 0, source, destination);
                assert_eq!(row[column], expected, "{} -> {}", source, destination);
            }
        }
    }

    #[test]
    fn matches_brute_force_dijkstra_on_a_grid() {
        // 4x4 grid, unit weights, bidirected, 2x2 blocks as cells
        //
        //  0  1  2  3
        //  4  5  6  7
        //  8  9 10 11
        // 12 13 14 15
        let cell_of = |node: NodeId| {
            let row = node / 4;
            let column = node % 4;
            (row / 2) * 2 + column / 2
        };
        let l1: Vec<_> = (0..16).map(cell_of).collect();
        let l2 = vec![0; 16];
        let partition = MultiLevelPartition::new(&[l1, l2], &[4, 1]);

        let mut arcs = Vec::new();
        for row in 0..4u32 {
            for column in 0..4u32 {
                let node = row * 4 + column;
                if column + 1 < 4 {
                    arcs.push((node, node + 1, 1));
                    arcs.push((node + 1, node, 1));
                }
                if row + 1 < 4 {
                    arcs.push((node, node + 4, 1));
                    arcs.push((node + 4, node, 1));
                }
            }
        }
        let graph = graph_from_arcs(16, &arcs);
        let (storage, metric) = customized(&partition, &graph);

        for cell_id in 0..4 {
            let cell = storage.cell(&metric, 1, cell_id);
            for &source in cell.source_nodes() {
                let row = cell.out_weights(source);
                for (column, &destination) in cell.destination_nodes().iter().enumerate() {
                    let expected = brute_force_within(&graph, &partition, 1, cell_id, source, destination);
                    assert_eq!(row[column], expected, "cell {} {} -> {}", cell_id, source, destination);
                }
            }
        }
    }

    /// Plain Dijkstra confined to the cell's induced subgraph.
    fn brute_force_within(graph: &OwnedGraph, partition: &MultiLevelPartition, level: LevelId, cell: CellId, from: NodeId, to: NodeId) -> Weight {
        let mut distances = vec![INFINITY; graph.num_nodes()];
        let mut queue = std::collections::BinaryHeap::new();
        distances[from as usize] = 0;
        queue.push(std::cmp::Reverse((0u32, from)));
        while let Some(std::cmp::Reverse((distance, node))) = queue.pop() {
            if distance > distances[node as usize] {
                continue;
            }
            for Link { node: next, weight } in graph.neighbor_iter(node) {
                if partition.cell(level, next) != cell {
                    continue;
                }
                if distance + weight < distances[next as usize] {
                    distances[next as usize] = distance + weight;
                    queue.push(std::cmp::Reverse((distance + weight, next)));
                }
            }
        }
        distances[to as usize]
    }
}
