//! Graph partitioning for Multi-Level-Dijkstra.
//!
//! The partitioner recursively bisects the road graph into a hierarchy of
//! balanced cells with few crossing edges, then flattens the per-node
//! bisection bitstrings into a compact multi-level partition artifact.

use std::{error::Error, fs, path::PathBuf};

use crate::cli::{CliErr, ReturnCode};
use crate::datastr::graph::*;
use crate::io::*;
use crate::report::benchmark::report_time;

pub mod balanced_cut;
pub mod bisection_graph;
pub mod bisection_state;
pub mod bisection_to_partition;
pub mod cell_storage;
pub mod graph_view;
pub mod multi_level_partition;
pub mod recursive_bisection;

pub use bisection_graph::BisectionGraph;
pub use bisection_state::RecursiveBisectionState;
pub use bisection_to_partition::bisection_to_partition;
pub use cell_storage::{Cell, CellMetric, CellStorage};
pub use multi_level_partition::MultiLevelPartition;
pub use recursive_bisection::recursive_bisection;

/// Per-node bitstring recording which side of the split the node fell into
/// at each recursion depth, most significant bit first.
/// Its width caps the recursion depth.
pub type BisectionId = u32;
/// Cells are numbered consecutively per level.
pub type CellId = u32;
/// Level 0 is the base graph, higher levels are coarser.
pub type LevelId = u8;
/// Per-node encoding of the cell ids of all levels, packed into bit ranges.
pub type PartitionId = u64;

/// Tuning knobs of the recursive bisection.
#[derive(Debug, Clone)]
pub struct BisectionConfig {
    /// Upper bound on the larger side of a split, as a factor of half the range size.
    pub balance: f64,
    /// Lower bound on the smaller side of a split, as a fraction of the range size.
    pub boundary_factor: f64,
    /// Number of local search passes spent on reducing the cut.
    pub num_optimizing_cuts: u32,
    /// Ranges of at most this size are not split any further.
    pub small_component_size: usize,
}

impl Default for BisectionConfig {
    fn default() -> Self {
        BisectionConfig {
            balance: 1.2,
            boundary_factor: 0.25,
            num_optimizing_cuts: 10,
            small_component_size: 1000,
        }
    }
}

/// Full configuration of a partitioner run.
#[derive(Debug, Clone)]
pub struct PartitionerConfig {
    pub graph_dir: PathBuf,
    pub partition_dir: PathBuf,
    /// 0 means one thread per available core.
    pub requested_num_threads: usize,
    pub bisection: BisectionConfig,
    /// Target cell sizes per level, ascending. Each entry materializes one level.
    pub max_cell_sizes: Vec<usize>,
}

impl PartitionerConfig {
    pub fn new(graph_dir: PathBuf, partition_dir: PathBuf) -> Self {
        PartitionerConfig {
            graph_dir,
            partition_dir,
            requested_num_threads: 0,
            bisection: BisectionConfig::default(),
            max_cell_sizes: vec![128, 4096, 65536, 2_097_152],
        }
    }
}

pub struct Partitioner;

impl Partitioner {
    /// Run the whole partitioning phase: load the graph, bisect, derive the
    /// multi-level partition and store it together with the graph snapshot id.
    pub fn run(config: &PartitionerConfig) -> ReturnCode {
        match Self::try_run(config) {
            Ok(code) => code,
            Err(err) => {
                eprintln!("partitioning failed: {}", err);
                ReturnCode::Fail
            }
        }
    }

    fn try_run(config: &PartitionerConfig) -> Result<ReturnCode, Box<dyn Error>> {
        if config.max_cell_sizes.is_empty() || config.max_cell_sizes.windows(2).any(|pair| pair[0] > pair[1]) {
            return Err(Box::new(CliErr("max_cell_sizes must be a non-empty ascending list")));
        }

        let graph = OwnedGraph::reconstruct_from(&config.graph_dir)?;
        if graph.num_nodes() == 0 {
            eprintln!("empty graph, nothing to partition");
            return Ok(ReturnCode::Exit);
        }
        let snapshot = graph.snapshot_id();
        report!("num_nodes", graph.num_nodes());
        report!("num_arcs", graph.num_arcs());

        let bisection_graph = BisectionGraph::from_weighted_graph(&graph);

        let pool = rayon::ThreadPoolBuilder::new().num_threads(config.requested_num_threads).build()?;
        let bisection_ids = report_time("recursive bisection", "bisection_running_time_ms", || {
            pool.install(|| recursive_bisection(&bisection_graph, &config.bisection))
        });

        let (partitions, num_cells) = bisection_to_partition(&bisection_ids, &config.max_cell_sizes);
        let partition = MultiLevelPartition::new(&partitions, &num_cells);
        report!("num_levels", partition.num_levels());
        report!("num_cells_per_level", num_cells);

        fs::create_dir_all(&config.partition_dir)?;
        partition.deconstruct_to(&config.partition_dir)?;
        vec![snapshot.0].write_to(&config.partition_dir.join("connectivity_checksum"))?;

        Ok(ReturnCode::Ok)
    }
}
