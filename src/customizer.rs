//! Customization of a finished partition.
//!
//! The customizer loads the weighted edge based graph and the multi-level
//! partition, verifies that both belong to the same graph snapshot, and
//! fills the boundary-to-boundary distance tables of every cell. The
//! resulting cell storage is what the query side loads.

use std::{error::Error, fs, io, path::Path, path::PathBuf};

use crate::cli::ReturnCode;
use crate::datastr::graph::*;
use crate::io::*;
use crate::partitioner::{CellMetric, CellStorage, MultiLevelPartition};
use crate::report::benchmark::report_time;

pub mod cell_customizer;

pub use cell_customizer::CellCustomizer;

/// Full configuration of a customizer run.
#[derive(Debug, Clone)]
pub struct CustomizerConfig {
    pub graph_dir: PathBuf,
    pub partition_dir: PathBuf,
    pub cells_dir: PathBuf,
    /// 0 means one thread per available core.
    pub requested_num_threads: usize,
}

impl CustomizerConfig {
    pub fn new(graph_dir: PathBuf, partition_dir: PathBuf, cells_dir: PathBuf) -> Self {
        CustomizerConfig {
            graph_dir,
            partition_dir,
            cells_dir,
            requested_num_threads: 0,
        }
    }
}

pub struct Customizer;

impl Customizer {
    /// Run the whole customization phase.
    pub fn run(config: &CustomizerConfig) -> ReturnCode {
        match Self::try_run(config) {
            Ok(code) => code,
            Err(err) => {
                eprintln!("customization failed: {}", err);
                ReturnCode::Fail
            }
        }
    }

    fn try_run(config: &CustomizerConfig) -> Result<ReturnCode, Box<dyn Error>> {
        let graph = OwnedGraph::reconstruct_from(&config.graph_dir)?;
        if graph.num_nodes() == 0 {
            eprintln!("empty graph, nothing to customize");
            return Ok(ReturnCode::Exit);
        }
        let snapshot = graph.snapshot_id();

        let partition = MultiLevelPartition::reconstruct_from(&config.partition_dir)?;
        verify_snapshot(&config.partition_dir, snapshot)?;
        if partition.num_nodes() != graph.num_nodes() {
            return Err(Box::new(io::Error::new(
                io::ErrorKind::InvalidData,
                "node counts of partition and graph disagree",
            )));
        }

        let storage = report_time("cell storage construction", "cell_storage_running_time_ms", || {
            CellStorage::new(&partition, &graph)
        });
        let mut metric = storage.make_metric();
        report!("num_cell_weights", metric.weights.len());

        report_time("cell customization", "customization_running_time_ms", || {
            CellCustomizer::new(&partition).customize(&graph, &storage, &mut metric, config.requested_num_threads)
        });

        fs::create_dir_all(&config.cells_dir)?;
        storage.deconstruct_to(&config.cells_dir)?;
        metric.weights.write_to(&config.cells_dir.join("cell_weights"))?;
        vec![snapshot.0].write_to(&config.cells_dir.join("connectivity_checksum"))?;

        Ok(ReturnCode::Ok)
    }
}

/// Load customized cells for query use, gated on the graph snapshot they
/// were built against. A mismatch is a hard error, the artifacts have to be
/// regenerated.
pub fn load_customized<P: AsRef<Path>>(cells_dir: P, expected: GraphSnapshotId) -> io::Result<(CellStorage, CellMetric)> {
    verify_snapshot(cells_dir.as_ref(), expected)?;
    let storage = CellStorage::reconstruct_from(&cells_dir.as_ref())?;
    let weights = Vec::load_from(cells_dir.as_ref().join("cell_weights"))?;
    Ok((storage, CellMetric { weights }))
}

fn verify_snapshot(dir: &Path, expected: GraphSnapshotId) -> io::Result<()> {
    let stored: Vec<u32> = Vec::load_from(dir.join("connectivity_checksum"))?;
    if stored != [expected.0] {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "connectivity checksum mismatch, the artifacts were built against a different graph",
        ));
    }
    Ok(())
}
