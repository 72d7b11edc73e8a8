//! Multi-Level-Dijkstra preprocessing for road networks.
//!
//! This crate contains the two offline phases that make MLD queries fast:
//! recursively bisecting the road graph into a hierarchy of balanced cells
//! with small boundaries, and customizing that hierarchy by computing
//! boundary-to-boundary shortest path tables for every cell.
//! The query algorithms consuming these artifacts live elsewhere.

#[macro_use]
pub mod report;

pub mod cli;
pub mod customizer;
pub mod datastr;
pub mod io;
pub mod partitioner;
