//! Pangolin-route: a compressed path database engine for weighted planar
//! graphs.
//!
//! Pipeline:
//! - Load: grid map or DIMACS text into a flat-array graph
//! - Order: DFS-preorder relabelling so same-first-move targets cluster
//! - Build: parallel per-source Dijkstra with allowed-move sets, rows
//!   compressed to runs, merged deterministically
//! - Persist: one binary file, checksum-trailed, loaded whole at query time
//! - Query: first-move lookups extract paths directly, or feed upper bounds
//!   into a bounded-suboptimal A* that tolerates edge-weight perturbations
//!
//! Key principle: the CPD answers "which edge next" in logarithmic time, so
//! a concrete path to the target is always one walk away; the search layer
//! spends its expansions only where perturbations made the stored moves
//! stale.

pub mod cli;
pub mod cpd;
pub mod dijkstra;
pub mod formats;
pub mod geo;
pub mod graph;
pub mod order;
pub mod parse;
pub mod search;
pub mod server;

pub use cpd::builder::build_cpd;
pub use cpd::Cpd;
pub use graph::{Metric, XyGraph};
pub use order::NodeOrder;
pub use search::astar::CpdSearch;
pub use search::{SearchOpts, Solution, StopReason};
