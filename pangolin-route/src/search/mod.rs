//! Query-side types: search options, termination reasons and solutions.

pub mod astar;
pub mod heuristic;

use pangolin_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// Per-query knobs. Cutoffs are cooperative cancellation: they are checked
/// once per expansion and terminate the search with the current incumbent.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchOpts {
    /// Stop when the popped node's f exceeds this cost.
    pub cost_cutoff: f64,
    /// Stop after this many node expansions.
    pub expansion_cutoff: u64,
    /// Stop once this much wall-clock time has elapsed.
    pub time_cutoff_nano: u64,
    /// Multiplier on the heuristic lower bound; 1.0 keeps it admissible.
    pub hscale: f64,
    /// Accept an incumbent whose cost is within this ratio of the current
    /// lower bound. Must be at least 1.
    pub quality_ratio: f64,
    /// Cap on CPD walk length when deriving upper bounds.
    pub k_moves_max: u32,
    /// Log incumbent changes and generated nodes.
    pub debug: bool,
    /// Per-expansion logging.
    pub verbose: bool,
}

impl Default for SearchOpts {
    fn default() -> Self {
        SearchOpts {
            cost_cutoff: f64::INFINITY,
            expansion_cutoff: u64::MAX,
            time_cutoff_nano: u64::MAX,
            hscale: 1.0,
            quality_ratio: 1.0,
            k_moves_max: u32::MAX,
            debug: false,
            verbose: false,
        }
    }
}

impl SearchOpts {
    pub fn validate(&self) -> Result<()> {
        if !(self.hscale > 0.0) {
            return Err(Error::InvalidArgument(format!(
                "hscale must be positive, got {}",
                self.hscale
            )));
        }
        if !(self.quality_ratio >= 1.0) {
            return Err(Error::InvalidArgument(format!(
                "quality ratio must be at least 1, got {}",
                self.quality_ratio
            )));
        }
        if self.cost_cutoff < 0.0 {
            return Err(Error::InvalidArgument(format!(
                "cost cutoff must be non-negative, got {}",
                self.cost_cutoff
            )));
        }
        Ok(())
    }
}

/// Why a search stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    /// Open list drained; the incumbent is the best reachable answer.
    Complete,
    /// The popped node's f equals its upper bound: its path is proven best.
    Certified,
    /// The incumbent is within the requested quality ratio of the lower
    /// bound.
    QualityBound,
    CostCutoff,
    ExpansionCutoff,
    TimeCutoff,
    /// No concrete path exists.
    Unreachable,
}

impl StopReason {
    /// True when the search was cancelled before producing a certificate.
    pub fn is_cutoff(self) -> bool {
        matches!(
            self,
            StopReason::CostCutoff | StopReason::ExpansionCutoff | StopReason::TimeCutoff
        )
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StopReason::Complete => "complete",
            StopReason::Certified => "certified",
            StopReason::QualityBound => "quality-bound",
            StopReason::CostCutoff => "cost-cutoff",
            StopReason::ExpansionCutoff => "expansion-cutoff",
            StopReason::TimeCutoff => "time-cutoff",
            StopReason::Unreachable => "unreachable",
        };
        f.write_str(s)
    }
}

/// The outcome of one query. An unreachable target is a regular solution
/// with an empty path and infinite cost.
#[derive(Debug, Clone)]
pub struct Solution {
    pub sum_of_edge_costs: f64,
    /// External vertex ids from start to target; empty when no path exists.
    pub path: Vec<u32>,
    pub time_nano: u64,
    pub nodes_expanded: u64,
    pub nodes_inserted: u64,
    pub nodes_touched: u64,
    pub nodes_updated: u64,
    pub reason: StopReason,
}

impl Solution {
    pub fn found(&self) -> bool {
        !self.path.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_opts_validate() {
        assert!(SearchOpts::default().validate().is_ok());
    }

    #[test]
    fn bad_opts_are_invalid_arguments() {
        let mut opts = SearchOpts::default();
        opts.quality_ratio = 0.5;
        assert!(opts.validate().is_err());
        let mut opts = SearchOpts::default();
        opts.hscale = 0.0;
        assert!(opts.validate().is_err());
    }

    #[test]
    fn opts_deserialize_with_defaults() {
        let opts: SearchOpts = serde_json::from_str(r#"{"hscale": 2.0}"#).unwrap();
        assert_eq!(opts.hscale, 2.0);
        assert_eq!(opts.quality_ratio, 1.0);
        assert!(opts.cost_cutoff.is_infinite());
    }
}
