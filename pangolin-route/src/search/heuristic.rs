//! The paired heuristic: an admissible lower bound and a concrete upper
//! bound derived from the CPD.
//!
//! The lower bound is the graph's metric distance (octile on grid maps,
//! straight-line on road networks) scaled by `hscale`. The upper bound is
//! the cost of the CPD first-move walk measured on the *current* graph, so
//! after a perturbation it prices the detour honestly while the walk itself
//! still follows the preprocessed moves.

use crate::cpd::Cpd;
use crate::graph::XyGraph;

pub struct CpdHeuristic<'a> {
    graph: &'a XyGraph,
    cpd: &'a Cpd,
    hscale: f64,
    k_moves_max: u32,
}

impl<'a> CpdHeuristic<'a> {
    pub fn new(graph: &'a XyGraph, cpd: &'a Cpd, hscale: f64, k_moves_max: u32) -> Self {
        CpdHeuristic { graph, cpd, hscale, k_moves_max }
    }

    #[inline(always)]
    pub fn lower_bound(&self, v: u32, target: u32) -> f64 {
        self.graph.metric_distance(v, target) * self.hscale
    }

    /// Lower bound and upper-bound tail for `v`. The tail is the cost of the
    /// CPD path from `v` to the target, infinity when no such path exists or
    /// the walk exceeds `k_moves_max` steps.
    pub fn estimate(&self, v: u32, target: u32) -> (f64, f64) {
        if v == target {
            return (0.0, 0.0);
        }
        let lb = self.lower_bound(v, target);
        let tail = self.cpd.path_cost(self.graph, v, target, self.k_moves_max);
        (lb, tail)
    }

    /// The next vertex on the CPD path from `v` towards the target.
    pub fn next(&self, v: u32, target: u32) -> Option<u32> {
        let edge = self.cpd.next_edge(self.graph, v, target)?;
        Some(self.graph.out_edges(v)[edge].head)
    }
}
