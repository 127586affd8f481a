//! CPD-guided bounded-suboptimal A*.
//!
//! Best-first search on f = g + h with an incumbent: the node holding the
//! best known *concrete* path to the target, discovered by pricing the CPD
//! walk from every generated node. The incumbent prunes the open list from
//! above, certifies early termination, and is the answer whenever a cutoff
//! fires. Search records live in an epoch-stamped arena sized to the graph,
//! so consecutive queries pay no reset cost.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Instant;

use log::{debug, warn};
use pangolin_common::Result;

use crate::cpd::Cpd;
use crate::graph::XyGraph;
use crate::search::heuristic::CpdHeuristic;
use crate::search::{SearchOpts, Solution, StopReason};

const NO_PARENT: u32 = u32::MAX;

#[derive(Debug, Clone, Copy)]
struct SearchNode {
    g: f64,
    h: f64,
    /// f carried explicitly: freshly generated nodes keep g = ∞ until they
    /// are relaxed, but must already sort and prune by their generation f.
    f: f64,
    /// Cost of a concrete path to the target through this node; ∞ unknown.
    ub: f64,
    parent: u32,
    epoch: u32,
    expanded: bool,
}

const FRESH: SearchNode = SearchNode {
    g: f64::INFINITY,
    h: 0.0,
    f: f64::INFINITY,
    ub: f64::INFINITY,
    parent: NO_PARENT,
    epoch: 0,
    expanded: false,
};

#[derive(Debug, Clone, Copy)]
struct OpenItem {
    f: f64,
    node: u32,
}

impl PartialEq for OpenItem {
    fn eq(&self, other: &Self) -> bool {
        self.f == other.f && self.node == other.node
    }
}

impl Eq for OpenItem {}

impl PartialOrd for OpenItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for a min-heap, node id as deterministic tie-break.
        other
            .f
            .partial_cmp(&self.f)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.node.cmp(&self.node))
    }
}

pub struct CpdSearch<'a> {
    graph: &'a XyGraph,
    cpd: &'a Cpd,
    nodes: Vec<SearchNode>,
    epoch: u32,
    open: BinaryHeap<OpenItem>,
}

impl<'a> CpdSearch<'a> {
    pub fn new(graph: &'a XyGraph, cpd: &'a Cpd) -> Self {
        CpdSearch {
            graph,
            cpd,
            nodes: vec![FRESH; graph.num_vertices()],
            epoch: 0,
            open: BinaryHeap::with_capacity(1024),
        }
    }

    fn next_epoch(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        if self.epoch == 0 {
            for n in &mut self.nodes {
                n.epoch = 0;
            }
            self.epoch = 1;
        }
        self.open.clear();
    }

    #[inline(always)]
    fn generated(&self, v: u32) -> bool {
        self.nodes[v as usize].epoch == self.epoch
    }

    /// Prune a node whose f cannot beat the incumbent's, or whose known
    /// upper bound is no better. Applied both at generation and at pop, since
    /// the incumbent may improve in between.
    #[inline(always)]
    fn should_prune(&self, incumbent: Option<u32>, v: u32) -> bool {
        let Some(i) = incumbent else {
            return false;
        };
        if i == v {
            // the incumbent is never pruned against itself
            return false;
        }
        let n = &self.nodes[v as usize];
        let inc = &self.nodes[i as usize];
        n.f >= inc.f || (n.ub.is_finite() && n.ub >= inc.ub)
    }

    /// Answer one query. Ids are external; results carry external ids.
    pub fn get_path(&mut self, start_ext: u32, target_ext: u32, opts: &SearchOpts) -> Result<Solution> {
        opts.validate()?;
        let start = self.graph.to_graph_id(start_ext)?;
        let target = self.graph.to_graph_id(target_ext)?;
        Ok(self.search(start, target, opts))
    }

    fn search(&mut self, start: u32, target: u32, opts: &SearchOpts) -> Solution {
        let timer = Instant::now();
        let eps = self.graph.epsilon();
        let heuristic =
            CpdHeuristic::new(self.graph, self.cpd, opts.hscale, opts.k_moves_max);
        self.next_epoch();

        let mut nodes_expanded = 0u64;
        let mut nodes_inserted = 0u64;
        let mut nodes_touched = 0u64;
        let mut nodes_updated = 0u64;

        // Start node: its upper bound is the full CPD extraction, which is
        // what makes the search anytime from the first expansion.
        let (start_h, start_tail) = heuristic.estimate(start, target);
        self.nodes[start as usize] = SearchNode {
            g: 0.0,
            h: start_h,
            f: start_h,
            ub: start_tail,
            parent: NO_PARENT,
            epoch: self.epoch,
            expanded: false,
        };
        self.open.push(OpenItem { f: start_h, node: start });
        nodes_inserted += 1;

        let mut incumbent: Option<u32> = if start_tail.is_finite() {
            Some(start)
        } else {
            None
        };

        let mut reason = loop {
            let Some(item) = self.open.pop() else {
                break if incumbent.is_some() {
                    StopReason::Complete
                } else {
                    StopReason::Unreachable
                };
            };
            let cur = item.node;
            {
                let n = &self.nodes[cur as usize];
                if n.expanded || item.f > n.f + eps {
                    continue; // superseded entry
                }
            }
            self.nodes[cur as usize].expanded = true;
            nodes_expanded += 1;

            let (cur_f, cur_ub) = {
                let n = &self.nodes[cur as usize];
                (n.f, n.ub)
            };
            if opts.verbose {
                debug!(
                    "expanding {} f={:.3} ub={:.3} expanded={}",
                    cur, cur_f, cur_ub, nodes_expanded
                );
            }

            // Early termination, checked once per pop.
            if cur_f > opts.cost_cutoff {
                break StopReason::CostCutoff;
            }
            if nodes_expanded >= opts.expansion_cutoff {
                break StopReason::ExpansionCutoff;
            }
            if timer.elapsed().as_nanos() > opts.time_cutoff_nano as u128 {
                break StopReason::TimeCutoff;
            }
            if cur_ub.is_finite() && (cur_f - cur_ub).abs() <= eps {
                break StopReason::Certified;
            }
            if let Some(i) = incumbent {
                if self.nodes[i as usize].ub <= opts.quality_ratio * cur_f + eps {
                    break StopReason::QualityBound;
                }
            }

            // The incumbent may have improved since this node was generated.
            if self.should_prune(incumbent, cur) {
                continue;
            }

            let cur_g = self.nodes[cur as usize].g;
            let degree = self.graph.out_degree(cur);

            // First successor pass: generate fresh records and move the
            // incumbent, so the second pass prunes against the newest bound.
            for i in 0..degree {
                let e = self.graph.out_edges(cur)[i];
                let v = e.head;
                let gval = cur_g + e.weight;
                nodes_touched += 1;

                if !self.generated(v) {
                    let (h, tail) = heuristic.estimate(v, target);
                    let ub = if tail.is_finite() { gval + tail } else { f64::INFINITY };
                    self.nodes[v as usize] = SearchNode {
                        g: f64::INFINITY,
                        h,
                        f: gval + h,
                        ub,
                        parent: NO_PARENT,
                        epoch: self.epoch,
                        expanded: false,
                    };
                }

                if v == target && gval + eps < self.nodes[v as usize].g {
                    let n = &mut self.nodes[v as usize];
                    n.g = gval;
                    n.f = gval; // h(target) = 0
                    n.ub = gval;
                    n.parent = cur;
                }

                let ub_v = self.nodes[v as usize].ub;
                let improves = match incumbent {
                    None => ub_v.is_finite(),
                    Some(i) => ub_v < self.nodes[i as usize].ub,
                };
                if improves {
                    if opts.debug {
                        debug!("new incumbent {} ub={:.3}", v, ub_v);
                    }
                    incumbent = Some(v);
                }
            }

            // Second pass: prune, relax, queue.
            for i in 0..degree {
                let e = self.graph.out_edges(cur)[i];
                let v = e.head;
                let gval = cur_g + e.weight;

                if self.should_prune(incumbent, v) {
                    continue;
                }
                let n = &mut self.nodes[v as usize];
                if gval + eps < n.g {
                    let reinsert = n.g.is_finite();
                    n.g = gval;
                    n.f = gval + n.h;
                    n.parent = cur;
                    n.expanded = false; // reopen; only possible when h is inflated
                    let f = n.f;
                    self.open.push(OpenItem { f, node: v });
                    if reinsert {
                        nodes_updated += 1;
                    } else {
                        nodes_inserted += 1;
                    }
                }
            }
        };

        // Concretise the incumbent: follow CPD moves to the target, relaxing
        // the chain into the search records, then read the path back off the
        // parent pointers.
        let mut path = Vec::new();
        let mut cost = f64::INFINITY;
        if let Some(holder) = incumbent {
            if self.concretise(holder, target, &heuristic) {
                cost = self.nodes[target as usize].g;
                path = self.collect_path(start, target);
            } else if reason == StopReason::Complete {
                reason = StopReason::Unreachable;
            }
        }
        if path.is_empty() && reason == StopReason::Complete {
            reason = StopReason::Unreachable;
        }

        Solution {
            sum_of_edge_costs: cost,
            path,
            time_nano: timer.elapsed().as_nanos() as u64,
            nodes_expanded,
            nodes_inserted,
            nodes_touched,
            nodes_updated,
            reason,
        }
    }

    /// Walk the CPD from `holder` to the target, writing each hop into the
    /// search records when it improves them. Returns false when the chain
    /// cannot be completed (corrupt database or broken successor).
    fn concretise(&mut self, holder: u32, target: u32, heuristic: &CpdHeuristic) -> bool {
        let mut cur = holder;
        let mut steps = 0usize;
        while cur != target {
            if steps > self.graph.num_vertices() {
                warn!("cpd chain from {} did not reach the target; dropping it", holder);
                return false;
            }
            let Some(next) = heuristic.next(cur, target) else {
                warn!("cpd chain from {} broke at {}; dropping it", holder, cur);
                return false;
            };
            let Some(e) = self.graph.out_edges(cur).iter().find(|e| e.head == next) else {
                warn!("cpd move at {} does not match an edge; dropping it", cur);
                return false;
            };
            let gval = self.nodes[cur as usize].g + e.weight;
            if !self.generated(next) {
                self.nodes[next as usize] = SearchNode {
                    g: gval,
                    h: 0.0,
                    f: gval,
                    ub: f64::INFINITY,
                    parent: cur,
                    epoch: self.epoch,
                    expanded: false,
                };
            } else if gval < self.nodes[next as usize].g {
                let n = &mut self.nodes[next as usize];
                n.g = gval;
                n.f = gval + n.h;
                n.parent = cur;
            }
            cur = next;
            steps += 1;
        }
        true
    }

    /// Read external-id path start..target off the parent pointers.
    fn collect_path(&self, start: u32, target: u32) -> Vec<u32> {
        let mut path = Vec::new();
        let mut cur = target;
        loop {
            path.push(self.graph.to_external_id(cur));
            if cur == start {
                break;
            }
            let parent = self.nodes[cur as usize].parent;
            if parent == NO_PARENT || path.len() > self.graph.num_vertices() {
                warn!("parent chain from {} does not reach the start", target);
                return Vec::new();
            }
            cur = parent;
        }
        path.reverse();
        path
    }
}
