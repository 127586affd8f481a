//! The compressed path database: per-source rows of run-length-encoded
//! first moves over reordered target ids.
//!
//! Row r belongs to the source whose *ordered* id is r, and columns are
//! ordered target ids, so both endpoints of a lookup are converted before
//! the binary search. The whole structure lives in memory; queries are two
//! array reads and one `partition_point`.

pub mod builder;
pub mod row;

use pangolin_common::{Error, Result};

use crate::graph::XyGraph;
use crate::order::NodeOrder;
use row::{Run, NONE, WILDCARD};

pub struct Cpd {
    order: NodeOrder,
    row_begin: Vec<u64>,
    runs: Vec<Run>,
}

impl Cpd {
    /// Assemble a CPD from its stored parts, checking structural invariants:
    /// offsets cover all runs monotonically and every row starts at column 0
    /// with strictly increasing run starts.
    pub fn from_parts(order: NodeOrder, row_begin: Vec<u64>, runs: Vec<Run>) -> Result<Self> {
        let n = order.len();
        if row_begin.len() != n + 1 || row_begin[0] != 0 || row_begin[n] != runs.len() as u64 {
            return Err(Error::Io("row offset table is malformed".to_string()));
        }
        for r in 0..n {
            let (begin, end) = (row_begin[r] as usize, row_begin[r + 1] as usize);
            if begin >= end || end > runs.len() {
                return Err(Error::Io(format!("row {} has no runs", r)));
            }
            if runs[begin].start != 0 {
                return Err(Error::Io(format!("row {} does not start at column 0", r)));
            }
            for w in runs[begin..end].windows(2) {
                if w[0].start >= w[1].start {
                    return Err(Error::Io(format!("row {} runs are not sorted", r)));
                }
            }
        }
        Ok(Cpd { order, row_begin, runs })
    }

    pub fn order(&self) -> &NodeOrder {
        &self.order
    }

    pub fn num_rows(&self) -> usize {
        self.order.len()
    }

    pub fn num_runs(&self) -> usize {
        self.runs.len()
    }

    pub fn row_begin(&self) -> &[u64] {
        &self.row_begin
    }

    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    /// The stored first-move symbol for `(source, target)`, both original
    /// ids. O(log R) in the source row's run count.
    pub fn first_move(&self, source: u32, target: u32) -> u8 {
        let row = self.order.to_new(source) as usize;
        let column = self.order.to_new(target);
        let slice = &self.runs[self.row_begin[row] as usize..self.row_begin[row + 1] as usize];
        row::decode(slice, column)
    }

    /// Resolve the stored symbol into an out-edge index of `source`.
    /// WILDCARD means any optimal move works, so the first out-edge is taken.
    pub fn next_edge(&self, graph: &XyGraph, source: u32, target: u32) -> Option<usize> {
        let edge = match self.first_move(source, target) {
            NONE => return None,
            WILDCARD => 0,
            m => m as usize,
        };
        if edge < graph.out_degree(source) {
            Some(edge)
        } else {
            None
        }
    }

    /// Cost of the CPD path from `source` to `target` on the *current*
    /// graph, i.e. including any perturbed weights. Infinity when the walk
    /// hits a NONE symbol or exceeds `max_steps`.
    pub fn path_cost(&self, graph: &XyGraph, source: u32, target: u32, max_steps: u32) -> f64 {
        let mut cost = 0.0;
        let mut current = source;
        let mut steps = 0u32;
        while current != target {
            if steps >= max_steps {
                return f64::INFINITY;
            }
            let Some(edge) = self.next_edge(graph, current, target) else {
                return f64::INFINITY;
            };
            let e = graph.out_edges(current)[edge];
            cost += e.weight;
            current = e.head;
            steps += 1;
        }
        cost
    }

    /// Walk the CPD from `source` to `target`, returning the full vertex
    /// path and its cost on the current graph. `None` when the target is
    /// unreachable (or the database is corrupt and the walk cycles).
    pub fn extract_path(
        &self,
        graph: &XyGraph,
        source: u32,
        target: u32,
    ) -> Option<(Vec<u32>, f64)> {
        let mut path = vec![source];
        let mut cost = 0.0;
        let mut current = source;
        // a first-move walk visits each vertex at most once
        let step_limit = graph.num_vertices() as u32;
        let mut steps = 0u32;
        while current != target {
            if steps >= step_limit {
                return None;
            }
            let edge = self.next_edge(graph, current, target)?;
            let e = graph.out_edges(current)[edge];
            cost += e.weight;
            current = e.head;
            path.push(current);
            steps += 1;
        }
        Some((path, cost))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::XyGraph;
    use crate::order::NodeOrder;

    // Path graph 0 -> 1 -> 2 with identity ordering; rows written by hand.
    fn tiny() -> (XyGraph, Cpd) {
        let g = XyGraph::from_adjacency(
            vec![(0, 0), (1, 0), (2, 0)],
            vec![vec![(1, 1.0)], vec![(2, 1.0)], vec![]],
            false,
        )
        .unwrap();
        let order = NodeOrder::from_parts(vec![0, 1, 2], vec![0, 1, 2]).unwrap();
        let runs = vec![
            // row 0: self NONE, then move 0 for both targets
            Run { start: 0, symbol: NONE },
            Run { start: 1, symbol: 0 },
            // row 1: everything before own column is unreachable
            Run { start: 0, symbol: NONE },
            Run { start: 2, symbol: 0 },
            // row 2: nothing reachable
            Run { start: 0, symbol: NONE },
        ];
        let cpd = Cpd::from_parts(order, vec![0, 2, 4, 5], runs).unwrap();
        (g, cpd)
    }

    #[test]
    fn first_move_lookup() {
        let (_, cpd) = tiny();
        assert_eq!(cpd.first_move(0, 0), NONE);
        assert_eq!(cpd.first_move(0, 2), 0);
        assert_eq!(cpd.first_move(1, 0), NONE);
        assert_eq!(cpd.first_move(1, 2), 0);
    }

    #[test]
    fn extraction_walks_to_target() {
        let (g, cpd) = tiny();
        let (path, cost) = cpd.extract_path(&g, 0, 2).unwrap();
        assert_eq!(path, vec![0, 1, 2]);
        assert!((cost - 2.0).abs() < 1e-12);
        assert!(cpd.extract_path(&g, 2, 0).is_none());
    }

    #[test]
    fn path_cost_respects_step_cap() {
        let (g, cpd) = tiny();
        assert!(cpd.path_cost(&g, 0, 2, 1).is_infinite());
        assert!((cpd.path_cost(&g, 0, 2, 8) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn malformed_offsets_rejected() {
        let order = NodeOrder::from_parts(vec![0, 1], vec![0, 1]).unwrap();
        let runs = vec![Run { start: 0, symbol: NONE }];
        assert!(Cpd::from_parts(order, vec![0, 1, 3], runs).is_err());
    }
}
