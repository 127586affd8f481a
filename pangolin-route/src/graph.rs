//! Flat-array directed graph with planar coordinates.
//!
//! Vertices are dense `u32` ids; outgoing edges live in one pooled array
//! indexed by a per-vertex offset table. The graph is read-only after load
//! except for [`XyGraph::perturb`], which overwrites edge weights in place
//! and never changes topology.

use log::warn;
use pangolin_common::{Error, Result};

use crate::geo::{euclidean_distance, octile_distance};

/// First-move sets are 64-bit masks over a vertex's out-edges, so no vertex
/// may have more outgoing edges than that.
pub const MAX_OUT_DEGREE: usize = 64;

/// Relative tolerance used to derive the distance-tie epsilon from the
/// largest edge weight in the graph.
const EPSILON_SCALE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub head: u32,
    pub weight: f64,
}

/// The distance function the embedding supports as a lower bound on path
/// costs. Grid maps admit the tighter octile metric; road networks only the
/// straight line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Euclidean,
    Octile,
}

#[derive(Debug, Clone)]
pub struct XyGraph {
    xy: Vec<(i32, i32)>,
    edge_offsets: Vec<u32>,
    edges: Vec<Edge>,
    metric: Metric,
    epsilon: f64,
}

impl XyGraph {
    /// Build a graph from per-vertex adjacency lists.
    ///
    /// Validates edge targets, weight signs and out-degrees. When
    /// `enforce_euclidean` is set, every weight must be at least the
    /// Euclidean distance between its endpoints, which is what makes the
    /// straight-line heuristic admissible on the result.
    pub fn from_adjacency(
        xy: Vec<(i32, i32)>,
        adjacency: Vec<Vec<(u32, f64)>>,
        enforce_euclidean: bool,
    ) -> Result<Self> {
        if xy.len() != adjacency.len() {
            return Err(Error::InvalidGraph(format!(
                "{} coordinate entries for {} vertices",
                xy.len(),
                adjacency.len()
            )));
        }
        let n = xy.len();

        let mut edge_offsets = Vec::with_capacity(n + 1);
        let mut edges = Vec::new();
        let mut max_weight = 0.0f64;

        edge_offsets.push(0u32);
        for (tail, out) in adjacency.iter().enumerate() {
            if out.len() > MAX_OUT_DEGREE {
                return Err(Error::InvalidGraph(format!(
                    "vertex {} has out-degree {} (limit {})",
                    tail,
                    out.len(),
                    MAX_OUT_DEGREE
                )));
            }
            for &(head, weight) in out {
                if head as usize >= n {
                    return Err(Error::InvalidGraph(format!(
                        "edge {}->{} references a vertex outside [0, {})",
                        tail, head, n
                    )));
                }
                if weight < 0.0 || !weight.is_finite() {
                    return Err(Error::InvalidGraph(format!(
                        "edge {}->{} has weight {}",
                        tail, head, weight
                    )));
                }
                if enforce_euclidean {
                    let gap = euclidean_distance(xy[tail], xy[head as usize]);
                    if weight < gap {
                        return Err(Error::InvalidGraph(format!(
                            "edge {}->{} has weight {} below euclidean distance {}",
                            tail, head, weight, gap
                        )));
                    }
                }
                max_weight = max_weight.max(weight);
                edges.push(Edge { head, weight });
            }
            edge_offsets.push(edges.len() as u32);
        }

        Ok(XyGraph {
            xy,
            edge_offsets,
            edges,
            metric: Metric::Euclidean,
            epsilon: max_weight * EPSILON_SCALE,
        })
    }

    /// Declare the metric the embedding supports; used by graph builders
    /// whose edge weights realise a tighter bound than the straight line.
    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Admissible lower bound on the cost of any u -> v path.
    #[inline(always)]
    pub fn metric_distance(&self, u: u32, v: u32) -> f64 {
        match self.metric {
            Metric::Euclidean => euclidean_distance(self.xy(u), self.xy(v)),
            Metric::Octile => octile_distance(self.xy(u), self.xy(v)),
        }
    }

    pub fn num_vertices(&self) -> usize {
        self.xy.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    #[inline(always)]
    pub fn out_edges(&self, v: u32) -> &[Edge] {
        let start = self.edge_offsets[v as usize] as usize;
        let end = self.edge_offsets[v as usize + 1] as usize;
        &self.edges[start..end]
    }

    #[inline(always)]
    pub fn out_degree(&self, v: u32) -> usize {
        self.out_edges(v).len()
    }

    #[inline(always)]
    pub fn xy(&self, v: u32) -> (i32, i32) {
        self.xy[v as usize]
    }

    /// Distance ties closer than this are treated as equal.
    #[inline(always)]
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Locate the vertex at the given coordinates, if any. Linear scan;
    /// intended for tools and tests, not query paths.
    pub fn find_vertex(&self, x: i32, y: i32) -> Option<u32> {
        self.xy.iter().position(|&p| p == (x, y)).map(|i| i as u32)
    }

    /// External ids are 1-indexed (DIMACS convention); internal ids are
    /// dense and 0-indexed.
    pub fn to_external_id(&self, v: u32) -> u32 {
        v + 1
    }

    pub fn to_graph_id(&self, external: u32) -> Result<u32> {
        if external == 0 || external as usize > self.num_vertices() {
            return Err(Error::InvalidArgument(format!(
                "vertex id {} out of range [1, {}]",
                external,
                self.num_vertices()
            )));
        }
        Ok(external - 1)
    }

    /// Overwrite the weights of the named edges. Triples whose edge does not
    /// exist are ignored: perturbations never change topology. Ids are
    /// internal.
    pub fn perturb<I>(&mut self, changes: I) -> Result<()>
    where
        I: IntoIterator<Item = (u32, u32, f64)>,
    {
        for (tail, head, weight) in changes {
            if tail as usize >= self.num_vertices() || head as usize >= self.num_vertices() {
                warn!(
                    "perturbation {}->{} references a vertex outside the graph; ignored",
                    tail, head
                );
                continue;
            }
            if weight < 0.0 || !weight.is_finite() {
                return Err(Error::InvalidGraph(format!(
                    "perturbation {}->{} has weight {}",
                    tail, head, weight
                )));
            }
            let start = self.edge_offsets[tail as usize] as usize;
            let end = self.edge_offsets[tail as usize + 1] as usize;
            let mut found = false;
            for e in &mut self.edges[start..end] {
                if e.head == head {
                    e.weight = weight;
                    found = true;
                }
            }
            if !found {
                warn!("perturbation {}->{} does not match any edge; ignored", tail, head);
            }
        }

        let max_weight = self.edges.iter().fold(0.0f64, |m, e| m.max(e.weight));
        self.epsilon = max_weight * EPSILON_SCALE;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> XyGraph {
        // 0 -> 1 -> 3, 0 -> 2 -> 3
        XyGraph::from_adjacency(
            vec![(0, 0), (1, 0), (0, 1), (1, 1)],
            vec![
                vec![(1, 1.0), (2, 1.0)],
                vec![(3, 1.0)],
                vec![(3, 1.0)],
                vec![],
            ],
            false,
        )
        .unwrap()
    }

    #[test]
    fn adjacency_roundtrip() {
        let g = diamond();
        assert_eq!(g.num_vertices(), 4);
        assert_eq!(g.num_edges(), 4);
        assert_eq!(g.out_edges(0).len(), 2);
        assert_eq!(g.out_edges(3).len(), 0);
        assert_eq!(g.out_edges(1)[0].head, 3);
    }

    #[test]
    fn rejects_negative_weight() {
        let r = XyGraph::from_adjacency(vec![(0, 0), (1, 0)], vec![vec![(1, -2.0)], vec![]], false);
        assert!(matches!(r, Err(Error::InvalidGraph(_))));
    }

    #[test]
    fn rejects_sub_euclidean_weight() {
        let r = XyGraph::from_adjacency(
            vec![(0, 0), (3, 4)],
            vec![vec![(1, 2.0)], vec![]],
            true,
        );
        assert!(matches!(r, Err(Error::InvalidGraph(_))));
    }

    #[test]
    fn perturb_overwrites_matching_edge() {
        let mut g = diamond();
        g.perturb(vec![(0, 1, 100.0)]).unwrap();
        assert_eq!(g.out_edges(0)[0].weight, 100.0);
        // second out-edge untouched
        assert_eq!(g.out_edges(0)[1].weight, 1.0);
    }

    #[test]
    fn perturb_ignores_absent_edge() {
        let mut g = diamond();
        g.perturb(vec![(1, 2, 5.0), (9, 0, 5.0)]).unwrap();
        assert_eq!(g.num_edges(), 4);
        assert_eq!(g.out_edges(1)[0].weight, 1.0);
    }

    #[test]
    fn metric_dispatch() {
        let g = diamond();
        assert_eq!(g.metric(), Metric::Euclidean);
        // (0,0) to (1,1): straight line vs one diagonal grid step
        assert!((g.metric_distance(0, 3) - 2f64.sqrt()).abs() < 1e-12);
        let g = g.with_metric(Metric::Octile);
        assert_eq!(g.metric(), Metric::Octile);
        assert!((g.metric_distance(0, 1) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn external_id_mapping() {
        let g = diamond();
        assert_eq!(g.to_external_id(0), 1);
        assert_eq!(g.to_graph_id(4).unwrap(), 3);
        assert!(g.to_graph_id(0).is_err());
        assert!(g.to_graph_id(5).is_err());
    }
}
