//! Single-source shortest paths with first-move bookkeeping.
//!
//! [`DijkstraWorkspace`] is a reusable search state: distance, allowed-set
//! and stamp arrays sized to the graph, reset in O(1) between sources by
//! bumping a version counter. One workspace per worker thread during CPD
//! construction; no locks anywhere.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::cpd::row::FirstMoveSet;
use crate::graph::XyGraph;

#[derive(Debug, Clone, Copy)]
struct HeapItem {
    dist: f64,
    node: u32,
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.dist == other.dist && self.node == other.node
    }
}

impl Eq for HeapItem {}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for a min-heap; tie-break on node id so pop order
        // is deterministic.
        other
            .dist
            .partial_cmp(&self.dist)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.node.cmp(&self.node))
    }
}

pub struct DijkstraWorkspace {
    dist: Vec<f64>,
    moves: Vec<FirstMoveSet>,
    stamp: Vec<u32>,
    version: u32,
    heap: BinaryHeap<HeapItem>,
}

impl DijkstraWorkspace {
    pub fn new(num_vertices: usize) -> Self {
        DijkstraWorkspace {
            dist: vec![f64::INFINITY; num_vertices],
            moves: vec![FirstMoveSet::EMPTY; num_vertices],
            stamp: vec![0; num_vertices],
            version: 0,
            heap: BinaryHeap::with_capacity(1024),
        }
    }

    fn reset(&mut self) {
        self.version = self.version.wrapping_add(1);
        if self.version == 0 {
            for s in &mut self.stamp {
                *s = 0;
            }
            self.version = 1;
        }
        self.heap.clear();
    }

    #[inline(always)]
    pub fn distance(&self, v: u32) -> f64 {
        if self.stamp[v as usize] == self.version {
            self.dist[v as usize]
        } else {
            f64::INFINITY
        }
    }

    /// The set of first edges of the last source that begin some optimal
    /// path to `v`. Empty for the source itself and for unreached vertices.
    #[inline(always)]
    pub fn first_moves(&self, v: u32) -> FirstMoveSet {
        if self.stamp[v as usize] == self.version {
            self.moves[v as usize]
        } else {
            FirstMoveSet::EMPTY
        }
    }

    #[inline(always)]
    fn settle(&mut self, v: u32, dist: f64, moves: FirstMoveSet) {
        self.dist[v as usize] = dist;
        self.moves[v as usize] = moves;
        self.stamp[v as usize] = self.version;
    }

    /// Dijkstra from `source`, recording for every vertex the set of first
    /// edges lying on some optimal path. Distances within the graph's
    /// epsilon are ties and their sets are merged; a merge that enlarges a
    /// set re-queues the vertex at unchanged distance so the larger set
    /// reaches its successors.
    pub fn compute_first_moves(&mut self, graph: &XyGraph, source: u32) {
        let eps = graph.epsilon();
        self.reset();
        self.settle(source, 0.0, FirstMoveSet::EMPTY);
        self.heap.push(HeapItem { dist: 0.0, node: source });

        while let Some(HeapItem { dist, node: u }) = self.heap.pop() {
            let du = self.distance(u);
            if dist > du + eps {
                continue; // stale entry
            }

            for (i, e) in graph.out_edges(u).iter().enumerate() {
                if e.head == source {
                    continue; // the source's own set stays empty
                }
                let inherited = if u == source {
                    FirstMoveSet::singleton(i as u8)
                } else {
                    self.moves[u as usize]
                };
                let nd = du + e.weight;
                let dv = self.distance(e.head);

                if nd + eps < dv {
                    self.settle(e.head, nd, inherited);
                    self.heap.push(HeapItem { dist: nd, node: e.head });
                } else if nd <= dv + eps && !self.moves[e.head as usize].contains_all(inherited)
                {
                    self.moves[e.head as usize].union_with(inherited);
                    self.heap.push(HeapItem { dist: dv, node: e.head });
                }
            }
        }
    }

    /// Plain Dijkstra; fills distances for every reachable vertex. Used as
    /// the reference oracle by the validation command and the tests.
    pub fn compute_distances(&mut self, graph: &XyGraph, source: u32) {
        self.reset();
        self.settle(source, 0.0, FirstMoveSet::EMPTY);
        self.heap.push(HeapItem { dist: 0.0, node: source });

        while let Some(HeapItem { dist, node: u }) = self.heap.pop() {
            if dist > self.distance(u) {
                continue;
            }
            for e in graph.out_edges(u) {
                let nd = dist + e.weight;
                if nd < self.distance(e.head) {
                    self.settle(e.head, nd, FirstMoveSet::EMPTY);
                    self.heap.push(HeapItem { dist: nd, node: e.head });
                }
            }
        }
    }

    /// Point-to-point shortest path cost; stops as soon as the target is
    /// settled. Infinity when unreachable.
    pub fn shortest_path_cost(&mut self, graph: &XyGraph, source: u32, target: u32) -> f64 {
        self.reset();
        self.settle(source, 0.0, FirstMoveSet::EMPTY);
        self.heap.push(HeapItem { dist: 0.0, node: source });

        while let Some(HeapItem { dist, node: u }) = self.heap.pop() {
            if dist > self.distance(u) {
                continue;
            }
            if u == target {
                return dist;
            }
            for e in graph.out_edges(u) {
                let nd = dist + e.weight;
                if nd < self.distance(e.head) {
                    self.settle(e.head, nd, FirstMoveSet::EMPTY);
                    self.heap.push(HeapItem { dist: nd, node: e.head });
                }
            }
        }
        f64::INFINITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::XyGraph;

    // 0 -> {1, 2} -> 3 -> 4, both 0->3 paths cost 2
    fn diamond_with_tail() -> XyGraph {
        XyGraph::from_adjacency(
            vec![(0, 0), (1, 0), (0, 1), (1, 1), (2, 1)],
            vec![
                vec![(1, 1.0), (2, 1.0)],
                vec![(3, 1.0)],
                vec![(3, 1.0)],
                vec![(4, 1.0)],
                vec![],
            ],
            false,
        )
        .unwrap()
    }

    #[test]
    fn allowed_sets_capture_all_optimal_first_moves() {
        let g = diamond_with_tail();
        let mut ws = DijkstraWorkspace::new(g.num_vertices());
        ws.compute_first_moves(&g, 0);

        assert!(ws.first_moves(0).is_empty());
        assert_eq!(ws.first_moves(1).as_singleton(), Some(0));
        assert_eq!(ws.first_moves(2).as_singleton(), Some(1));
        // both first edges reach 3 optimally
        let at_join = ws.first_moves(3);
        assert!(at_join.contains(0) && at_join.contains(1));
        // and the merged set propagates past the join
        let past_join = ws.first_moves(4);
        assert!(past_join.contains(0) && past_join.contains(1));
        assert!((ws.distance(4) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn unreachable_vertices_stay_empty() {
        let g = XyGraph::from_adjacency(
            vec![(0, 0), (1, 0), (5, 5)],
            vec![vec![(1, 1.0)], vec![], vec![]],
            false,
        )
        .unwrap();
        let mut ws = DijkstraWorkspace::new(g.num_vertices());
        ws.compute_first_moves(&g, 0);
        assert!(ws.first_moves(2).is_empty());
        assert!(ws.distance(2).is_infinite());
    }

    #[test]
    fn workspace_reuse_is_clean() {
        let g = diamond_with_tail();
        let mut ws = DijkstraWorkspace::new(g.num_vertices());
        ws.compute_first_moves(&g, 0);
        assert!(!ws.first_moves(3).is_empty());
        // from source 4 nothing is reachable
        ws.compute_first_moves(&g, 4);
        assert!(ws.first_moves(3).is_empty());
        assert!(ws.distance(3).is_infinite());
    }

    #[test]
    fn reference_costs_match() {
        let g = diamond_with_tail();
        let mut ws = DijkstraWorkspace::new(g.num_vertices());
        assert!((ws.shortest_path_cost(&g, 0, 4) - 3.0).abs() < 1e-12);
        assert!(ws.shortest_path_cost(&g, 4, 0).is_infinite());
        ws.compute_distances(&g, 0);
        assert!((ws.distance(3) - 2.0).abs() < 1e-12);
    }
}
