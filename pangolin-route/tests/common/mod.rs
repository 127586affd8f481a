//! Shared fixtures for the integration tests.
#![allow(dead_code)] // each test binary uses a different subset

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use pangolin_route::dijkstra::DijkstraWorkspace;
use pangolin_route::parse::parse_grid_map;
use pangolin_route::{Solution, XyGraph};

/// Render a random grid-map text with the given wall density. Seeded, so
/// every test run sees the same maps.
pub fn random_grid_text(width: usize, height: usize, wall_prob: f64, seed: u64) -> String {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut text = format!("type octile\nheight {}\nwidth {}\nmap\n", height, width);
    for _ in 0..height {
        for _ in 0..width {
            text.push(if rng.gen_bool(wall_prob) { '@' } else { '.' });
        }
        text.push('\n');
    }
    text
}

pub fn random_grid(width: usize, height: usize, wall_prob: f64, seed: u64) -> XyGraph {
    parse_grid_map(&random_grid_text(width, height, wall_prob, seed)).unwrap()
}

/// Reference point-to-point cost on the current graph.
pub fn reference_cost(graph: &XyGraph, s: u32, t: u32) -> f64 {
    DijkstraWorkspace::new(graph.num_vertices()).shortest_path_cost(graph, s, t)
}

/// A returned path must be walkable in the graph: consecutive vertices
/// joined by real edges whose weights sum to the reported cost.
pub fn assert_valid_path(graph: &XyGraph, sol: &Solution, start_ext: u32, target_ext: u32) {
    assert!(sol.found(), "expected a path");
    assert_eq!(*sol.path.first().unwrap(), start_ext);
    assert_eq!(*sol.path.last().unwrap(), target_ext);

    let mut cost = 0.0;
    for pair in sol.path.windows(2) {
        let tail = graph.to_graph_id(pair[0]).unwrap();
        let head = graph.to_graph_id(pair[1]).unwrap();
        let edge = graph
            .out_edges(tail)
            .iter()
            .find(|e| e.head == head)
            .unwrap_or_else(|| panic!("no edge {} -> {} in the graph", pair[0], pair[1]));
        cost += edge.weight;
    }
    assert!(
        (cost - sol.sum_of_edge_costs).abs() < 1e-6,
        "path sums to {} but solution claims {}",
        cost,
        sol.sum_of_edge_costs
    );
}

/// Some reachable (start, target) pair with both ids distinct, by scanning
/// from a seeded guess. Panics if the map is fully disconnected.
pub fn reachable_pair(graph: &XyGraph, seed: u64) -> (u32, u32) {
    let n = graph.num_vertices() as u64;
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut ws = DijkstraWorkspace::new(graph.num_vertices());
    for _ in 0..64 {
        let s = (rng.gen::<u64>() % n) as u32;
        let t = (rng.gen::<u64>() % n) as u32;
        if s != t && ws.shortest_path_cost(graph, s, t).is_finite() {
            return (s, t);
        }
    }
    panic!("could not find a reachable pair");
}
