//! End-to-end CPD construction scenarios: extraction against a reference
//! Dijkstra, allowed-set soundness, persistence and determinism.

mod common;

use common::{random_grid, reference_cost};
use pangolin_route::dijkstra::DijkstraWorkspace;
use pangolin_route::formats::cpd_file;
use pangolin_route::geo::SQRT2;
use pangolin_route::parse::parse_grid_map;
use pangolin_route::{build_cpd, CpdSearch, SearchOpts, StopReason};

#[test]
fn tiny_open_grid_first_move_is_diagonal() {
    // 3x3, all passable: the corner-to-corner query walks the diagonal.
    let g = parse_grid_map("type octile\nheight 3\nwidth 3\nmap\n...\n...\n...\n").unwrap();
    let cpd = build_cpd(&g, 1).unwrap();

    let s = g.find_vertex(0, 0).unwrap();
    let t = g.find_vertex(2, 2).unwrap();

    let (path, cost) = cpd.extract_path(&g, s, t).unwrap();
    assert!((cost - 2.0 * SQRT2).abs() < 1e-9);
    assert_eq!(path.len(), 3);

    let first = cpd.next_edge(&g, s, t).unwrap();
    let head = g.out_edges(s)[first].head;
    assert_eq!(g.xy(head), (1, 1));
}

#[test]
fn wall_is_routed_around() {
    // Vertical wall in column 2, gap at the bottom row.
    let g = parse_grid_map(
        "type octile\nheight 5\nwidth 5\nmap\n..@..\n..@..\n..@..\n..@..\n.....\n",
    )
    .unwrap();
    let cpd = build_cpd(&g, 1).unwrap();

    let s = g.find_vertex(0, 0).unwrap();
    let t = g.find_vertex(4, 0).unwrap();

    let (path, cost) = cpd.extract_path(&g, s, t).unwrap();
    assert!((cost - reference_cost(&g, s, t)).abs() < 1e-9);
    // the detour must dip to the gap row
    assert!(path.iter().any(|&v| g.xy(v).1 == 4));
}

#[test]
fn disconnected_components_are_unreachable() {
    let g = parse_grid_map("type octile\nheight 2\nwidth 5\nmap\n..@..\n..@..\n").unwrap();
    let cpd = build_cpd(&g, 1).unwrap();

    let s = g.find_vertex(0, 0).unwrap();
    let t = g.find_vertex(4, 1).unwrap();
    assert!(cpd.extract_path(&g, s, t).is_none());

    let mut search = CpdSearch::new(&g, &cpd);
    let sol = search
        .get_path(g.to_external_id(s), g.to_external_id(t), &SearchOpts::default())
        .unwrap();
    assert_eq!(sol.reason, StopReason::Unreachable);
    assert!(sol.path.is_empty());
    assert!(sol.sum_of_edge_costs.is_infinite());
    assert!(sol.nodes_expanded < g.num_vertices() as u64 * 2);
}

#[test]
fn extraction_matches_dijkstra_on_random_grids() {
    for seed in [7u64, 21, 63] {
        let g = random_grid(12, 12, 0.25, seed);
        let cpd = build_cpd(&g, 2).unwrap();
        let mut reference = DijkstraWorkspace::new(g.num_vertices());

        for s in 0..g.num_vertices() as u32 {
            reference.compute_distances(&g, s);
            // stride through targets to keep the matrix check cheap
            for t in (0..g.num_vertices() as u32).step_by(3) {
                let expected = reference.distance(t);
                match cpd.extract_path(&g, s, t) {
                    Some((_, cost)) => {
                        assert!(
                            (cost - expected).abs() < 1e-9,
                            "seed {} ({}, {}): {} vs {}",
                            seed,
                            s,
                            t,
                            cost,
                            expected
                        );
                    }
                    None => assert!(s != t && expected.is_infinite()),
                }
            }
        }
    }
}

#[test]
fn allowed_sets_are_sound() {
    // Every recorded first move must start some optimal path: stepping along
    // it and continuing optimally costs exactly the optimal distance.
    let g = random_grid(8, 8, 0.2, 11);
    let n = g.num_vertices();

    let mut ws = DijkstraWorkspace::new(n);
    let mut all_dist = vec![vec![0.0f64; n]; n];
    for v in 0..n as u32 {
        ws.compute_distances(&g, v);
        for u in 0..n as u32 {
            all_dist[v as usize][u as usize] = ws.distance(u);
        }
    }

    for s in [0u32, (n / 2) as u32, (n - 1) as u32] {
        ws.compute_first_moves(&g, s);
        for v in 0..n as u32 {
            let moves = ws.first_moves(v);
            if v == s {
                assert!(moves.is_empty());
                continue;
            }
            if all_dist[s as usize][v as usize].is_infinite() {
                assert!(moves.is_empty());
                continue;
            }
            assert!(!moves.is_empty());
            for (i, e) in g.out_edges(s).iter().enumerate() {
                if !moves.contains(i as u8) {
                    continue;
                }
                let via = e.weight + all_dist[e.head as usize][v as usize];
                assert!(
                    (via - all_dist[s as usize][v as usize]).abs() < 1e-9,
                    "move {} from {} is not optimal towards {}",
                    i,
                    s,
                    v
                );
            }
        }
    }
}

#[test]
fn file_roundtrip_preserves_queries() {
    let g = random_grid(10, 10, 0.2, 5);
    let cpd = build_cpd(&g, 1).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("grid.cpd");
    cpd_file::write(&path, &cpd).unwrap();
    let loaded = cpd_file::read(&path).unwrap();

    for s in (0..g.num_vertices() as u32).step_by(7) {
        for t in (0..g.num_vertices() as u32).step_by(5) {
            assert_eq!(loaded.first_move(s, t), cpd.first_move(s, t));
        }
    }
}

#[test]
fn builds_are_identical_across_thread_counts() {
    let g = random_grid(10, 10, 0.25, 42);
    let single = build_cpd(&g, 1).unwrap();
    let many = build_cpd(&g, 8).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("single.cpd");
    let b = dir.path().join("many.cpd");
    cpd_file::write(&a, &single).unwrap();
    cpd_file::write(&b, &many).unwrap();

    assert_eq!(std::fs::read(&a).unwrap(), std::fs::read(&b).unwrap());
}
