//! Parallel CPD construction.
//!
//! One Dijkstra workspace per worker; sources are processed in ordered-id
//! space and collected back in that same order, so the assembled database is
//! identical whatever the thread count. The only cross-thread state is a
//! progress counter.

use std::sync::atomic::{AtomicUsize, Ordering};

use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use pangolin_common::{Error, Result};
use rayon::prelude::*;

use crate::cpd::row::{self, FirstMoveSet, Run};
use crate::cpd::Cpd;
use crate::dijkstra::DijkstraWorkspace;
use crate::graph::XyGraph;
use crate::order::NodeOrder;

fn progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} rows ({percent}%) ETA: {eta}")
            .expect("progress template is valid")
            .progress_chars("#>-"),
    );
    pb
}

/// Compute the node ordering and every compressed row, using `threads`
/// rayon workers (0 means one per core).
pub fn build_cpd(graph: &XyGraph, threads: usize) -> Result<Cpd> {
    let n = graph.num_vertices();
    if n == 0 {
        return Err(Error::InvalidGraph("cannot build a CPD for an empty graph".to_string()));
    }

    info!("computing node ordering for {} vertices", n);
    let order = NodeOrder::dfs_preorder(graph);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| Error::InvalidArgument(format!("cannot build thread pool: {}", e)))?;

    info!("computing {} Dijkstra rows on {} threads", n, pool.current_num_threads());
    let pb = progress_bar(n as u64);
    let processed = AtomicUsize::new(0);

    let order_ref = &order;
    let pb_ref = &pb;
    let processed_ref = &processed;

    let rows: Vec<Vec<Run>> = pool.install(|| {
        (0..n as u32)
            .into_par_iter()
            .map_init(
                || (DijkstraWorkspace::new(n), vec![FirstMoveSet::EMPTY; n]),
                move |(ws, row_buf), row_id| {
                    let source = order_ref.to_old(row_id);
                    ws.compute_first_moves(graph, source);
                    for v in 0..n as u32 {
                        row_buf[order_ref.to_new(v) as usize] = ws.first_moves(v);
                    }
                    let runs = row::compress(row_buf);

                    pb_ref.inc(1);
                    let done = processed_ref.fetch_add(1, Ordering::Relaxed) + 1;
                    if (done * 10 / n) > ((done - 1) * 10 / n) {
                        info!("cpd rows: {}/{} ({}%)", done, n, done * 100 / n);
                    }
                    runs
                },
            )
            .collect()
    });
    pb.finish_and_clear();

    let mut row_begin = Vec::with_capacity(n + 1);
    let mut runs = Vec::new();
    row_begin.push(0u64);
    for r in rows {
        runs.extend_from_slice(&r);
        row_begin.push(runs.len() as u64);
    }
    info!("cpd assembled: {} runs over {} rows", runs.len(), n);

    Cpd::from_parts(order, row_begin, runs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dijkstra::DijkstraWorkspace;
    use crate::parse::parse_grid_map;

    #[test]
    fn extraction_agrees_with_dijkstra_on_small_grid() {
        let g = parse_grid_map(
            "type octile\nheight 4\nwidth 4\nmap\n....\n.@..\n..@.\n....\n",
        )
        .unwrap();
        let cpd = build_cpd(&g, 1).unwrap();
        let mut reference = DijkstraWorkspace::new(g.num_vertices());

        for s in 0..g.num_vertices() as u32 {
            reference.compute_distances(&g, s);
            for t in 0..g.num_vertices() as u32 {
                let expected = reference.distance(t);
                match cpd.extract_path(&g, s, t) {
                    Some((path, cost)) => {
                        assert!((cost - expected).abs() < 1e-9, "({}, {})", s, t);
                        assert_eq!(*path.first().unwrap(), s);
                        assert_eq!(*path.last().unwrap(), t);
                    }
                    None => assert!(s != t && expected.is_infinite(), "({}, {})", s, t),
                }
            }
        }
    }

    #[test]
    fn rows_cover_every_source() {
        let g = parse_grid_map("type octile\nheight 2\nwidth 3\nmap\n...\n...\n").unwrap();
        let cpd = build_cpd(&g, 2).unwrap();
        assert_eq!(cpd.num_rows(), g.num_vertices());
        assert_eq!(cpd.row_begin().len(), g.num_vertices() + 1);
        assert_eq!(*cpd.row_begin().last().unwrap(), cpd.num_runs() as u64);
    }
}
