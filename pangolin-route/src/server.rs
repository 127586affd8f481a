//! Long-running query service over a named pipe.
//!
//! Requests arrive as JSON lines on the pipe; each carries its own search
//! options, a batch of queries, and the path the caller wants the aggregate
//! statistics written to. Queries in a batch fan out across rayon workers,
//! one search engine (and arena) per worker. INT/TERM remove the pipe
//! before the process exits.

use std::ffi::CString;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Instant;

use log::{info, warn};
use pangolin_common::{Error, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cpd::Cpd;
use crate::graph::XyGraph;
use crate::search::astar::CpdSearch;
use crate::search::SearchOpts;

#[derive(Debug, Deserialize)]
struct Request {
    /// Where the response statistics are written.
    fifo_out: PathBuf,
    #[serde(default)]
    opts: SearchOpts,
    /// (start, target) pairs, external ids.
    #[serde(default)]
    queries: Vec<(u32, u32)>,
}

#[derive(Debug, Clone, Default, Serialize)]
struct BatchStats {
    n_queries: u64,
    n_solved: u64,
    n_invalid: u64,
    nodes_expanded: u64,
    nodes_inserted: u64,
    nodes_touched: u64,
    nodes_updated: u64,
    path_vertices: u64,
    search_time_nano: u64,
    batch_time_nano: u64,
}

impl BatchStats {
    fn merge(mut self, other: BatchStats) -> BatchStats {
        self.n_queries += other.n_queries;
        self.n_solved += other.n_solved;
        self.n_invalid += other.n_invalid;
        self.nodes_expanded += other.nodes_expanded;
        self.nodes_inserted += other.nodes_inserted;
        self.nodes_touched += other.nodes_touched;
        self.nodes_updated += other.nodes_updated;
        self.path_vertices += other.path_vertices;
        self.search_time_nano += other.search_time_nano;
        self
    }
}

static FIFO_PATH: OnceLock<CString> = OnceLock::new();

extern "C" fn remove_fifo_and_exit(signum: libc::c_int) {
    if let Some(path) = FIFO_PATH.get() {
        unsafe {
            libc::unlink(path.as_ptr());
        }
    }
    unsafe { libc::_exit(signum) }
}

fn create_fifo(path: &Path) -> Result<CString> {
    let c_path = CString::new(path.to_string_lossy().as_bytes())
        .map_err(|_| Error::InvalidArgument("fifo path contains a NUL byte".to_string()))?;
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o666) };
    if rc != 0 {
        return Err(Error::Io(format!(
            "cannot create fifo {}: {}",
            path.display(),
            std::io::Error::last_os_error()
        )));
    }
    Ok(c_path)
}

/// Serve queries from `fifo` until a `quit` line arrives. Blocks forever
/// otherwise; INT/TERM clean up the pipe and terminate the process.
pub fn serve(graph: &XyGraph, cpd: &Cpd, fifo: &Path) -> Result<()> {
    let c_path = create_fifo(fifo)?;
    FIFO_PATH.set(c_path).ok();
    unsafe {
        libc::signal(libc::SIGINT, remove_fifo_and_exit as libc::sighandler_t);
        libc::signal(libc::SIGTERM, remove_fifo_and_exit as libc::sighandler_t);
    }

    info!("serving queries on {}", fifo.display());
    loop {
        // Opening the read end blocks until a writer shows up; when the
        // writer closes we loop around and wait for the next one.
        let file = File::open(fifo).map_err(|e| Error::Io(format!("{}: {}", fifo.display(), e)))?;
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| Error::Io(e.to_string()))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == "quit" {
                info!("quit received, removing {}", fifo.display());
                let _ = std::fs::remove_file(fifo);
                return Ok(());
            }
            match serde_json::from_str::<Request>(line) {
                Ok(request) => {
                    if let Err(e) = handle_request(graph, cpd, &request) {
                        // per-request failures never kill the service
                        warn!("request failed: {}", e);
                    }
                }
                Err(e) => warn!("skipping malformed request: {}", e),
            }
        }
    }
}

fn handle_request(graph: &XyGraph, cpd: &Cpd, request: &Request) -> Result<()> {
    request.opts.validate()?;
    let timer = Instant::now();

    let mut stats = request
        .queries
        .par_iter()
        .map_init(
            || CpdSearch::new(graph, cpd),
            |search, &(start, target)| {
                let mut s = BatchStats { n_queries: 1, ..Default::default() };
                match search.get_path(start, target, &request.opts) {
                    Ok(sol) => {
                        s.n_solved += sol.found() as u64;
                        s.nodes_expanded += sol.nodes_expanded;
                        s.nodes_inserted += sol.nodes_inserted;
                        s.nodes_touched += sol.nodes_touched;
                        s.nodes_updated += sol.nodes_updated;
                        s.path_vertices += sol.path.len() as u64;
                        s.search_time_nano += sol.time_nano;
                    }
                    Err(e) => {
                        warn!("query ({}, {}) rejected: {}", start, target, e);
                        s.n_invalid += 1;
                    }
                }
                s
            },
        )
        .reduce(BatchStats::default, BatchStats::merge);
    stats.batch_time_nano = timer.elapsed().as_nanos() as u64;

    info!(
        "batch done: {} queries, {} solved, {} expansions",
        stats.n_queries, stats.n_solved, stats.nodes_expanded
    );

    let mut out = File::create(&request.fifo_out)
        .map_err(|e| Error::Io(format!("{}: {}", request.fifo_out.display(), e)))?;
    serde_json::to_writer(&mut out, &stats).map_err(|e| Error::Io(e.to_string()))?;
    out.write_all(b"\n").map_err(|e| Error::Io(e.to_string()))?;
    Ok(())
}
