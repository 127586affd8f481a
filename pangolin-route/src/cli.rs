//! CLI commands for pangolin-route.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use crate::cpd::builder::build_cpd;
use crate::dijkstra::DijkstraWorkspace;
use crate::formats::cpd_file;
use crate::graph::XyGraph;
use crate::parse;
use crate::search::astar::CpdSearch;
use crate::search::SearchOpts;
use crate::server;

#[derive(Parser)]
#[command(name = "pangolin-route")]
#[command(about = "Compressed path database preprocessing and search", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a CPD from a graph
    Preprocess {
        /// Input graph: a .map grid file or a DIMACS .gr file
        #[arg(short, long)]
        input: PathBuf,

        /// DIMACS coordinate file (defaults to the .gr path with a .co extension)
        #[arg(long)]
        co: Option<PathBuf>,

        /// Require every DIMACS arc weight to be at least the euclidean gap
        #[arg(long)]
        euclidean: bool,

        /// Output CPD file (defaults to the input path plus .cpd)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Worker threads; 0 means one per core
        #[arg(short, long, default_value = "0")]
        threads: usize,
    },

    /// Run a batch of queries from a problem file
    Query {
        /// Input graph: a .map grid file or a DIMACS .gr file
        #[arg(short, long)]
        input: PathBuf,

        /// DIMACS coordinate file (defaults to the .gr path with a .co extension)
        #[arg(long)]
        co: Option<PathBuf>,

        /// Require every DIMACS arc weight to be at least the euclidean gap
        #[arg(long)]
        euclidean: bool,

        /// Edge-weight perturbations applied after load
        #[arg(long)]
        diff: Option<PathBuf>,

        /// CPD file (defaults to the input path plus .cpd)
        #[arg(long)]
        cpd: Option<PathBuf>,

        /// Problem file: one "start target" pair per line, external ids
        #[arg(short, long)]
        problem: PathBuf,

        #[arg(long)]
        cost_cutoff: Option<f64>,

        #[arg(long)]
        expansion_cutoff: Option<u64>,

        #[arg(long)]
        time_cutoff_nano: Option<u64>,

        #[arg(long, default_value = "1.0")]
        hscale: f64,

        #[arg(long, default_value = "1.0")]
        quality_ratio: f64,

        #[arg(long)]
        k_moves_max: Option<u32>,

        /// Log incumbent changes
        #[arg(long)]
        debug: bool,

        /// Per-expansion logging
        #[arg(long)]
        verbose: bool,
    },

    /// Check CPD extractions against a reference Dijkstra on sampled pairs
    Validate {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(long)]
        co: Option<PathBuf>,

        #[arg(long)]
        euclidean: bool,

        #[arg(long)]
        cpd: Option<PathBuf>,

        /// Number of (source, target) pairs to check
        #[arg(long, default_value = "1000")]
        samples: usize,
    },

    /// Serve queries from a named pipe
    Serve {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(long)]
        co: Option<PathBuf>,

        #[arg(long)]
        euclidean: bool,

        #[arg(long)]
        diff: Option<PathBuf>,

        #[arg(long)]
        cpd: Option<PathBuf>,

        /// Path of the named pipe to create
        #[arg(long, default_value = "/tmp/pangolin.fifo")]
        fifo: PathBuf,
    },
}

fn load_graph(
    input: &Path,
    co: Option<&Path>,
    diff: Option<&Path>,
    enforce_euclidean: bool,
) -> Result<XyGraph> {
    let mut graph = match input.extension().and_then(|e| e.to_str()) {
        Some("map") => parse::load_grid_map(input)
            .with_context(|| format!("loading grid map {}", input.display()))?,
        Some("gr") => {
            let co_path = co
                .map(Path::to_path_buf)
                .unwrap_or_else(|| input.with_extension("co"));
            parse::load_dimacs(input, &co_path, enforce_euclidean)
                .with_context(|| format!("loading dimacs graph {}", input.display()))?
        }
        _ => bail!("cannot tell the format of {} (expected .map or .gr)", input.display()),
    };
    info!(
        "loaded graph: {} vertices, {} edges",
        graph.num_vertices(),
        graph.num_edges()
    );

    if let Some(diff_path) = diff {
        let changes = parse::load_diff(diff_path)
            .with_context(|| format!("loading perturbations {}", diff_path.display()))?;
        let internal: Vec<(u32, u32, f64)> = changes
            .into_iter()
            .filter_map(|(tail, head, weight)| {
                match (graph.to_graph_id(tail), graph.to_graph_id(head)) {
                    (Ok(t), Ok(h)) => Some((t, h, weight)),
                    _ => {
                        warn!("perturbation {}->{} out of range; ignored", tail, head);
                        None
                    }
                }
            })
            .collect();
        info!("applying {} perturbations", internal.len());
        graph.perturb(internal)?;
    }
    Ok(graph)
}

fn default_cpd_path(input: &Path) -> PathBuf {
    let mut s = input.as_os_str().to_os_string();
    s.push(".cpd");
    PathBuf::from(s)
}

fn read_cpd_for(graph: &XyGraph, input: &Path, cpd: Option<PathBuf>) -> Result<crate::cpd::Cpd> {
    let cpd_path = cpd.unwrap_or_else(|| default_cpd_path(input));
    let cpd = cpd_file::read(&cpd_path)
        .with_context(|| format!("reading {}", cpd_path.display()))?;
    if cpd.num_rows() != graph.num_vertices() {
        bail!(
            "{} holds {} rows but the graph has {} vertices",
            cpd_path.display(),
            cpd.num_rows(),
            graph.num_vertices()
        );
    }
    Ok(cpd)
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Preprocess { input, co, euclidean, output, threads } => {
            let graph = load_graph(&input, co.as_deref(), None, euclidean)?;
            let cpd = build_cpd(&graph, threads)?;
            let output = output.unwrap_or_else(|| default_cpd_path(&input));
            cpd_file::write(&output, &cpd)
                .with_context(|| format!("writing {}", output.display()))?;
            info!("wrote {} ({} runs)", output.display(), cpd.num_runs());
            Ok(())
        }

        Commands::Query {
            input,
            co,
            euclidean,
            diff,
            cpd,
            problem,
            cost_cutoff,
            expansion_cutoff,
            time_cutoff_nano,
            hscale,
            quality_ratio,
            k_moves_max,
            debug,
            verbose,
        } => {
            let graph = load_graph(&input, co.as_deref(), diff.as_deref(), euclidean)?;
            let cpd = read_cpd_for(&graph, &input, cpd)?;

            let mut opts = SearchOpts {
                hscale,
                quality_ratio,
                debug,
                verbose,
                ..Default::default()
            };
            if let Some(c) = cost_cutoff {
                opts.cost_cutoff = c;
            }
            if let Some(c) = expansion_cutoff {
                opts.expansion_cutoff = c;
            }
            if let Some(c) = time_cutoff_nano {
                opts.time_cutoff_nano = c;
            }
            if let Some(c) = k_moves_max {
                opts.k_moves_max = c;
            }
            opts.validate().context("search options")?;

            let problems = parse::load_problems(&problem)
                .with_context(|| format!("loading problems {}", problem.display()))?;
            info!("running {} queries", problems.len());

            let mut search = CpdSearch::new(&graph, &cpd);
            println!("start\ttarget\tcost\treason\texpanded\ttouched\ttime_ns");
            for (start, target) in problems {
                match search.get_path(start, target, &opts) {
                    Ok(sol) => println!(
                        "{}\t{}\t{:.6}\t{}\t{}\t{}\t{}",
                        start,
                        target,
                        sol.sum_of_edge_costs,
                        sol.reason,
                        sol.nodes_expanded,
                        sol.nodes_touched,
                        sol.time_nano
                    ),
                    Err(e) => warn!("query ({}, {}) rejected: {}", start, target, e),
                }
            }
            Ok(())
        }

        Commands::Validate { input, co, euclidean, cpd, samples } => {
            let graph = load_graph(&input, co.as_deref(), None, euclidean)?;
            let cpd = read_cpd_for(&graph, &input, cpd)?;

            let n = graph.num_vertices() as u64;
            let mut reference = DijkstraWorkspace::new(graph.num_vertices());
            let mut mismatches = 0usize;
            // Deterministic pseudo-random pair sampling; no RNG state to seed.
            let mut x = 0x243f6a8885a308d3u64;
            for _ in 0..samples {
                x ^= x << 13;
                x ^= x >> 7;
                x ^= x << 17;
                let s = (x % n) as u32;
                let t = ((x >> 32) % n) as u32;

                let expected = reference.shortest_path_cost(&graph, s, t);
                let got = cpd
                    .extract_path(&graph, s, t)
                    .map(|(_, cost)| cost)
                    .unwrap_or(f64::INFINITY);
                let agree = if expected.is_infinite() {
                    got.is_infinite()
                } else {
                    (got - expected).abs() <= graph.epsilon().max(1e-9)
                };
                if !agree {
                    warn!("({}, {}): cpd cost {} vs dijkstra {}", s, t, got, expected);
                    mismatches += 1;
                }
            }
            if mismatches > 0 {
                bail!("{} of {} sampled pairs disagree", mismatches, samples);
            }
            info!("all {} sampled pairs agree", samples);
            Ok(())
        }

        Commands::Serve { input, co, euclidean, diff, cpd, fifo } => {
            let graph = load_graph(&input, co.as_deref(), diff.as_deref(), euclidean)?;
            let cpd = read_cpd_for(&graph, &input, cpd)?;
            server::serve(&graph, &cpd, &fifo)?;
            Ok(())
        }
    }
}
