//! Text input parsers: grid maps, DIMACS graphs, perturbation diffs and
//! problem files.
//!
//! All parsers skip comment lines (`c`, `#`, `%`) and recover from malformed
//! records by logging a warning and moving on; structural failures (missing
//! header, truncated map) abort the load.

use std::fs;
use std::path::Path;

use log::warn;
use pangolin_common::{Error, Result};

use crate::geo::SQRT2;
use crate::graph::{Metric, XyGraph};

fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| Error::Io(format!("{}: {}", path.display(), e)))
}

fn is_comment(line: &str) -> bool {
    matches!(line.trim_start().chars().next(), None | Some('c') | Some('#') | Some('%'))
}

/// Load a grid map in the format used by the grid-based path planning
/// benchmarks: a four-line header (`type`, `height H`, `width W`, `map`)
/// followed by `H` rows of `W` terrain characters.
pub fn load_grid_map(path: &Path) -> Result<XyGraph> {
    parse_grid_map(&read_to_string(path)?)
}

pub fn parse_grid_map(text: &str) -> Result<XyGraph> {
    let mut lines = text.lines();
    let mut height = None;
    let mut width = None;

    loop {
        let line = lines
            .next()
            .ok_or_else(|| Error::Io("grid header ended before 'map' line".to_string()))?;
        let mut it = line.split_whitespace();
        match it.next() {
            Some("type") => {} // octile assumed
            Some("height") => {
                height = it.next().and_then(|v| v.parse::<usize>().ok());
            }
            Some("width") => {
                width = it.next().and_then(|v| v.parse::<usize>().ok());
            }
            Some("map") => break,
            _ => return Err(Error::Io(format!("unexpected grid header line '{}'", line))),
        }
    }

    let height = height.ok_or_else(|| Error::Io("grid header missing height".to_string()))?;
    let width = width.ok_or_else(|| Error::Io("grid header missing width".to_string()))?;

    let mut passable = vec![false; width * height];
    for y in 0..height {
        let row = lines
            .next()
            .ok_or_else(|| Error::Io(format!("grid map truncated at row {}", y)))?;
        if row.chars().count() < width {
            return Err(Error::Io(format!("grid row {} shorter than width {}", y, width)));
        }
        for (x, c) in row.chars().take(width).enumerate() {
            passable[y * width + x] = matches!(c, '.' | 'G' | 'S');
        }
    }

    grid_to_graph(width, height, &passable)
}

/// Convert a passability mask to an 8-connected graph. Straight moves cost 1,
/// diagonal moves cost sqrt(2); a diagonal is traversable only when both of
/// its orthogonal neighbours are passable (no corner cutting).
fn grid_to_graph(width: usize, height: usize, passable: &[bool]) -> Result<XyGraph> {
    let mut cell_to_vertex = vec![u32::MAX; width * height];
    let mut xy = Vec::new();
    for y in 0..height {
        for x in 0..width {
            if passable[y * width + x] {
                cell_to_vertex[y * width + x] = xy.len() as u32;
                xy.push((x as i32, y as i32));
            }
        }
    }

    let open = |x: isize, y: isize| -> bool {
        x >= 0
            && y >= 0
            && (x as usize) < width
            && (y as usize) < height
            && passable[y as usize * width + x as usize]
    };

    // Clockwise from north; straight moves first so that grids with ties
    // still enumerate deterministically.
    const STEPS: [(isize, isize); 8] = [
        (0, -1),
        (1, 0),
        (0, 1),
        (-1, 0),
        (1, -1),
        (1, 1),
        (-1, 1),
        (-1, -1),
    ];

    let mut adjacency = vec![Vec::new(); xy.len()];
    for (v, &(x, y)) in xy.iter().enumerate() {
        let (x, y) = (x as isize, y as isize);
        for &(dx, dy) in &STEPS {
            let (nx, ny) = (x + dx, y + dy);
            if !open(nx, ny) {
                continue;
            }
            let diagonal = dx != 0 && dy != 0;
            if diagonal && !(open(x + dx, y) && open(x, y + dy)) {
                continue;
            }
            let head = cell_to_vertex[ny as usize * width + nx as usize];
            let weight = if diagonal { SQRT2 } else { 1.0 };
            adjacency[v].push((head, weight));
        }
    }

    // unit/sqrt(2) steps realise the octile metric, so searches get the
    // tighter lower bound
    XyGraph::from_adjacency(xy, adjacency, false).map(|g| g.with_metric(Metric::Octile))
}

/// Load a DIMACS shortest-path instance: a `.gr` file of arcs and a `.co`
/// file of vertex coordinates. External ids are 1-indexed.
pub fn load_dimacs(gr_path: &Path, co_path: &Path, enforce_euclidean: bool) -> Result<XyGraph> {
    parse_dimacs(
        &read_to_string(gr_path)?,
        &read_to_string(co_path)?,
        enforce_euclidean,
    )
}

pub fn parse_dimacs(gr_text: &str, co_text: &str, enforce_euclidean: bool) -> Result<XyGraph> {
    let mut num_vertices = 0usize;

    let mut xy = Vec::new();
    for line in co_text.lines() {
        if is_comment(line) {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            ["p", .., n] => {
                num_vertices = n
                    .parse()
                    .map_err(|_| Error::Io(format!("bad co problem line '{}'", line)))?;
                xy = vec![(0, 0); num_vertices];
            }
            ["v", id, x, y] => {
                let (Ok(id), Ok(x), Ok(y)) =
                    (id.parse::<usize>(), x.parse::<i32>(), y.parse::<i32>())
                else {
                    warn!("skipping malformed coordinate line '{}'", line);
                    continue;
                };
                if id == 0 || id > num_vertices {
                    warn!("skipping coordinate for out-of-range vertex {}", id);
                    continue;
                }
                xy[id - 1] = (x, y);
            }
            _ => warn!("skipping malformed coordinate line '{}'", line),
        }
    }
    if num_vertices == 0 {
        return Err(Error::Io("co file has no problem line".to_string()));
    }

    let mut adjacency = vec![Vec::new(); num_vertices];
    let mut saw_problem_line = false;
    for line in gr_text.lines() {
        if is_comment(line) {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            ["p", ..] => saw_problem_line = true,
            ["a", tail, head, weight] => {
                let (Ok(tail), Ok(head), Ok(weight)) =
                    (tail.parse::<usize>(), head.parse::<usize>(), weight.parse::<f64>())
                else {
                    warn!("skipping malformed arc line '{}'", line);
                    continue;
                };
                if tail == 0 || tail > num_vertices || head == 0 || head > num_vertices {
                    warn!("skipping arc with out-of-range endpoint '{}'", line);
                    continue;
                }
                adjacency[tail - 1].push((head as u32 - 1, weight));
            }
            _ => warn!("skipping malformed arc line '{}'", line),
        }
    }
    if !saw_problem_line {
        return Err(Error::Io("gr file has no problem line".to_string()));
    }

    XyGraph::from_adjacency(xy, adjacency, enforce_euclidean)
}

/// Load a perturbation stream: `tail head new_weight` triples with external
/// (1-indexed) vertex ids.
pub fn load_diff(path: &Path) -> Result<Vec<(u32, u32, f64)>> {
    parse_diff(&read_to_string(path)?)
}

pub fn parse_diff(text: &str) -> Result<Vec<(u32, u32, f64)>> {
    let mut changes = Vec::new();
    for line in text.lines() {
        if is_comment(line) {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let [tail, head, weight] = fields.as_slice() else {
            warn!("skipping malformed perturbation line '{}'", line);
            continue;
        };
        let (Ok(tail), Ok(head), Ok(weight)) =
            (tail.parse::<u32>(), head.parse::<u32>(), weight.parse::<f64>())
        else {
            warn!("skipping malformed perturbation line '{}'", line);
            continue;
        };
        changes.push((tail, head, weight));
    }
    Ok(changes)
}

/// Load a problem file: one `start target` pair per line, external ids.
pub fn load_problems(path: &Path) -> Result<Vec<(u32, u32)>> {
    parse_problems(&read_to_string(path)?)
}

pub fn parse_problems(text: &str) -> Result<Vec<(u32, u32)>> {
    let mut problems = Vec::new();
    for line in text.lines() {
        if is_comment(line) {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let [start, target] = fields.as_slice() else {
            warn!("skipping malformed problem line '{}'", line);
            continue;
        };
        let (Ok(start), Ok(target)) = (start.parse::<u32>(), target.parse::<u32>()) else {
            warn!("skipping malformed problem line '{}'", line);
            continue;
        };
        problems.push((start, target));
    }
    Ok(problems)
}
