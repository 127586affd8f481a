//! Distance helpers on integer planar coordinates.
//!
//! Grid maps use unit cell spacing, so the octile metric over cells and the
//! Euclidean metric over coordinates agree on single steps. DIMACS road
//! networks carry their own coordinate scale; the loader checks edge weights
//! against these distances when the embedding is declared Euclidean.

/// Cost of a diagonal step on a uniform grid.
pub const SQRT2: f64 = std::f64::consts::SQRT_2;

/// Straight-line distance between two points.
pub fn euclidean_distance(a: (i32, i32), b: (i32, i32)) -> f64 {
    let dx = (a.0 - b.0) as f64;
    let dy = (a.1 - b.1) as f64;
    (dx * dx + dy * dy).sqrt()
}

/// Octile distance: shortest 8-connected path length on an open grid.
pub fn octile_distance(a: (i32, i32), b: (i32, i32)) -> f64 {
    let dx = (a.0 - b.0).abs() as f64;
    let dy = (a.1 - b.1).abs() as f64;
    let (lo, hi) = if dx < dy { (dx, dy) } else { (dy, dx) };
    lo * SQRT2 + (hi - lo)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn octile_diagonal() {
        assert!((octile_distance((0, 0), (2, 2)) - 2.0 * SQRT2).abs() < 1e-12);
    }

    #[test]
    fn octile_mixed() {
        // 3 across, 1 down: one diagonal plus two straight steps
        let d = octile_distance((0, 0), (3, 1));
        assert!((d - (SQRT2 + 2.0)).abs() < 1e-12);
    }

    #[test]
    fn euclidean_never_exceeds_octile() {
        for &(a, b) in &[((0, 0), (5, 3)), ((2, 7), (-1, -4)), ((0, 0), (0, 9))] {
            assert!(euclidean_distance(a, b) <= octile_distance(a, b) + 1e-12);
        }
    }
}
