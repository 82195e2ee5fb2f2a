//! Interpolation strategies
//!
//! Two strategies cover every channel role:
//! - numeric channels use a not-a-knot cubic spline, extrapolated past the data
//!   by extending the end polynomial pieces
//! - the categorical stage channel uses nearest-neighbour assignment

use thiserror::Error;

/// Interpolation strategy selected by channel role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    /// Numeric measurements
    CubicSpline,
    /// Categorical markers
    Nearest,
}

/// Reasons a fit cannot be built
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InterpolationError {
    #[error("need at least {required} distinct times, got {found}")]
    TooFewKnots { found: usize, required: usize },

    #[error("non-finite input at index {0}")]
    NonFinite(usize),

    #[error("singular spline system at row {0}")]
    Singular(usize),
}

/// A fitted interpolant that can be evaluated anywhere on the real line
#[derive(Debug, Clone)]
pub enum Interpolant {
    Cubic(CubicSpline),
    Nearest(NearestNeighbor),
}

impl Interpolation {
    /// Fit this strategy to `(x, y)` observations.
    ///
    /// Points are sorted by `x`; duplicate `x` values are merged by averaging.
    pub fn fit(self, points: &[(f64, f64)]) -> Result<Interpolant, InterpolationError> {
        let (xs, ys) = prepare_knots(points)?;
        match self {
            Interpolation::CubicSpline => CubicSpline::fit(xs, ys).map(Interpolant::Cubic),
            Interpolation::Nearest => NearestNeighbor::fit(xs, ys).map(Interpolant::Nearest),
        }
    }
}

impl Interpolant {
    pub fn evaluate(&self, x: f64) -> f64 {
        match self {
            Interpolant::Cubic(spline) => spline.evaluate(x),
            Interpolant::Nearest(nearest) => nearest.evaluate(x),
        }
    }
}

/// Sort by x and average y over equal x
fn prepare_knots(points: &[(f64, f64)]) -> Result<(Vec<f64>, Vec<f64>), InterpolationError> {
    if let Some(i) = points
        .iter()
        .position(|(x, y)| !x.is_finite() || !y.is_finite())
    {
        return Err(InterpolationError::NonFinite(i));
    }

    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut xs: Vec<f64> = Vec::with_capacity(sorted.len());
    let mut ys: Vec<f64> = Vec::with_capacity(sorted.len());
    let mut run = 0usize;

    for (x, y) in sorted {
        match xs.last() {
            Some(&last) if last == x => {
                run += 1;
                if let Some(acc) = ys.last_mut() {
                    // running mean over the duplicate run
                    *acc += (y - *acc) / run as f64;
                }
            }
            _ => {
                xs.push(x);
                ys.push(y);
                run = 1;
            }
        }
    }

    Ok((xs, ys))
}

/// Not-a-knot cubic spline.
///
/// Stores knots and the second derivative at each knot.
#[derive(Debug, Clone)]
pub struct CubicSpline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    second: Vec<f64>,
}

impl CubicSpline {
    /// Fit strictly increasing knots.
    ///
    /// The not-a-knot end conditions make the first two and the last two pieces
    /// share one cubic each. They are folded into the first and last interior
    /// rows so the system stays tridiagonal.
    pub fn fit(xs: Vec<f64>, ys: Vec<f64>) -> Result<Self, InterpolationError> {
        let n = xs.len();
        if n < 4 {
            return Err(InterpolationError::TooFewKnots {
                found: n,
                required: 4,
            });
        }

        let h: Vec<f64> = xs.windows(2).map(|w| w[1] - w[0]).collect();
        let slope: Vec<f64> = (0..n - 1).map(|i| (ys[i + 1] - ys[i]) / h[i]).collect();

        // Unknowns are M_1 ..= M_{n-2}; row k solves for M_{k+1}.
        let m = n - 2;
        let mut lower = vec![0.0; m];
        let mut diag = vec![0.0; m];
        let mut upper = vec![0.0; m];
        let mut rhs = vec![0.0; m];

        for k in 0..m {
            let i = k + 1;
            lower[k] = h[i - 1];
            diag[k] = 2.0 * (h[i - 1] + h[i]);
            upper[k] = h[i];
            rhs[k] = 6.0 * (slope[i] - slope[i - 1]);
        }

        // M_0 = ((h0 + h1) M_1 - h0 M_2) / h1
        let (h0, h1) = (h[0], h[1]);
        diag[0] = (h0 + h1) * (h0 + 2.0 * h1) / h1;
        upper[0] = (h1 * h1 - h0 * h0) / h1;
        lower[0] = 0.0;

        // M_{n-1} = ((a + b) M_{n-2} - b M_{n-3}) / a
        let (a, b) = (h[n - 3], h[n - 2]);
        diag[m - 1] = (a + b) * (2.0 * a + b) / a;
        lower[m - 1] = (a * a - b * b) / a;
        upper[m - 1] = 0.0;

        let interior = solve_tridiagonal(&lower, &diag, &upper, &rhs)?;

        let mut second = Vec::with_capacity(n);
        second.push(((h0 + h1) * interior[0] - h0 * interior[1]) / h1);
        second.extend_from_slice(&interior);
        second.push(((a + b) * interior[m - 1] - b * interior[m - 2]) / a);

        Ok(Self { xs, ys, second })
    }

    /// Evaluate the spline; outside the knots the end pieces are extended.
    pub fn evaluate(&self, x: f64) -> f64 {
        let n = self.xs.len();
        // piece i spans [xs[i], xs[i+1]]
        let i = self
            .xs
            .partition_point(|&knot| knot <= x)
            .saturating_sub(1)
            .min(n - 2);

        let (x0, x1) = (self.xs[i], self.xs[i + 1]);
        let (y0, y1) = (self.ys[i], self.ys[i + 1]);
        let (m0, m1) = (self.second[i], self.second[i + 1]);
        let h = x1 - x0;
        let left = x1 - x;
        let right = x - x0;

        m0 * left.powi(3) / (6.0 * h)
            + m1 * right.powi(3) / (6.0 * h)
            + (y0 / h - m0 * h / 6.0) * left
            + (y1 / h - m1 * h / 6.0) * right
    }
}

/// Thomas algorithm; fails on a zero pivot instead of dividing by it.
fn solve_tridiagonal(
    lower: &[f64],
    diag: &[f64],
    upper: &[f64],
    rhs: &[f64],
) -> Result<Vec<f64>, InterpolationError> {
    let n = diag.len();
    let mut c = vec![0.0; n];
    let mut d = vec![0.0; n];

    for i in 0..n {
        let pivot = if i == 0 {
            diag[0]
        } else {
            diag[i] - lower[i] * c[i - 1]
        };
        if pivot.abs() < f64::EPSILON * diag[i].abs().max(1.0) || !pivot.is_finite() {
            return Err(InterpolationError::Singular(i));
        }
        c[i] = upper[i] / pivot;
        d[i] = if i == 0 {
            rhs[0] / pivot
        } else {
            (rhs[i] - lower[i] * d[i - 1]) / pivot
        };
    }

    let mut solution = vec![0.0; n];
    solution[n - 1] = d[n - 1];
    for i in (0..n - 1).rev() {
        solution[i] = d[i] - c[i] * solution[i + 1];
    }
    Ok(solution)
}

/// Nearest-neighbour lookup.
///
/// A query exactly halfway between two knots takes the earlier one; queries
/// outside the knots take the nearest end.
#[derive(Debug, Clone)]
pub struct NearestNeighbor {
    ys: Vec<f64>,
    midpoints: Vec<f64>,
}

impl NearestNeighbor {
    pub fn fit(xs: Vec<f64>, ys: Vec<f64>) -> Result<Self, InterpolationError> {
        if xs.is_empty() {
            return Err(InterpolationError::TooFewKnots {
                found: 0,
                required: 1,
            });
        }
        let midpoints = xs.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
        Ok(Self { ys, midpoints })
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        let i = self.midpoints.partition_point(|&mid| mid < x);
        self.ys[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() < tol, "{a} != {b} (tol {tol})");
    }

    #[test]
    fn test_spline_reproduces_cubic_exactly() {
        // not-a-knot splines are exact for cubic data
        let f = |x: f64| 0.5 * x.powi(3) - 2.0 * x * x + x - 7.0;
        let points: Vec<(f64, f64)> = [0.0, 0.7, 1.5, 3.0, 4.2, 6.0]
            .iter()
            .map(|&x| (x, f(x)))
            .collect();
        let spline = Interpolation::CubicSpline.fit(&points).unwrap();

        for x in [0.0, 0.3, 1.1, 2.2, 3.7, 5.9, 6.0] {
            assert_close(spline.evaluate(x), f(x), 1e-9);
        }
        // extrapolation on both sides
        assert_close(spline.evaluate(-1.0), f(-1.0), 1e-8);
        assert_close(spline.evaluate(7.5), f(7.5), 1e-8);
    }

    #[test]
    fn test_four_points_give_interpolating_cubic() {
        let f = |x: f64| x.powi(3) - x;
        let points: Vec<(f64, f64)> = [0.0, 1.0, 2.0, 3.0].iter().map(|&x| (x, f(x))).collect();
        let spline = Interpolation::CubicSpline.fit(&points).unwrap();
        assert_close(spline.evaluate(1.5), f(1.5), 1e-9);
        assert_close(spline.evaluate(4.0), f(4.0), 1e-9);
    }

    #[test]
    fn test_spline_passes_through_knots() {
        let points: Vec<(f64, f64)> = (0..20)
            .map(|i| {
                let x = i as f64 * 1.3;
                (x, (x * 0.4).sin() * 3.0 + x)
            })
            .collect();
        let spline = Interpolation::CubicSpline.fit(&points).unwrap();
        for &(x, y) in &points {
            assert_close(spline.evaluate(x), y, 1e-9);
        }
    }

    #[test]
    fn test_unsorted_and_duplicate_times() {
        let points = vec![(3.0, 9.0), (0.0, 0.0), (1.0, 0.0), (1.0, 2.0), (2.0, 4.0)];
        let (xs, ys) = prepare_knots(&points).unwrap();
        assert_eq!(xs, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(ys, vec![0.0, 1.0, 4.0, 9.0]);
    }

    #[test]
    fn test_too_few_distinct_times() {
        let points = vec![(0.0, 1.0), (0.0, 2.0), (1.0, 3.0), (2.0, 4.0)];
        let err = Interpolation::CubicSpline.fit(&points).unwrap_err();
        assert_eq!(
            err,
            InterpolationError::TooFewKnots {
                found: 3,
                required: 4
            }
        );
    }

    #[test]
    fn test_non_finite_rejected() {
        let points = vec![(0.0, 1.0), (1.0, f64::NAN), (2.0, 3.0), (3.0, 4.0)];
        assert!(matches!(
            Interpolation::CubicSpline.fit(&points),
            Err(InterpolationError::NonFinite(1))
        ));
    }

    #[test]
    fn test_nearest_assignment() {
        let points = vec![(0.0, 1.0), (10.0, 2.0), (20.0, 3.0)];
        let nearest = Interpolation::Nearest.fit(&points).unwrap();

        assert_eq!(nearest.evaluate(-5.0), 1.0);
        assert_eq!(nearest.evaluate(4.9), 1.0);
        // halfway goes to the earlier knot
        assert_eq!(nearest.evaluate(5.0), 1.0);
        assert_eq!(nearest.evaluate(5.1), 2.0);
        assert_eq!(nearest.evaluate(15.0), 2.0);
        assert_eq!(nearest.evaluate(99.0), 3.0);
    }

    #[test]
    fn test_nearest_single_knot() {
        let nearest = Interpolation::Nearest.fit(&[(4.0, 7.0)]).unwrap();
        assert_eq!(nearest.evaluate(-100.0), 7.0);
        assert_eq!(nearest.evaluate(100.0), 7.0);
    }
}
