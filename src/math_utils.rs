// src/math_utils.rs
use crate::error::{FxError, FxResult};
use statrs::distribution::{ContinuousCDF, Normal};
use statrs::function::erf;
use std::f64::consts::{PI, SQRT_2};

pub fn norm_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf::erf(x / SQRT_2))
}

/// Standard normal probability density function
///
/// ```text
/// φ(x) = (1/√(2π)) * exp(-x²/2)
/// ```
pub fn norm_pdf(x: f64) -> f64 {
    (1.0 / (2.0 * PI).sqrt()) * (-0.5 * x * x).exp()
}

/// Inverse of the standard normal CDF. `p` must lie in (0, 1).
pub fn norm_inv(p: f64) -> FxResult<f64> {
    if !(p > 0.0 && p < 1.0) {
        return Err(FxError::invalid("probability", p, "must be in (0, 1)"));
    }
    let standard = Normal::new(0.0, 1.0).map_err(|e| FxError::NumericalInstability {
        method: "inverse normal".to_string(),
        reason: e.to_string(),
    })?;
    Ok(standard.inverse_cdf(p))
}

/// Index `i` such that `xs[i] <= x < xs[i + 1]`, clamped to a valid segment.
///
/// `xs` must hold at least two strictly increasing points.
pub fn bracket(xs: &[f64], x: f64) -> usize {
    let n = xs.len();
    debug_assert!(n >= 2);
    let hi = xs.partition_point(|&p| p <= x).clamp(1, n - 1);
    hi - 1
}

/// Piecewise-linear interpolation with flat extrapolation at both ends.
pub fn linear_interpolate(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    debug_assert_eq!(xs.len(), ys.len());
    let n = xs.len();
    if n == 1 || x <= xs[0] {
        return ys[0];
    }
    if x >= xs[n - 1] {
        return ys[n - 1];
    }
    let i = bracket(xs, x);
    if x == xs[i] {
        return ys[i];
    }
    let w = (x - xs[i]) / (xs[i + 1] - xs[i]);
    ys[i] + w * (ys[i + 1] - ys[i])
}

/// Natural cubic spline through `(xs, ys)`.
///
/// Second derivatives are zero at both end knots; queries outside the knot
/// range are clamped to the end values.
#[derive(Debug, Clone, PartialEq)]
pub struct CubicSpline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    second_derivs: Vec<f64>,
}

impl CubicSpline {
    pub fn new(xs: &[f64], ys: &[f64]) -> FxResult<Self> {
        let n = xs.len();
        if n != ys.len() {
            return Err(FxError::invalid(
                "spline_points",
                ys.len() as f64,
                format!("expected {} ordinates", n),
            ));
        }
        if n < 2 {
            return Err(FxError::invalid("spline_points", n as f64, "need at least 2 knots"));
        }
        if xs.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(FxError::invalid(
                "spline_knots",
                f64::NAN,
                "knots must be strictly increasing",
            ));
        }

        let mut second_derivs = vec![0.0; n];
        if n > 2 {
            // Interior system for M_1..M_{n-2}
            let m = n - 2;
            let mut lower = vec![0.0; m];
            let mut diag = vec![0.0; m];
            let mut upper = vec![0.0; m];
            let mut rhs = vec![0.0; m];
            for j in 0..m {
                let i = j + 1;
                let h_prev = xs[i] - xs[i - 1];
                let h_next = xs[i + 1] - xs[i];
                lower[j] = if j > 0 { h_prev } else { 0.0 };
                diag[j] = 2.0 * (h_prev + h_next);
                upper[j] = if j + 1 < m { h_next } else { 0.0 };
                rhs[j] = 6.0 * ((ys[i + 1] - ys[i]) / h_next - (ys[i] - ys[i - 1]) / h_prev);
            }
            let interior = solve_tridiagonal(&lower, &diag, &upper, &rhs)?;
            second_derivs[1..n - 1].copy_from_slice(&interior);
        }

        Ok(Self {
            xs: xs.to_vec(),
            ys: ys.to_vec(),
            second_derivs,
        })
    }

    pub fn eval(&self, x: f64) -> f64 {
        let n = self.xs.len();
        if x <= self.xs[0] {
            return self.ys[0];
        }
        if x >= self.xs[n - 1] {
            return self.ys[n - 1];
        }
        let i = bracket(&self.xs, x);
        if x == self.xs[i] {
            return self.ys[i];
        }
        let h = self.xs[i + 1] - self.xs[i];
        let a = (self.xs[i + 1] - x) / h;
        let b = (x - self.xs[i]) / h;
        a * self.ys[i]
            + b * self.ys[i + 1]
            + ((a * a * a - a) * self.second_derivs[i]
                + (b * b * b - b) * self.second_derivs[i + 1])
                * h
                * h
                / 6.0
    }
}

/// Thomas algorithm for a tridiagonal system.
///
/// `lower[0]` and `upper[n - 1]` are ignored.
pub fn solve_tridiagonal(
    lower: &[f64],
    diag: &[f64],
    upper: &[f64],
    rhs: &[f64],
) -> FxResult<Vec<f64>> {
    let n = diag.len();
    let mut c_star = vec![0.0; n];
    let mut d_star = vec![0.0; n];
    let mut out = vec![0.0; n];
    solve_tridiagonal_inplace(lower, diag, upper, rhs, &mut c_star, &mut d_star, &mut out)?;
    Ok(out)
}

/// In-place Thomas algorithm using caller-owned scratch buffers.
pub fn solve_tridiagonal_inplace(
    lower: &[f64],
    diag: &[f64],
    upper: &[f64],
    rhs: &[f64],
    c_star: &mut [f64],
    d_star: &mut [f64],
    out: &mut [f64],
) -> FxResult<()> {
    let n = diag.len();
    if n == 0 {
        return Ok(());
    }
    if lower.len() != n
        || upper.len() != n
        || rhs.len() != n
        || c_star.len() != n
        || d_star.len() != n
        || out.len() != n
    {
        return Err(FxError::invalid(
            "tridiagonal_system",
            n as f64,
            "band, rhs and scratch lengths must match",
        ));
    }

    let singular = || FxError::NumericalInstability {
        method: "tridiagonal solve".to_string(),
        reason: "singular matrix".to_string(),
    };

    if diag[0].abs() <= 1.0e-14 {
        return Err(singular());
    }
    c_star[0] = if n > 1 { upper[0] / diag[0] } else { 0.0 };
    d_star[0] = rhs[0] / diag[0];

    for i in 1..n {
        let denom = diag[i] - lower[i] * c_star[i - 1];
        if denom.abs() <= 1.0e-14 {
            return Err(singular());
        }
        c_star[i] = if i < n - 1 { upper[i] / denom } else { 0.0 };
        d_star[i] = (rhs[i] - lower[i] * d_star[i - 1]) / denom;
    }

    out[n - 1] = d_star[n - 1];
    for i in (0..n - 1).rev() {
        out[i] = d_star[i] - c_star[i] * out[i + 1];
    }
    Ok(())
}

pub struct Timer {
    start_time: std::time::Instant,
}

impl Timer {
    pub fn new() -> Timer {
        Timer {
            start_time: std::time::Instant::now(),
        }
    }

    pub fn start(&mut self) {
        self.start_time = std::time::Instant::now();
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_norm_inv_round_trip() {
        for &p in &[0.01, 0.25, 0.5, 0.75, 0.99] {
            let x = norm_inv(p).expect("p in (0,1)");
            assert_abs_diff_eq!(norm_cdf(x), p, epsilon = 1e-10);
        }
        assert!(norm_inv(0.0).is_err());
        assert!(norm_inv(1.0).is_err());
    }

    #[test]
    fn test_linear_interpolate_flat_extrapolation() {
        let xs = [1.0, 2.0, 4.0];
        let ys = [10.0, 20.0, 30.0];
        assert_eq!(linear_interpolate(&xs, &ys, 0.5), 10.0);
        assert_eq!(linear_interpolate(&xs, &ys, 5.0), 30.0);
        assert_eq!(linear_interpolate(&xs, &ys, 2.0), 20.0);
        assert_abs_diff_eq!(linear_interpolate(&xs, &ys, 3.0), 25.0, epsilon = 1e-14);
    }

    #[test]
    fn test_cubic_spline_hits_knots_and_reproduces_lines() {
        let xs = [0.0, 1.0, 2.5, 4.0];
        let ys = [1.0, 3.0, 6.0, 9.0];
        let spline = CubicSpline::new(&xs, &ys).expect("valid knots");
        for (x, y) in xs.iter().zip(ys.iter()) {
            assert_eq!(spline.eval(*x), *y);
        }

        let line = CubicSpline::new(&[0.0, 1.0, 2.0, 3.0], &[0.0, 2.0, 4.0, 6.0]).unwrap();
        assert_abs_diff_eq!(line.eval(1.7), 3.4, epsilon = 1e-12);
    }

    #[test]
    fn test_cubic_spline_rejects_unsorted_knots() {
        assert!(CubicSpline::new(&[0.0, 2.0, 1.0], &[1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn test_tridiagonal_solver() {
        // [2 1 0; 1 2 1; 0 1 2] x = [4, 8, 8] -> x = [1, 2, 3]
        let lower = [0.0, 1.0, 1.0];
        let diag = [2.0, 2.0, 2.0];
        let upper = [1.0, 1.0, 0.0];
        let rhs = [4.0, 8.0, 8.0];
        let x = solve_tridiagonal(&lower, &diag, &upper, &rhs).expect("non-singular");
        assert_abs_diff_eq!(x[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(x[1], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(x[2], 3.0, epsilon = 1e-12);
    }
}
