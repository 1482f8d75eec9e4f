// src/models/local_vol.rs
//! Dupire local volatility from an implied surface
//!
//! # Total-variance form
//!
//! With log-moneyness `y = ln(K / F(T))` and total implied variance
//! `w(T, y) = σ_imp²(T, K) T`:
//! ```text
//!              ∂w/∂T
//! σ_loc² = ─────────────────────────────────────────────────────────────
//!          1 - (y/w) ∂w/∂y + ¼(-¼ - 1/w + y²/w²)(∂w/∂y)² + ½ ∂²w/∂y²
//! ```
//! Derivatives are central differences of the surface. Nodes where the
//! expression is not a positive finite number (calendar or butterfly
//! arbitrage in the quotes) fall back to the implied volatility.
//!
//! The grid is stored as a dense `[time, log-moneyness]` array and read with
//! bilinear interpolation, clamped at the edges.

use super::model::SpotDynamics;
use crate::error::{validation::*, FxResult};
use crate::math_utils::bracket;
use crate::vol::{Extrapolation, VolatilitySurface};
use ndarray::Array2;

const MIN_LOCAL_VOL: f64 = 1e-3;
const MAX_LOCAL_VOL: f64 = 3.0;

#[derive(Debug, Clone)]
pub struct LocalVolGrid {
    times: Vec<f64>,
    log_moneyness: Vec<f64>,
    local_vols: Array2<f64>,
    spot: f64,
    rd: f64,
    rf: f64,
}

impl LocalVolGrid {
    /// Sample local vol on `time_nodes × space_nodes` points up to `expiry`.
    ///
    /// `rd` and `rf` are the flat zero rates to expiry used for the forward.
    pub fn from_surface(
        surface: &VolatilitySurface,
        spot: f64,
        rd: f64,
        rf: f64,
        expiry: f64,
        time_nodes: usize,
        space_nodes: usize,
    ) -> FxResult<Self> {
        validate_positive("spot", spot)?;
        validate_positive("expiry", expiry)?;
        validate_count("local_vol_time_nodes", time_nodes, 1)?;
        validate_count("local_vol_space_nodes", space_nodes, 3)?;

        let surface = surface.clone().with_extrapolation(Extrapolation::Flat);
        let forward = |t: f64| spot * ((rd - rf) * t).exp();
        let total_variance = |t: f64, y: f64| -> FxResult<f64> {
            let vol = surface.volatility_at(t, forward(t) * y.exp())?;
            Ok(vol * vol * t)
        };

        let atm_vol = surface.volatility_at(expiry, forward(expiry))?;
        let y_max = (4.0 * atm_vol * expiry.sqrt()).max(0.05);
        let times: Vec<f64> = (1..=time_nodes)
            .map(|i| expiry * i as f64 / time_nodes as f64)
            .collect();
        let log_moneyness: Vec<f64> = (0..space_nodes)
            .map(|j| -y_max + 2.0 * y_max * j as f64 / (space_nodes - 1) as f64)
            .collect();

        let h_y = 1e-3;
        let mut local_vols = Array2::<f64>::zeros((time_nodes, space_nodes));
        for (i, &t) in times.iter().enumerate() {
            let h_t = (1e-3f64).min(0.5 * t);
            for (j, &y) in log_moneyness.iter().enumerate() {
                let w = total_variance(t, y)?;
                let w_t = (total_variance(t + h_t, y)? - total_variance(t - h_t, y)?) / (2.0 * h_t);
                let w_up = total_variance(t, y + h_y)?;
                let w_dn = total_variance(t, y - h_y)?;
                let w_y = (w_up - w_dn) / (2.0 * h_y);
                let w_yy = (w_up - 2.0 * w + w_dn) / (h_y * h_y);

                let denom = 1.0 - y / w * w_y
                    + 0.25 * (-0.25 - 1.0 / w + y * y / (w * w)) * w_y * w_y
                    + 0.5 * w_yy;
                let local_var = w_t / denom;
                local_vols[[i, j]] = if local_var.is_finite() && local_var > 0.0 && denom > 0.0 {
                    local_var.sqrt().clamp(MIN_LOCAL_VOL, MAX_LOCAL_VOL)
                } else {
                    (w / t).sqrt()
                };
            }
        }

        Ok(Self {
            times,
            log_moneyness,
            local_vols,
            spot,
            rd,
            rf,
        })
    }

    /// σ_loc(t, S), bilinear in `(t, ln(S/F(t)))`
    pub fn local_vol(&self, s: f64, t: f64) -> f64 {
        let y = (s / (self.spot * ((self.rd - self.rf) * t).exp())).ln();
        let (ti, tw) = weight(&self.times, t);
        let (yi, yw) = weight(&self.log_moneyness, y);
        let v = |a: usize, b: usize| self.local_vols[[a, b]];
        let ti1 = (ti + 1).min(self.times.len() - 1);
        let yi1 = (yi + 1).min(self.log_moneyness.len() - 1);
        let lower = v(ti, yi) * (1.0 - yw) + v(ti, yi1) * yw;
        let upper = v(ti1, yi) * (1.0 - yw) + v(ti1, yi1) * yw;
        lower * (1.0 - tw) + upper * tw
    }

    pub fn grid(&self) -> &Array2<f64> {
        &self.local_vols
    }
}

/// Segment index and clamped weight of `x` on `xs`
fn weight(xs: &[f64], x: f64) -> (usize, f64) {
    if xs.len() == 1 {
        return (0, 0.0);
    }
    let i = bracket(xs, x);
    let w = ((x - xs[i]) / (xs[i + 1] - xs[i])).clamp(0.0, 1.0);
    (i, w)
}

impl SpotDynamics for LocalVolGrid {
    fn carry(&self) -> f64 {
        self.rd - self.rf
    }

    fn volatility(&self, s: f64, t: f64) -> f64 {
        self.local_vol(s, t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vol::{InterpolationMethod, SmileSlice};

    #[test]
    fn test_flat_surface_gives_flat_local_vol() {
        let surface = VolatilitySurface::flat(0.12, 1.1).unwrap();
        let grid = LocalVolGrid::from_surface(&surface, 1.1, 0.05, 0.03, 1.0, 10, 21).unwrap();
        for &(s, t) in &[(1.1, 0.5), (0.95, 0.1), (1.3, 0.9), (2.0, 1.0)] {
            assert!((grid.local_vol(s, t) - 0.12).abs() < 1e-6, "σ_loc({}, {})", s, t);
        }
    }

    #[test]
    fn test_term_structure_local_vol() {
        // σ² T: 0.01 * 0.5 then 0.0144 * 1.0, so forward variance is 0.0188 per year
        let slices = vec![
            SmileSlice::new(0.5, 1.1, vec![(1.1, 0.10)]).unwrap(),
            SmileSlice::new(1.0, 1.1, vec![(1.1, 0.12)]).unwrap(),
        ];
        let surface = VolatilitySurface::new(slices, InterpolationMethod::Linear).unwrap();
        let grid = LocalVolGrid::from_surface(&surface, 1.1, 0.0, 0.0, 1.0, 8, 11).unwrap();
        assert!((grid.local_vol(1.1, 0.75) - 0.0188f64.sqrt()).abs() < 1e-6);
    }
}
