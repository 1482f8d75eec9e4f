// src/vol/sabr.rs
//! SABR smile parametrisation
//!
//! # Hagan lognormal expansion
//!
//! For forward `f`, strike `K` and expiry `T`:
//! ```text
//! σ(K) = α / [(fK)^((1-β)/2) (1 + (1-β)²/24 ln²(f/K) + (1-β)⁴/1920 ln⁴(f/K))]
//!        · z/x(z)
//!        · [1 + ((1-β)²α²/(24(fK)^(1-β)) + ρβνα/(4(fK)^((1-β)/2)) + (2-3ρ²)ν²/24) T]
//!
//! z = (ν/α)(fK)^((1-β)/2) ln(f/K)
//! x(z) = ln[(√(1 - 2ρz + z²) + z - ρ) / (1 - ρ)]
//! ```
//!
//! # Fitting
//!
//! All four parameters are fitted per slice by damped Gauss–Newton
//! (Levenberg–Marquardt) on the vol residuals, with central-difference
//! Jacobians and projection back onto the admissible box after every step.

use crate::error::{FxError, FxResult};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

const N_PARAMS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SabrParams {
    pub alpha: f64,
    pub beta: f64,
    pub rho: f64,
    pub nu: f64,
}

impl SabrParams {
    pub fn implied_vol(&self, f: f64, k: f64, t: f64) -> f64 {
        let one_minus_beta = 1.0 - self.beta;
        let (alpha, rho, nu) = (self.alpha, self.rho, self.nu);

        let fk = f * k;
        let fk_half = fk.powf(0.5 * one_minus_beta);
        let correction = 1.0
            + (one_minus_beta * one_minus_beta * alpha * alpha / (24.0 * fk_half * fk_half)
                + rho * self.beta * nu * alpha / (4.0 * fk_half)
                + (2.0 - 3.0 * rho * rho) * nu * nu / 24.0)
                * t;

        let log_fk = (f / k).ln();
        if log_fk.abs() < 1e-12 {
            return alpha / fk_half * correction;
        }

        let log2 = log_fk * log_fk;
        let denom = fk_half
            * (1.0
                + one_minus_beta * one_minus_beta / 24.0 * log2
                + one_minus_beta.powi(4) / 1920.0 * log2 * log2);
        let z = nu / alpha * fk_half * log_fk;
        alpha / denom * z_over_x(z, rho) * correction
    }

    fn to_vector(self) -> [f64; N_PARAMS] {
        [self.alpha, self.beta, self.rho, self.nu]
    }

    fn from_vector(x: &[f64; N_PARAMS]) -> Self {
        SabrParams {
            alpha: x[0].max(1e-6),
            beta: x[1].clamp(0.0, 1.0),
            rho: x[2].clamp(-0.999, 0.999),
            nu: x[3].clamp(1e-6, 5.0),
        }
    }
}

fn z_over_x(z: f64, rho: f64) -> f64 {
    if z.abs() < 1e-7 {
        return 1.0 - 0.5 * rho * z + (2.0 - 3.0 * rho * rho) / 12.0 * z * z;
    }
    let x = (((1.0 - 2.0 * rho * z + z * z).sqrt() + z - rho) / (1.0 - rho)).ln();
    z / x
}

/// Least-squares SABR fit to one smile.
///
/// Fails with [`FxError::Calibration`] when fewer than four quotes are given,
/// when the iteration budget runs out before the RMS vol error drops below
/// `tolerance`, or when the model turns non-finite.
pub fn fit_sabr(
    forward: f64,
    t: f64,
    strikes: &[f64],
    vols: &[f64],
    max_iterations: usize,
    tolerance: f64,
) -> FxResult<SabrParams> {
    let n = strikes.len();
    if n < N_PARAMS || vols.len() != n {
        return Err(FxError::Calibration {
            reason: format!("SABR needs at least {} smile points, got {}", N_PARAMS, n),
            current_error: None,
        });
    }

    let residuals = |p: &SabrParams| -> DVector<f64> {
        DVector::from_iterator(
            n,
            strikes
                .iter()
                .zip(vols)
                .map(|(&k, &v)| p.implied_vol(forward, k, t) - v),
        )
    };
    let rms = |r: &DVector<f64>| (r.norm_squared() / n as f64).sqrt();

    let atm_vol = vols[nearest_index(strikes, forward)];
    let beta0 = 0.5;
    let mut params = SabrParams {
        alpha: atm_vol * forward.powf(1.0 - beta0),
        beta: beta0,
        rho: 0.0,
        nu: 0.5,
    };
    let mut r = residuals(&params);
    let mut error = rms(&r);
    let mut lambda = 1e-3;

    for _ in 0..max_iterations {
        if !error.is_finite() {
            break;
        }
        if error < tolerance {
            return Ok(params);
        }

        let x = params.to_vector();
        let mut jac = DMatrix::<f64>::zeros(n, N_PARAMS);
        for j in 0..N_PARAMS {
            let h = 1e-6 * x[j].abs().max(1e-2);
            let mut up = x;
            let mut dn = x;
            up[j] += h;
            dn[j] -= h;
            let pu = SabrParams::from_vector(&up);
            let pd = SabrParams::from_vector(&dn);
            let width = pu.to_vector()[j] - pd.to_vector()[j];
            if width.abs() < 1e-14 {
                continue;
            }
            for (i, &k) in strikes.iter().enumerate() {
                jac[(i, j)] =
                    (pu.implied_vol(forward, k, t) - pd.implied_vol(forward, k, t)) / width;
            }
        }

        let jt = jac.transpose();
        let mut normal = &jt * &jac;
        for d in 0..N_PARAMS {
            normal[(d, d)] += lambda * normal[(d, d)].max(1e-12);
        }
        let gradient = &jt * &r;
        let step = match normal.lu().solve(&gradient) {
            Some(step) => step,
            None => {
                lambda *= 10.0;
                continue;
            }
        };

        let mut trial = x;
        for j in 0..N_PARAMS {
            trial[j] -= step[j];
        }
        let candidate = SabrParams::from_vector(&trial);
        let r_candidate = residuals(&candidate);
        let candidate_error = rms(&r_candidate);

        if candidate_error.is_finite() && candidate_error < error {
            params = candidate;
            r = r_candidate;
            error = candidate_error;
            lambda = (lambda * 0.3).max(1e-10);
        } else {
            lambda *= 10.0;
            if lambda > 1e10 {
                break;
            }
        }
    }

    if error < tolerance {
        Ok(params)
    } else {
        Err(FxError::Calibration {
            reason: format!("SABR fit at T = {:.4} did not reach tolerance {:.1e}", t, tolerance),
            current_error: error.is_finite().then_some(error),
        })
    }
}

fn nearest_index(strikes: &[f64], forward: f64) -> usize {
    strikes
        .iter()
        .enumerate()
        .min_by(|a, b| (a.1 - forward).abs().total_cmp(&(b.1 - forward).abs()))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atm_limit_is_continuous() {
        let p = SabrParams {
            alpha: 0.08,
            beta: 0.7,
            rho: -0.3,
            nu: 0.6,
        };
        let f = 1.1;
        let atm = p.implied_vol(f, f, 1.0);
        let near = p.implied_vol(f, f * (1.0 + 1e-6), 1.0);
        assert!((atm - near).abs() < 1e-6, "ATM {} vs near {}", atm, near);
    }

    #[test]
    fn test_fit_recovers_generated_smile() {
        let truth = SabrParams {
            alpha: 0.1,
            beta: 0.8,
            rho: -0.25,
            nu: 0.7,
        };
        let (f, t) = (1.1, 0.5);
        let strikes: Vec<f64> = (0..9).map(|i| 0.95 + 0.0375 * i as f64).collect();
        let vols: Vec<f64> = strikes.iter().map(|&k| truth.implied_vol(f, k, t)).collect();

        let fitted = fit_sabr(f, t, &strikes, &vols, 500, 5e-4).unwrap();
        for (&k, &v) in strikes.iter().zip(&vols) {
            assert!((fitted.implied_vol(f, k, t) - v).abs() < 2e-3);
        }
    }

    #[test]
    fn test_fit_needs_four_points() {
        let err = fit_sabr(1.1, 1.0, &[1.0, 1.1, 1.2], &[0.11, 0.1, 0.105], 100, 1e-4).unwrap_err();
        assert!(matches!(err, FxError::Calibration { .. }));
    }
}
