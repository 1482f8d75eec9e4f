// src/calibration/implied_vol.rs
//! Garman–Kohlhagen implied volatility
//!
//! Newton–Raphson on the analytic vega inside a shrinking bracket. A step
//! that leaves the bracket, or a vega too small to divide by, is replaced by
//! bisection, so the iteration never diverges.

use crate::analytics::garman_kohlhagen::{gk_price, gk_vega};
use crate::error::{validation::*, FxError, FxResult};
use crate::instruments::OptionType;
use std::f64::consts::PI;

pub const VOL_FLOOR: f64 = 1e-4;
pub const VOL_CAP: f64 = 5.0;
const MIN_VEGA: f64 = 1e-12;

/// Market inputs for one quote.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuoteInputs {
    pub option_type: OptionType,
    pub price: f64,
    pub spot: f64,
    pub strike: f64,
    pub rd: f64,
    pub rf: f64,
    pub expiry: f64,
}

impl QuoteInputs {
    /// No-arbitrage price range `[max(w(S·DF_f − K·DF_d), 0), S·DF_f or K·DF_d]`.
    pub fn price_bounds(&self) -> (f64, f64) {
        let fwd_spot = self.spot * (-self.rf * self.expiry).exp();
        let pv_strike = self.strike * (-self.rd * self.expiry).exp();
        let lower = (self.option_type.sign() * (fwd_spot - pv_strike)).max(0.0);
        let upper = match self.option_type {
            OptionType::Call => fwd_spot,
            OptionType::Put => pv_strike,
        };
        (lower, upper)
    }

    fn model_price(&self, sigma: f64) -> f64 {
        gk_price(self.option_type, self.spot, self.strike, self.rd, self.rf, sigma, self.expiry)
    }

    fn vega(&self, sigma: f64) -> f64 {
        gk_vega(self.spot, self.strike, self.rd, self.rf, sigma, self.expiry)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpliedVolSolver {
    /// Absolute price tolerance
    pub tolerance: f64,
    pub max_iterations: usize,
    pub lower: f64,
    pub upper: f64,
}

impl Default for ImpliedVolSolver {
    fn default() -> Self {
        Self {
            tolerance: 1e-8,
            max_iterations: 100,
            lower: VOL_FLOOR,
            upper: VOL_CAP,
        }
    }
}

impl ImpliedVolSolver {
    pub fn new(tolerance: f64, max_iterations: usize) -> Self {
        Self {
            tolerance,
            max_iterations,
            ..Self::default()
        }
    }

    pub fn with_bracket(mut self, lower: f64, upper: f64) -> Self {
        self.lower = lower;
        self.upper = upper;
        self
    }

    /// Looser tolerance and wider bracket for a second attempt.
    pub fn relaxed(&self) -> Self {
        Self {
            tolerance: self.tolerance * 100.0,
            upper: self.upper.max(10.0),
            ..*self
        }
    }

    pub fn solve(&self, q: &QuoteInputs) -> FxResult<f64> {
        validate_positive("spot", q.spot)?;
        validate_positive("strike", q.strike)?;
        validate_positive("expiry", q.expiry)?;
        validate_finite("price", q.price)?;
        validate_finite("domestic_rate", q.rd)?;
        validate_finite("foreign_rate", q.rf)?;
        validate_positive("tolerance", self.tolerance)?;
        validate_count("max_iterations", self.max_iterations, 1)?;
        if !(0.0 < self.lower && self.lower < self.upper) {
            return Err(FxError::invalid(
                "vol_bracket",
                self.lower,
                format!("need 0 < lower < upper, got [{}, {}]", self.lower, self.upper),
            ));
        }

        let (min_price, max_price) = q.price_bounds();
        if q.price < min_price - self.tolerance || q.price > max_price + self.tolerance {
            return Err(FxError::invalid(
                "price",
                q.price,
                format!("outside no-arbitrage bounds [{:.8}, {:.8}]", min_price, max_price),
            ));
        }

        let (mut lo, mut hi) = (self.lower, self.upper);
        let f_lo = q.model_price(lo) - q.price;
        let f_hi = q.model_price(hi) - q.price;
        // Within tolerance at a bracket edge: the price does not pin down σ
        if f_lo.abs() < self.tolerance || f_hi.abs() < self.tolerance {
            let edge = if f_lo.abs() < self.tolerance { lo } else { hi };
            return Err(FxError::Calibration {
                reason: format!(
                    "price {} is within tolerance of the price at the bracket edge σ = {}",
                    q.price, edge
                ),
                current_error: Some(f_lo.abs().min(f_hi.abs())),
            });
        }
        if f_lo > 0.0 || f_hi < 0.0 {
            return Err(FxError::Calibration {
                reason: format!(
                    "price {} is not bracketed by volatilities [{}, {}]",
                    q.price, lo, hi
                ),
                current_error: Some(if f_lo > 0.0 { f_lo } else { -f_hi }),
            });
        }

        let mut sigma = initial_guess(q).clamp(lo, hi);
        let mut diff = f64::INFINITY;
        for _ in 0..self.max_iterations {
            diff = q.model_price(sigma) - q.price;
            if diff.abs() < self.tolerance {
                return Ok(sigma);
            }
            // Price is increasing in σ
            if diff > 0.0 {
                hi = sigma;
            } else {
                lo = sigma;
            }
            let vega = q.vega(sigma);
            let newton = sigma - diff / vega;
            sigma = if vega > MIN_VEGA && newton > lo && newton < hi {
                newton
            } else {
                0.5 * (lo + hi)
            };
        }

        Err(FxError::Calibration {
            reason: format!(
                "implied volatility did not converge in {} iterations (K = {}, T = {})",
                self.max_iterations, q.strike, q.expiry
            ),
            current_error: Some(diff.abs()),
        })
    }
}

/// Brenner–Subrahmanyam style start from the time value
fn initial_guess(q: &QuoteInputs) -> f64 {
    let (intrinsic, _) = q.price_bounds();
    let time_value = (q.price - intrinsic).max(1e-10);
    let fwd_spot = q.spot * (-q.rf * q.expiry).exp();
    let m = (q.spot / q.strike).ln().abs();
    (2.0 * PI / q.expiry).sqrt() * time_value / fwd_spot * (1.0 + 0.5 * m)
}

/// Implied volatility of a European vanilla premium.
#[allow(clippy::too_many_arguments)]
pub fn implied_vol(
    option_type: OptionType,
    price: f64,
    spot: f64,
    strike: f64,
    rd: f64,
    rf: f64,
    expiry: f64,
    tolerance: f64,
    max_iterations: usize,
) -> FxResult<f64> {
    ImpliedVolSolver::new(tolerance, max_iterations).solve(&QuoteInputs {
        option_type,
        price,
        spot,
        strike,
        rd,
        rf,
        expiry,
    })
}
