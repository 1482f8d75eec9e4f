// src/vol/surface.rs
//! Implied volatility surface
//!
//! # Interpolation
//!
//! A query `(T, K)` is answered in two passes:
//! 1. Each bracketing tenor slice is evaluated at strike `K` with the
//!    configured smile method (linear, natural cubic spline or SABR).
//! 2. Total variance `w = σ²T` is interpolated linearly in `T` and converted
//!    back, `σ(T, K) = √(w(T, K) / T)`.
//!
//! Outside the quoted tenors the boundary slice's volatility is held flat
//! unless extrapolation is disallowed, in which case the query fails with
//! [`FxError::OutOfRange`]. The same rule applies to strikes outside a
//! slice's quoted range.

use super::sabr::{fit_sabr, SabrParams};
use super::smile::SmileSlice;
use crate::analytics::garman_kohlhagen::strike_from_delta;
use crate::error::{FxError, FxResult};
use crate::instruments::OptionType;
use crate::math_utils::{bracket, linear_interpolate, CubicSpline};
use serde::{Deserialize, Serialize};
use tracing::warn;

const SABR_MAX_ITERATIONS: usize = 200;
const DELTA_MAX_ITERATIONS: usize = 50;
/// Largest vol change between fixed-point iterates accepted as converged
const DELTA_TOLERANCE: f64 = 1e-12;
const SABR_TOLERANCE: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterpolationMethod {
    Linear,
    CubicSpline,
    Sabr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Extrapolation {
    Flat,
    Disallowed,
}

#[derive(Debug, Clone)]
enum SmileInterpolator {
    Linear,
    Spline(CubicSpline),
    Sabr(SabrParams),
}

/// Tenor whose SABR fit failed and fell back to linear interpolation
#[derive(Debug, Clone, PartialEq)]
pub struct SabrFallback {
    pub tenor: f64,
    pub error: FxError,
}

#[derive(Debug, Clone)]
pub struct VolatilitySurface {
    slices: Vec<SmileSlice>,
    interpolators: Vec<SmileInterpolator>,
    method: InterpolationMethod,
    extrapolation: Extrapolation,
    vol_scale: f64,
    sabr_fallbacks: Vec<SabrFallback>,
}

impl VolatilitySurface {
    /// Build a surface from tenor slices given in strictly increasing tenor order.
    ///
    /// SABR slices that fail to fit are logged, recorded in
    /// [`sabr_fallbacks`](Self::sabr_fallbacks) and interpolated linearly.
    pub fn new(slices: Vec<SmileSlice>, method: InterpolationMethod) -> FxResult<Self> {
        if slices.len() < 2 {
            return Err(FxError::InvalidSurface {
                reason: format!("need at least 2 tenors, got {}", slices.len()),
            });
        }
        if let Some(w) = slices.windows(2).find(|w| w[1].tenor() <= w[0].tenor()) {
            return Err(FxError::InvalidSurface {
                reason: format!(
                    "tenors must be strictly increasing: {} follows {}",
                    w[1].tenor(),
                    w[0].tenor()
                ),
            });
        }

        let mut sabr_fallbacks = Vec::new();
        let mut interpolators = Vec::with_capacity(slices.len());
        for slice in &slices {
            let interpolator = match method {
                InterpolationMethod::Linear => SmileInterpolator::Linear,
                InterpolationMethod::CubicSpline if slice.strikes().len() >= 2 => {
                    SmileInterpolator::Spline(CubicSpline::new(slice.strikes(), slice.vols())?)
                }
                InterpolationMethod::CubicSpline => SmileInterpolator::Linear,
                InterpolationMethod::Sabr => match fit_sabr(
                    slice.forward(),
                    slice.tenor(),
                    slice.strikes(),
                    slice.vols(),
                    SABR_MAX_ITERATIONS,
                    SABR_TOLERANCE,
                ) {
                    Ok(params) => SmileInterpolator::Sabr(params),
                    Err(error) => {
                        warn!(
                            tenor = slice.tenor(),
                            %error,
                            "SABR fit failed, falling back to linear smile interpolation"
                        );
                        sabr_fallbacks.push(SabrFallback {
                            tenor: slice.tenor(),
                            error,
                        });
                        SmileInterpolator::Linear
                    }
                },
            };
            interpolators.push(interpolator);
        }

        Ok(Self {
            slices,
            interpolators,
            method,
            extrapolation: Extrapolation::Flat,
            vol_scale: 1.0,
            sabr_fallbacks,
        })
    }

    /// Surface with the same volatility at every tenor and strike.
    pub fn flat(vol: f64, forward: f64) -> FxResult<Self> {
        let slices = vec![
            SmileSlice::new(1.0 / 365.0, forward, vec![(forward, vol)])?,
            SmileSlice::new(30.0, forward, vec![(forward, vol)])?,
        ];
        Self::new(slices, InterpolationMethod::Linear)
    }

    pub fn with_extrapolation(mut self, extrapolation: Extrapolation) -> Self {
        self.extrapolation = extrapolation;
        self
    }

    /// Copy with every volatility multiplied by `factor`; used for vega bumps.
    pub fn scaled(&self, factor: f64) -> Self {
        let mut bumped = self.clone();
        bumped.vol_scale *= factor;
        bumped
    }

    pub fn method(&self) -> InterpolationMethod {
        self.method
    }

    pub fn extrapolation(&self) -> Extrapolation {
        self.extrapolation
    }

    pub fn slices(&self) -> &[SmileSlice] {
        &self.slices
    }

    pub fn tenors(&self) -> Vec<f64> {
        self.slices.iter().map(|s| s.tenor()).collect()
    }

    pub fn sabr_fallbacks(&self) -> &[SabrFallback] {
        &self.sabr_fallbacks
    }

    pub fn min_tenor(&self) -> f64 {
        self.slices[0].tenor()
    }

    pub fn max_tenor(&self) -> f64 {
        self.slices[self.slices.len() - 1].tenor()
    }

    /// Implied volatility at `tenor` (years) and `strike`.
    pub fn volatility_at(&self, tenor: f64, strike: f64) -> FxResult<f64> {
        if !(strike > 0.0) || !strike.is_finite() {
            return Err(FxError::invalid("strike", strike, "must be positive and finite"));
        }
        if !tenor.is_finite() || tenor < 0.0 {
            return Err(FxError::invalid("tenor", tenor, "must be non-negative and finite"));
        }
        let (t_min, t_max) = (self.min_tenor(), self.max_tenor());
        if tenor < t_min || tenor > t_max {
            if self.extrapolation == Extrapolation::Disallowed {
                return Err(FxError::OutOfRange {
                    axis: "tenor".to_string(),
                    value: tenor,
                    min: t_min,
                    max: t_max,
                });
            }
            let edge = if tenor < t_min { 0 } else { self.slices.len() - 1 };
            return Ok(self.slice_vol(edge, strike)? * self.vol_scale);
        }

        let tenors = self.tenors();
        let i = bracket(&tenors, tenor);
        if tenor == tenors[i] {
            return Ok(self.slice_vol(i, strike)? * self.vol_scale);
        }
        if tenor == tenors[i + 1] {
            return Ok(self.slice_vol(i + 1, strike)? * self.vol_scale);
        }

        let (t0, t1) = (tenors[i], tenors[i + 1]);
        let v0 = self.slice_vol(i, strike)?;
        let v1 = self.slice_vol(i + 1, strike)?;
        let w0 = v0 * v0 * t0;
        let w1 = v1 * v1 * t1;
        let w = w0 + (w1 - w0) * (tenor - t0) / (t1 - t0);
        Ok((w / tenor).sqrt() * self.vol_scale)
    }

    /// Strike and volatility at a spot delta (positive for calls, negative for puts).
    ///
    /// Solves the fixed point `K = K(Δ, σ(T, K))` starting from the ATM-forward vol.
    pub fn volatility_at_delta(
        &self,
        tenor: f64,
        delta: f64,
        spot: f64,
        rd: f64,
        rf: f64,
    ) -> FxResult<(f64, f64)> {
        if delta == 0.0 || !delta.is_finite() {
            return Err(FxError::invalid("delta", delta, "must be non-zero and finite"));
        }
        if !(tenor > 0.0) {
            return Err(FxError::invalid("tenor", tenor, "must be positive for delta queries"));
        }
        let option_type = if delta > 0.0 {
            OptionType::Call
        } else {
            OptionType::Put
        };
        let forward = spot * ((rd - rf) * tenor).exp();
        let mut vol = self.volatility_at(tenor, forward)?;
        let mut change = f64::INFINITY;
        for _ in 0..DELTA_MAX_ITERATIONS {
            let strike = strike_from_delta(option_type, spot, delta, rd, rf, vol, tenor)?;
            let next = self.volatility_at(tenor, strike)?;
            change = (next - vol).abs();
            vol = next;
            if change < DELTA_TOLERANCE {
                return Ok((strike, vol));
            }
        }
        Err(FxError::Calibration {
            reason: format!(
                "strike for delta {} at tenor {} did not settle in {} iterations",
                delta, tenor, DELTA_MAX_ITERATIONS
            ),
            current_error: Some(change),
        })
    }

    fn slice_vol(&self, index: usize, strike: f64) -> FxResult<f64> {
        let slice = &self.slices[index];
        if let Some(node) = slice.node_index(strike) {
            if !matches!(self.interpolators[index], SmileInterpolator::Sabr(_)) {
                return Ok(slice.vols()[node]);
            }
        }
        if self.extrapolation == Extrapolation::Disallowed
            && (strike < slice.min_strike() || strike > slice.max_strike())
        {
            return Err(FxError::OutOfRange {
                axis: "strike".to_string(),
                value: strike,
                min: slice.min_strike(),
                max: slice.max_strike(),
            });
        }
        let vol = match &self.interpolators[index] {
            SmileInterpolator::Linear => linear_interpolate(slice.strikes(), slice.vols(), strike),
            SmileInterpolator::Spline(spline) => spline.eval(strike),
            SmileInterpolator::Sabr(params) => {
                params.implied_vol(slice.forward(), strike, slice.tenor())
            }
        };
        if !(vol > 0.0) || !vol.is_finite() {
            return Err(FxError::NumericalInstability {
                method: "smile interpolation".to_string(),
                reason: format!(
                    "non-positive volatility {} at T = {}, K = {}",
                    vol,
                    slice.tenor(),
                    strike
                ),
            });
        }
        Ok(vol)
    }
}
