// src/vol/smile.rs
//! Single-expiry smile quotes.

use crate::analytics::garman_kohlhagen::{gk_forward, strike_from_delta};
use crate::error::{FxError, FxResult};
use crate::instruments::OptionType;
use serde::{Deserialize, Serialize};

/// Volatility quoted at a spot delta. Positive deltas are calls, negative puts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeltaQuote {
    pub delta: f64,
    pub vol: f64,
}

/// Quoted smile of one tenor: strictly increasing strikes and their vols.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmileSlice {
    tenor: f64,
    forward: f64,
    strikes: Vec<f64>,
    vols: Vec<f64>,
}

impl SmileSlice {
    /// Quotes are sorted by strike; duplicates, non-positive strikes or
    /// non-positive vols are rejected.
    pub fn new(tenor: f64, forward: f64, quotes: Vec<(f64, f64)>) -> FxResult<Self> {
        let invalid = |reason: String| FxError::InvalidSurface { reason };
        if !(tenor > 0.0) || !tenor.is_finite() {
            return Err(invalid(format!("tenor must be positive, got {}", tenor)));
        }
        if !(forward > 0.0) || !forward.is_finite() {
            return Err(invalid(format!(
                "forward at T = {} must be positive, got {}",
                tenor, forward
            )));
        }
        if quotes.is_empty() {
            return Err(invalid(format!("no smile quotes at T = {}", tenor)));
        }
        let mut quotes = quotes;
        for &(k, v) in &quotes {
            if !(k > 0.0) || !k.is_finite() {
                return Err(invalid(format!("strike {} at T = {} is not positive", k, tenor)));
            }
            if !(v > 0.0) || !v.is_finite() {
                return Err(invalid(format!(
                    "volatility {} at T = {}, K = {} is not positive",
                    v, tenor, k
                )));
            }
        }
        quotes.sort_by(|a, b| a.0.total_cmp(&b.0));
        if quotes.windows(2).any(|w| w[1].0 <= w[0].0) {
            return Err(invalid(format!("duplicate strikes at T = {}", tenor)));
        }
        let (strikes, vols) = quotes.into_iter().unzip();
        Ok(Self {
            tenor,
            forward,
            strikes,
            vols,
        })
    }

    /// Smile from delta quotes around an ATM delta-neutral straddle vol.
    ///
    /// Strikes come from the spot-delta inversion at each quote's own vol;
    /// the ATM DNS strike is `F·exp(σ²T/2)`.
    pub fn from_delta_quotes(
        tenor: f64,
        spot: f64,
        rd: f64,
        rf: f64,
        atm_vol: f64,
        quotes: &[DeltaQuote],
    ) -> FxResult<Self> {
        let forward = gk_forward(spot, rd, rf, tenor);
        let mut points = Vec::with_capacity(quotes.len() + 1);
        points.push((forward * (0.5 * atm_vol * atm_vol * tenor).exp(), atm_vol));
        for q in quotes {
            let option_type = if q.delta > 0.0 {
                OptionType::Call
            } else {
                OptionType::Put
            };
            let strike = strike_from_delta(option_type, spot, q.delta, rd, rf, q.vol, tenor)?;
            points.push((strike, q.vol));
        }
        Self::new(tenor, forward, points)
    }

    pub fn tenor(&self) -> f64 {
        self.tenor
    }

    pub fn forward(&self) -> f64 {
        self.forward
    }

    pub fn strikes(&self) -> &[f64] {
        &self.strikes
    }

    pub fn vols(&self) -> &[f64] {
        &self.vols
    }

    pub fn min_strike(&self) -> f64 {
        self.strikes[0]
    }

    pub fn max_strike(&self) -> f64 {
        self.strikes[self.strikes.len() - 1]
    }

    /// Index of an exactly quoted strike
    pub fn node_index(&self, strike: f64) -> Option<usize> {
        self.strikes.iter().position(|&k| k == strike)
    }
}
