//! Continuously-compounded zero-rate curves.
//!
//! Rates are interpolated linearly between pillars and held flat outside
//! the pillar range. Discount factors follow `DF(t) = exp(-r(t) * t)`.

use crate::error::{validation::*, FxError, FxResult};
use crate::market::currency::CurrencyPair;
use crate::math_utils::linear_interpolate;
use serde::{Deserialize, Serialize};

/// Convert a tenor string such as `"5D"`, `"2W"`, `"6M"` or `"1Y"` to years.
///
/// Days and weeks use ACT/365, months are twelfths of a year.
pub fn parse_tenor(tenor: &str) -> FxResult<f64> {
    let tenor = tenor.trim().to_ascii_uppercase();
    let bad = || FxError::invalid(
        "tenor",
        f64::NAN,
        format!("'{}' is not of the form <n>D|W|M|Y", tenor),
    );

    if !tenor.is_ascii() {
        return Err(bad());
    }
    let (digits, unit) = tenor.split_at(tenor.len().saturating_sub(1));
    let count: u32 = digits.parse().map_err(|_| bad())?;
    let years = match unit {
        "D" => count as f64 / 365.0,
        "W" => count as f64 * 7.0 / 365.0,
        "M" => count as f64 / 12.0,
        "Y" => count as f64,
        _ => return Err(bad()),
    };
    Ok(years)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZeroCurve {
    times: Vec<f64>,
    rates: Vec<f64>,
}

impl ZeroCurve {
    /// Build from `(year_fraction, rate)` pillars; pillars are sorted by time.
    pub fn new(mut pillars: Vec<(f64, f64)>) -> FxResult<Self> {
        if pillars.is_empty() {
            return Err(FxError::invalid("curve_pillars", 0.0, "need at least one pillar"));
        }
        for &(t, r) in &pillars {
            validate_non_negative("pillar_time", t)?;
            validate_finite("zero_rate", r)?;
        }
        pillars.sort_by(|a, b| a.0.total_cmp(&b.0));
        if pillars.windows(2).any(|w| w[1].0 <= w[0].0) {
            return Err(FxError::invalid(
                "pillar_time",
                f64::NAN,
                "pillar times must be distinct",
            ));
        }
        let (times, rates) = pillars.into_iter().unzip();
        Ok(Self { times, rates })
    }

    pub fn flat(rate: f64) -> FxResult<Self> {
        Self::new(vec![(0.0, rate)])
    }

    /// Build from tenor strings, e.g. `[("1M", 0.051), ("1Y", 0.048)]`.
    pub fn from_tenors(pillars: &[(&str, f64)]) -> FxResult<Self> {
        let parsed = pillars
            .iter()
            .map(|&(tenor, rate)| parse_tenor(tenor).map(|t| (t, rate)))
            .collect::<FxResult<Vec<_>>>()?;
        Self::new(parsed)
    }

    /// Foreign curve implied by covered interest parity from outright forward points.
    ///
    /// For each `(tenor, points)`: `F = S + points / pip_scale` and
    /// `r_f = r_d - ln(F / S) / t`.
    pub fn implied_from_forward_points(
        domestic: &ZeroCurve,
        spot: f64,
        pair: &CurrencyPair,
        forward_points: &[(&str, f64)],
    ) -> FxResult<Self> {
        validate_positive("spot", spot)?;
        let scale = pair.pip_scale();
        let mut pillars = Vec::with_capacity(forward_points.len());
        for &(tenor, points) in forward_points {
            let t = parse_tenor(tenor)?;
            validate_positive("forward_point_tenor", t)?;
            let forward = spot + points / scale;
            validate_positive("outright_forward", forward)?;
            let r_f = domestic.zero_rate(t) - (forward / spot).ln() / t;
            pillars.push((t, r_f));
        }
        Self::new(pillars)
    }

    pub fn zero_rate(&self, t: f64) -> f64 {
        linear_interpolate(&self.times, &self.rates, t)
    }

    pub fn discount_factor(&self, t: f64) -> f64 {
        (-self.zero_rate(t) * t).exp()
    }

    /// Copy of the curve with every pillar moved by `shift`.
    pub fn shifted(&self, shift: f64) -> Self {
        Self {
            times: self.times.clone(),
            rates: self.rates.iter().map(|r| r + shift).collect(),
        }
    }

    pub fn pillars(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.times.iter().copied().zip(self.rates.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_parse_tenor() {
        assert_abs_diff_eq!(parse_tenor("1Y").unwrap(), 1.0);
        assert_abs_diff_eq!(parse_tenor("6m").unwrap(), 0.5);
        assert_abs_diff_eq!(parse_tenor("2W").unwrap(), 14.0 / 365.0);
        assert_abs_diff_eq!(parse_tenor(" 5D ").unwrap(), 5.0 / 365.0);
        assert!(parse_tenor("1X").is_err());
        assert!(parse_tenor("M").is_err());
        assert!(parse_tenor("").is_err());
    }

    #[test]
    fn test_interpolation_and_flat_extrapolation() {
        let curve = ZeroCurve::from_tenors(&[("6M", 0.04), ("1Y", 0.05)]).unwrap();
        assert_abs_diff_eq!(curve.zero_rate(0.1), 0.04);
        assert_abs_diff_eq!(curve.zero_rate(0.75), 0.045, epsilon = 1e-14);
        assert_abs_diff_eq!(curve.zero_rate(3.0), 0.05);
        assert_abs_diff_eq!(curve.discount_factor(1.0), (-0.05f64).exp(), epsilon = 1e-15);
    }

    #[test]
    fn test_implied_foreign_rate_round_trip() {
        let pair = CurrencyPair::parse("EURUSD").unwrap();
        let domestic = ZeroCurve::flat(0.05).unwrap();
        let spot = 1.10;
        let r_f = 0.03;
        let forward = spot * ((0.05 - r_f) * 1.0f64).exp();
        let points = (forward - spot) * pair.pip_scale();

        let foreign =
            ZeroCurve::implied_from_forward_points(&domestic, spot, &pair, &[("1Y", points)])
                .unwrap();
        assert_abs_diff_eq!(foreign.zero_rate(1.0), r_f, epsilon = 1e-12);
    }

    #[test]
    fn test_rejects_duplicate_pillars() {
        assert!(ZeroCurve::new(vec![(1.0, 0.01), (1.0, 0.02)]).is_err());
        assert!(ZeroCurve::new(vec![]).is_err());
    }
}
