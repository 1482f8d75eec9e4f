// src/market/snapshot.rs
//! Immutable market state for one valuation.
//!
//! Bumped copies (`with_spot`, `with_domestic_shift`, ...) are how the
//! bump-and-reprice Greeks move one risk factor at a time.

use super::currency::CurrencyPair;
use super::curve::{parse_tenor, ZeroCurve};
use crate::error::{validation::*, FxError, FxResult};
use crate::vol::VolatilitySurface;
use chrono::{DateTime, NaiveDate, Utc};

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%Y%m%d"];

#[derive(Debug, Clone)]
pub struct MarketDataSnapshot {
    valuation_time: DateTime<Utc>,
    pair: CurrencyPair,
    spot: f64,
    domestic: ZeroCurve,
    foreign: ZeroCurve,
    surface: VolatilitySurface,
}

impl MarketDataSnapshot {
    pub fn new(
        valuation_time: DateTime<Utc>,
        pair: CurrencyPair,
        spot: f64,
        domestic: ZeroCurve,
        foreign: ZeroCurve,
        surface: VolatilitySurface,
    ) -> FxResult<Self> {
        validate_positive("spot", spot)?;
        Ok(Self {
            valuation_time,
            pair,
            spot,
            domestic,
            foreign,
            surface,
        })
    }

    pub fn valuation_time(&self) -> DateTime<Utc> {
        self.valuation_time
    }

    pub fn pair(&self) -> &CurrencyPair {
        &self.pair
    }

    pub fn spot(&self) -> f64 {
        self.spot
    }

    pub fn domestic_curve(&self) -> &ZeroCurve {
        &self.domestic
    }

    pub fn foreign_curve(&self) -> &ZeroCurve {
        &self.foreign
    }

    pub fn surface(&self) -> &VolatilitySurface {
        &self.surface
    }

    pub fn domestic_rate(&self, t: f64) -> f64 {
        self.domestic.zero_rate(t)
    }

    pub fn foreign_rate(&self, t: f64) -> f64 {
        self.foreign.zero_rate(t)
    }

    pub fn domestic_df(&self, t: f64) -> f64 {
        self.domestic.discount_factor(t)
    }

    pub fn foreign_df(&self, t: f64) -> f64 {
        self.foreign.discount_factor(t)
    }

    /// Outright forward `S·DF_f(t)/DF_d(t)`
    pub fn forward(&self, t: f64) -> f64 {
        self.spot * self.foreign_df(t) / self.domestic_df(t)
    }

    pub fn volatility(&self, t: f64, strike: f64) -> FxResult<f64> {
        self.surface.volatility_at(t, strike)
    }

    /// `(strike, vol)` at a signed spot delta
    pub fn volatility_at_delta(&self, t: f64, delta: f64) -> FxResult<(f64, f64)> {
        self.surface.volatility_at_delta(
            t,
            delta,
            self.spot,
            self.domestic_rate(t),
            self.foreign_rate(t),
        )
    }

    /// ACT/365F year fraction from the valuation date to `date`
    pub fn time_to(&self, date: NaiveDate) -> f64 {
        let days = (date - self.valuation_time.date_naive()).num_days();
        days as f64 / 365.0
    }

    /// Year fraction for an expiry given as a tenor (`"3M"`) or a date
    /// (`"2025-06-30"`, `"30/06/2025"`).
    pub fn expiry_from(&self, value: &str) -> FxResult<f64> {
        let value = value.trim();
        if let Ok(t) = parse_tenor(value) {
            return Ok(t);
        }
        DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
            .map(|date| self.time_to(date))
            .ok_or_else(|| {
                FxError::invalid(
                    "expiry",
                    f64::NAN,
                    format!("'{}' is neither a tenor nor a date", value),
                )
            })
    }

    pub fn with_spot(&self, spot: f64) -> FxResult<Self> {
        validate_positive("spot", spot)?;
        Ok(Self {
            spot,
            ..self.clone()
        })
    }

    pub fn with_domestic_shift(&self, shift: f64) -> Self {
        Self {
            domestic: self.domestic.shifted(shift),
            ..self.clone()
        }
    }

    pub fn with_foreign_shift(&self, shift: f64) -> Self {
        Self {
            foreign: self.foreign.shifted(shift),
            ..self.clone()
        }
    }

    pub fn with_vol_scale(&self, factor: f64) -> Self {
        Self {
            surface: self.surface.scaled(factor),
            ..self.clone()
        }
    }

    /// Same market with a freshly calibrated surface
    pub fn with_surface(&self, surface: VolatilitySurface) -> Self {
        Self {
            surface,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn snapshot() -> MarketDataSnapshot {
        MarketDataSnapshot::new(
            Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap(),
            CurrencyPair::parse("EURUSD").unwrap(),
            1.1,
            ZeroCurve::flat(0.05).unwrap(),
            ZeroCurve::flat(0.03).unwrap(),
            VolatilitySurface::flat(0.10, 1.1).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_forward_by_parity() {
        let m = snapshot();
        assert!((m.forward(1.0) - 1.1 * (0.02f64).exp()).abs() < 1e-14);
    }

    #[test]
    fn test_time_to_dates_and_tenors() {
        let m = snapshot();
        let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert!((m.time_to(date) - 365.0 / 365.0).abs() < 1e-15);
        assert!((m.expiry_from("2025-01-01").unwrap() - 1.0).abs() < 1e-15);
        assert!((m.expiry_from("01/01/2025").unwrap() - 1.0).abs() < 1e-15);
        assert!((m.expiry_from("6M").unwrap() - 0.5).abs() < 1e-15);
        assert!(m.expiry_from("soon").is_err());
    }

    #[test]
    fn test_bumped_copies() {
        let m = snapshot();
        assert!(m.with_spot(0.0).is_err());
        assert!((m.with_domestic_shift(1e-4).domestic_rate(1.0) - 0.0501).abs() < 1e-15);
        assert!((m.with_vol_scale(1.01).volatility(1.0, 1.1).unwrap() - 0.101).abs() < 1e-12);
        assert_eq!(m.spot(), 1.1);
    }
}
