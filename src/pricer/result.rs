//! Valuation output types.
//!
//! Engines work per unit of foreign notional ([`UnitValuation`]); the pricer
//! front door scales that to the trade's notional as a [`ValuationResult`].

use crate::config::PricingMethod;
use crate::error::PrecisionWarning;
use crate::instruments::OptionTerms;
use serde::Serialize;

/// Price sensitivities, each per unit of its risk factor.
///
/// - `delta`: ∂V/∂S
/// - `gamma`: ∂²V/∂S²
/// - `vega`: ∂V/∂σ for a 1.00 move in volatility
/// - `theta`: ∂V/∂t per year of calendar time (negative for time decay)
/// - `rho_domestic`, `rho_foreign`: ∂V/∂r for a 1.00 move in the rate
///
/// A Greek that was not requested from a bump-and-reprice engine is `NaN`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Greeks {
    pub delta: f64,
    pub gamma: f64,
    pub vega: f64,
    pub theta: f64,
    pub rho_domestic: f64,
    pub rho_foreign: f64,
}

impl Greeks {
    pub const NOT_COMPUTED: Greeks = Greeks {
        delta: f64::NAN,
        gamma: f64::NAN,
        vega: f64::NAN,
        theta: f64::NAN,
        rho_domestic: f64::NAN,
        rho_foreign: f64::NAN,
    };

    pub fn scaled(&self, factor: f64) -> Greeks {
        Greeks {
            delta: self.delta * factor,
            gamma: self.gamma * factor,
            vega: self.vega * factor,
            theta: self.theta * factor,
            rho_domestic: self.rho_domestic * factor,
            rho_foreign: self.rho_foreign * factor,
        }
    }

    /// Vega for a one vol-point (0.01) move
    pub fn vega_per_point(&self) -> f64 {
        self.vega * 0.01
    }

    /// Theta per calendar day
    pub fn theta_per_day(&self) -> f64 {
        self.theta / 365.0
    }
}

/// Two-sided 95% interval around a Monte Carlo estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
    pub std_error: f64,
}

impl ConfidenceInterval {
    pub const Z_95: f64 = 1.96;

    pub fn from_estimate(mean: f64, std_error: f64) -> Self {
        Self {
            lower: mean - Self::Z_95 * std_error,
            upper: mean + Self::Z_95 * std_error,
            std_error,
        }
    }

    pub fn half_width(&self) -> f64 {
        0.5 * (self.upper - self.lower)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }

    fn scaled(&self, factor: f64) -> Self {
        Self {
            lower: self.lower * factor,
            upper: self.upper * factor,
            std_error: self.std_error * factor,
        }
    }
}

/// Whether a valuation ran to the end or was cancelled part way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Completion {
    Complete,
    /// Cancelled: only `completed` of `requested` work units (MC paths or PDE time steps) ran
    Partial { completed: usize, requested: usize },
}

/// Work units of a base run plus its Greek bumps.
///
/// A valuation is complete only if every run it started finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkTally {
    pub completed: usize,
    pub requested: usize,
    pub interrupted: bool,
}

impl WorkTally {
    pub fn record(&mut self, completed: usize, requested: usize) {
        self.completed += completed;
        self.requested += requested;
        if completed < requested {
            self.interrupted = true;
        }
    }

    pub fn completion(&self) -> Completion {
        if self.interrupted {
            Completion::Partial {
                completed: self.completed,
                requested: self.requested,
            }
        } else {
            Completion::Complete
        }
    }
}

/// Side of the trade, from the client's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeDirection {
    ClientBuys,
    ClientSells,
}

/// Engine output per unit of foreign notional.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitValuation {
    pub price: f64,
    pub greeks: Greeks,
    pub confidence_interval: Option<ConfidenceInterval>,
    pub completion: Completion,
    pub warnings: Vec<PrecisionWarning>,
}

impl UnitValuation {
    pub fn complete(price: f64, greeks: Greeks) -> Self {
        Self {
            price,
            greeks,
            confidence_interval: None,
            completion: Completion::Complete,
            warnings: Vec::new(),
        }
    }
}

/// Price and risk of one instrument, scaled to its notional.
///
/// Amounts are in domestic (quote) currency. Built once per valuation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuationResult {
    price: f64,
    unit_price: f64,
    greeks: Greeks,
    confidence_interval: Option<ConfidenceInterval>,
    method: PricingMethod,
    completion: Completion,
    warnings: Vec<PrecisionWarning>,
    forward: f64,
    spot: f64,
    foreign_amount: f64,
    pip_scale: f64,
}

impl ValuationResult {
    pub(crate) fn from_unit(
        unit: UnitValuation,
        method: PricingMethod,
        terms: &OptionTerms,
        spot: f64,
        forward: f64,
    ) -> Self {
        let foreign_amount = terms.foreign_amount(spot);
        Self {
            price: unit.price * foreign_amount,
            unit_price: unit.price,
            greeks: unit.greeks.scaled(foreign_amount),
            confidence_interval: unit
                .confidence_interval
                .map(|ci| ci.scaled(foreign_amount)),
            method,
            completion: unit.completion,
            warnings: unit.warnings,
            forward,
            spot,
            foreign_amount,
            pip_scale: terms.pair.pip_scale(),
        }
    }

    /// Premium for the whole notional, domestic currency
    pub fn price(&self) -> f64 {
        self.price
    }

    /// Premium per unit of foreign notional, domestic currency
    pub fn unit_price(&self) -> f64 {
        self.unit_price
    }

    pub fn greeks(&self) -> &Greeks {
        &self.greeks
    }

    /// 95% interval on `price`; Monte Carlo only
    pub fn confidence_interval(&self) -> Option<&ConfidenceInterval> {
        self.confidence_interval.as_ref()
    }

    pub fn method(&self) -> PricingMethod {
        self.method
    }

    pub fn completion(&self) -> Completion {
        self.completion
    }

    pub fn is_complete(&self) -> bool {
        self.completion == Completion::Complete
    }

    pub fn warnings(&self) -> &[PrecisionWarning] {
        &self.warnings
    }

    pub fn forward(&self) -> f64 {
        self.forward
    }

    pub fn foreign_amount(&self) -> f64 {
        self.foreign_amount
    }

    /// Premium as a percentage of the notional's domestic value at spot
    pub fn premium_pct(&self) -> f64 {
        self.unit_price / self.spot * 100.0
    }

    /// Unit premium in pips of the pair
    pub fn premium_pips(&self) -> f64 {
        self.unit_price * self.pip_scale
    }

    /// Foreign-currency amount the dealer trades to hedge the delta.
    ///
    /// Positive means the dealer buys the base currency.
    pub fn delta_hedge_notional(&self, direction: TradeDirection) -> f64 {
        let sign = match direction {
            TradeDirection::ClientBuys => 1.0,
            TradeDirection::ClientSells => -1.0,
        };
        self.greeks.delta * sign
    }
}
