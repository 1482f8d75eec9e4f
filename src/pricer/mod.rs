// src/pricer/mod.rs
//! Pricing front door
//!
//! [`price`] validates its inputs, lets the [`PricerSelector`] choose an
//! engine (or honours the configured method) and scales the engine's
//! per-unit result to the trade's notional.

pub mod result;

use crate::analytics::AnalyticPricer;
use crate::config::{default_method, PricingMethod, PricingModelConfig};
use crate::error::{FxError, FxResult};
use crate::instruments::Instrument;
use crate::market::MarketDataSnapshot;
use crate::mc::cancel::{CancellationSignal, NeverCancel};
use crate::mc::MonteCarloPricer;
use crate::pde::PdePricer;
use tracing::debug;

pub use result::{
    Completion, ConfidenceInterval, Greeks, TradeDirection, UnitValuation, ValuationResult,
    WorkTally,
};

/// One valuation strategy.
pub trait Pricer: Send + Sync {
    fn method(&self) -> PricingMethod;

    /// Value one unit of foreign notional.
    ///
    /// Implementations validate their own inputs and fail with
    /// [`crate::FxError::UnsupportedOperation`] for instruments they cannot value.
    fn price_unit(
        &self,
        instrument: &Instrument,
        market: &MarketDataSnapshot,
        config: &PricingModelConfig,
        cancel: &dyn CancellationSignal,
    ) -> FxResult<UnitValuation>;
}

/// Chooses an engine per instrument and configuration.
#[derive(Debug, Default, Clone, Copy)]
pub struct PricerSelector;

static ANALYTIC: AnalyticPricer = AnalyticPricer;
static MONTE_CARLO: MonteCarloPricer = MonteCarloPricer;
static PDE: PdePricer = PdePricer;

impl PricerSelector {
    pub fn pricer_for(method: PricingMethod) -> &'static dyn Pricer {
        match method {
            PricingMethod::Analytic => &ANALYTIC,
            PricingMethod::MonteCarlo => &MONTE_CARLO,
            PricingMethod::Pde => &PDE,
        }
    }

    pub fn select(
        &self,
        instrument: &Instrument,
        config: &PricingModelConfig,
    ) -> &'static dyn Pricer {
        let method = config.method.unwrap_or_else(|| default_method(instrument));
        debug!(
            instrument = instrument.kind_name(),
            ?method,
            explicit = config.method.is_some(),
            "selected pricer"
        );
        Self::pricer_for(method)
    }
}

/// Price an instrument against a market snapshot.
pub fn price(
    instrument: &Instrument,
    market: &MarketDataSnapshot,
    config: &PricingModelConfig,
) -> FxResult<ValuationResult> {
    price_with_cancellation(instrument, market, config, &NeverCancel)
}

/// [`price`] with a cancellation signal polled by the Monte Carlo and PDE engines.
pub fn price_with_cancellation(
    instrument: &Instrument,
    market: &MarketDataSnapshot,
    config: &PricingModelConfig,
    cancel: &dyn CancellationSignal,
) -> FxResult<ValuationResult> {
    instrument.validate()?;
    config.validate()?;
    let terms = instrument.terms();
    if &terms.pair != market.pair() {
        return Err(FxError::invalid(
            "currency_pair",
            f64::NAN,
            format!("instrument is on {} but the market snapshot is {}", terms.pair, market.pair()),
        ));
    }

    let pricer = PricerSelector.select(instrument, config);
    let unit = pricer.price_unit(instrument, market, config, cancel)?;
    Ok(ValuationResult::from_unit(
        unit,
        pricer.method(),
        terms,
        market.spot(),
        market.forward(terms.expiry),
    ))
}
