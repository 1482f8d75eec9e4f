//! Closed-form valuation
//!
//! The analytic pricer covers European vanillas and at-expiry digitals.
//! Volatility is read from the surface at the option's strike and expiry;
//! rates are the zero rates to expiry.

pub mod garman_kohlhagen;

use crate::config::{PricingMethod, PricingModelConfig};
use crate::error::{validation::*, FxError, FxResult};
use crate::instruments::payoff::{digital_payoff, intrinsic};
use crate::instruments::{DigitalObservation, Instrument, OptionType};
use crate::market::MarketDataSnapshot;
use crate::mc::cancel::CancellationSignal;
use crate::pricer::{Greeks, Pricer, UnitValuation};
use garman_kohlhagen::{digital_greeks, digital_price, gk_greeks, gk_price};

#[derive(Debug, Default, Clone, Copy)]
pub struct AnalyticPricer;

impl Pricer for AnalyticPricer {
    fn method(&self) -> PricingMethod {
        PricingMethod::Analytic
    }

    fn price_unit(
        &self,
        instrument: &Instrument,
        market: &MarketDataSnapshot,
        _config: &PricingModelConfig,
        _cancel: &dyn CancellationSignal,
    ) -> FxResult<UnitValuation> {
        let payout = match instrument {
            Instrument::EuropeanVanilla(_) => None,
            Instrument::Digital(d) if d.observation == DigitalObservation::AtExpiry => {
                Some(d.payout)
            }
            other => {
                return Err(FxError::unsupported(
                    "Analytic",
                    format!(
                        "no closed form for {}; use the PDE or MonteCarlo method",
                        other.kind_name()
                    ),
                ))
            }
        };

        let terms = instrument.terms();
        let (s, k, t) = (market.spot(), terms.strike, terms.expiry);
        validate_positive("strike", k)?;
        validate_non_negative("expiry", t)?;

        if t == 0.0 {
            let (price, delta) = match payout {
                None => (intrinsic(terms.option_type, s, k), expiry_delta(terms.option_type, s, k)),
                Some(p) => (digital_payoff(terms.option_type, p, s, k), 0.0),
            };
            return Ok(UnitValuation::complete(
                price,
                Greeks {
                    delta,
                    ..Greeks::default()
                },
            ));
        }

        let sigma = market.volatility(t, k)?;
        validate_positive("volatility", sigma)?;
        let rd = market.domestic_rate(t);
        let rf = market.foreign_rate(t);

        let (price, greeks) = match payout {
            None => (
                gk_price(terms.option_type, s, k, rd, rf, sigma, t),
                gk_greeks(terms.option_type, s, k, rd, rf, sigma, t),
            ),
            Some(p) => (
                digital_price(terms.option_type, p, s, k, rd, rf, sigma, t),
                digital_greeks(terms.option_type, p, s, k, rd, rf, sigma, t),
            ),
        };
        validate_finite("analytic_price", price)?;
        Ok(UnitValuation::complete(price, greeks))
    }
}

/// Delta of the expiry payoff: ±1 in the money, 0 otherwise
fn expiry_delta(option_type: OptionType, s: f64, k: f64) -> f64 {
    match option_type {
        OptionType::Call if s > k => 1.0,
        OptionType::Put if s < k => -1.0,
        _ => 0.0,
    }
}
