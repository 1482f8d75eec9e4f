//! FX option instruments
//!
//! Every instrument is an immutable value object sharing [`OptionTerms`]
//! (pair, call/put, strike, expiry, notional) plus its payoff-specific
//! parameters. Expiry is a year fraction from the valuation time; use
//! [`crate::market::MarketDataSnapshot::time_to`] to convert a date.

pub mod payoff;

use crate::error::{validation::*, FxError, FxResult};
use crate::market::currency::CurrencyPair;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    /// +1 for calls, -1 for puts
    pub fn sign(self) -> f64 {
        match self {
            OptionType::Call => 1.0,
            OptionType::Put => -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExerciseStyle {
    European,
    American,
}

/// Currency the notional is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotionalCurrency {
    /// Base currency of the pair (EUR in EURUSD)
    Foreign,
    /// Quote currency of the pair (USD in EURUSD), converted at spot
    Domestic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionTerms {
    pub pair: CurrencyPair,
    pub option_type: OptionType,
    pub strike: f64,
    /// Year fraction to expiry
    pub expiry: f64,
    pub notional: f64,
    pub notional_currency: NotionalCurrency,
}

impl OptionTerms {
    pub fn new(
        pair: CurrencyPair,
        option_type: OptionType,
        strike: f64,
        expiry: f64,
        notional: f64,
    ) -> FxResult<Self> {
        let terms = Self {
            pair,
            option_type,
            strike,
            expiry,
            notional,
            notional_currency: NotionalCurrency::Foreign,
        };
        terms.validate()?;
        Ok(terms)
    }

    pub fn with_notional_currency(mut self, currency: NotionalCurrency) -> Self {
        self.notional_currency = currency;
        self
    }

    pub fn validate(&self) -> FxResult<()> {
        validate_positive("strike", self.strike)?;
        validate_non_negative("expiry", self.expiry)?;
        validate_positive("notional", self.notional)?;
        Ok(())
    }

    /// Amount of foreign currency the option is written on.
    pub fn foreign_amount(&self, spot: f64) -> f64 {
        match self.notional_currency {
            NotionalCurrency::Foreign => self.notional,
            NotionalCurrency::Domestic => self.notional / spot,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BarrierKind {
    UpAndOut,
    DownAndOut,
    UpAndIn,
    DownAndIn,
}

impl BarrierKind {
    pub fn is_up(self) -> bool {
        matches!(self, BarrierKind::UpAndOut | BarrierKind::UpAndIn)
    }

    pub fn is_knock_out(self) -> bool {
        matches!(self, BarrierKind::UpAndOut | BarrierKind::DownAndOut)
    }

    /// Whether `spot` sits on or beyond the barrier.
    pub fn is_breached(self, spot: f64, barrier: f64) -> bool {
        if self.is_up() {
            spot >= barrier
        } else {
            spot <= barrier
        }
    }

    /// Knock-out twin used for in/out parity.
    pub fn knock_out_twin(self) -> BarrierKind {
        match self {
            BarrierKind::UpAndIn | BarrierKind::UpAndOut => BarrierKind::UpAndOut,
            BarrierKind::DownAndIn | BarrierKind::DownAndOut => BarrierKind::DownAndOut,
        }
    }
}

/// European barrier option with an optional rebate paid at expiry
/// when knocked out (or never knocked in).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarrierOption {
    pub terms: OptionTerms,
    pub barrier: f64,
    pub kind: BarrierKind,
    /// Rebate per unit of foreign notional, in domestic currency
    pub rebate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DigitalPayout {
    /// Pays `amount` of domestic currency per unit of foreign notional
    CashOrNothing { amount: f64 },
    /// Pays one unit of foreign currency (worth `S_T` domestic)
    AssetOrNothing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DigitalObservation {
    /// Pays if `S_T` finishes beyond the strike (above for calls, below for puts)
    AtExpiry,
    /// Pays at expiry if the strike level is touched before expiry
    OneTouch,
    /// Pays at expiry if the strike level is never touched
    NoTouch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigitalOption {
    pub terms: OptionTerms,
    pub payout: DigitalPayout,
    pub observation: DigitalObservation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instrument {
    EuropeanVanilla(OptionTerms),
    AmericanVanilla(OptionTerms),
    Barrier(BarrierOption),
    Digital(DigitalOption),
}

impl Instrument {
    pub fn european(terms: OptionTerms) -> FxResult<Self> {
        terms.validate()?;
        Ok(Instrument::EuropeanVanilla(terms))
    }

    pub fn american(terms: OptionTerms) -> FxResult<Self> {
        terms.validate()?;
        Ok(Instrument::AmericanVanilla(terms))
    }

    pub fn barrier(
        terms: OptionTerms,
        barrier: f64,
        kind: BarrierKind,
        rebate: f64,
    ) -> FxResult<Self> {
        let instrument = Instrument::Barrier(BarrierOption {
            terms,
            barrier,
            kind,
            rebate,
        });
        instrument.validate()?;
        Ok(instrument)
    }

    pub fn digital(
        terms: OptionTerms,
        payout: DigitalPayout,
        observation: DigitalObservation,
    ) -> FxResult<Self> {
        let instrument = Instrument::Digital(DigitalOption {
            terms,
            payout,
            observation,
        });
        instrument.validate()?;
        Ok(instrument)
    }

    pub fn terms(&self) -> &OptionTerms {
        match self {
            Instrument::EuropeanVanilla(terms) | Instrument::AmericanVanilla(terms) => terms,
            Instrument::Barrier(b) => &b.terms,
            Instrument::Digital(d) => &d.terms,
        }
    }

    pub fn exercise(&self) -> ExerciseStyle {
        match self {
            Instrument::AmericanVanilla(_) => ExerciseStyle::American,
            _ => ExerciseStyle::European,
        }
    }

    /// Whether the payoff depends on the path, not only on `S_T`.
    pub fn is_path_dependent(&self) -> bool {
        match self {
            Instrument::Barrier(_) => true,
            Instrument::Digital(d) => d.observation != DigitalObservation::AtExpiry,
            _ => false,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Instrument::EuropeanVanilla(_) => "EuropeanVanilla",
            Instrument::AmericanVanilla(_) => "AmericanVanilla",
            Instrument::Barrier(_) => "BarrierOption",
            Instrument::Digital(_) => "DigitalOption",
        }
    }

    pub fn validate(&self) -> FxResult<()> {
        self.terms().validate()?;
        match self {
            Instrument::Barrier(b) => {
                validate_positive("barrier", b.barrier)?;
                validate_non_negative("rebate", b.rebate)?;
            }
            Instrument::Digital(d) => {
                if let DigitalPayout::CashOrNothing { amount } = d.payout {
                    validate_positive("cash_amount", amount)?;
                }
                if d.observation != DigitalObservation::AtExpiry
                    && d.payout == DigitalPayout::AssetOrNothing
                {
                    return Err(FxError::invalid(
                        "digital_payout",
                        f64::NAN,
                        "touch digitals must pay a cash amount",
                    ));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eurusd() -> CurrencyPair {
        CurrencyPair::parse("EURUSD").unwrap()
    }

    #[test]
    fn test_terms_validation() {
        assert!(OptionTerms::new(eurusd(), OptionType::Call, 1.1, 1.0, 1e6).is_ok());
        assert!(OptionTerms::new(eurusd(), OptionType::Call, 0.0, 1.0, 1e6).is_err());
        assert!(OptionTerms::new(eurusd(), OptionType::Call, 1.1, -0.1, 1e6).is_err());
        assert!(OptionTerms::new(eurusd(), OptionType::Call, 1.1, 1.0, 0.0).is_err());
    }

    #[test]
    fn test_foreign_amount_conversion() {
        let terms = OptionTerms::new(eurusd(), OptionType::Put, 1.1, 0.5, 1_100_000.0)
            .unwrap()
            .with_notional_currency(NotionalCurrency::Domestic);
        assert!((terms.foreign_amount(1.1) - 1_000_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_barrier_breach_and_twin() {
        assert!(BarrierKind::UpAndOut.is_breached(1.2, 1.2));
        assert!(!BarrierKind::DownAndIn.is_breached(1.2, 1.0));
        assert_eq!(BarrierKind::DownAndIn.knock_out_twin(), BarrierKind::DownAndOut);
        assert!(BarrierKind::UpAndIn.is_up());
        assert!(!BarrierKind::UpAndIn.is_knock_out());
    }

    #[test]
    fn test_touch_digital_requires_cash() {
        let terms = OptionTerms::new(eurusd(), OptionType::Call, 1.2, 1.0, 1e6).unwrap();
        assert!(Instrument::digital(
            terms.clone(),
            DigitalPayout::AssetOrNothing,
            DigitalObservation::OneTouch
        )
        .is_err());
        let touch = Instrument::digital(
            terms,
            DigitalPayout::CashOrNothing { amount: 1.0 },
            DigitalObservation::OneTouch,
        )
        .unwrap();
        assert!(touch.is_path_dependent());
    }
}
