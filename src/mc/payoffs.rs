//! Path payoffs for the Monte Carlo engine
//!
//! # Definitions
//!
//! Every payoff reads a discretely monitored path `[S_0, S_1, ..., S_N]` and
//! returns the undiscounted amount paid at expiry, per unit of foreign
//! notional in domestic currency.
//!
//! - **Vanilla**: `max(w(S_N - K), 0)` with `w = ±1`
//! - **Barrier**: vanilla payoff if alive at expiry, rebate otherwise. A
//!   knock-out dies on the first monitored point on or beyond the barrier; a
//!   knock-in comes alive there.
//! - **Digital**: cash amount or `S_N` when `S_N` finishes beyond the strike
//! - **Touch**: cash amount when the strike level is (one-touch) or is not
//!   (no-touch) reached; calls watch the level from below, puts from above
//!
//! Monitoring at discrete steps biases barrier and touch prices relative to
//! continuous monitoring; the bias shrinks with the step size.

use crate::error::{FxError, FxResult};
use crate::instruments::payoff::{digital_payoff, intrinsic};
use crate::instruments::{BarrierKind, DigitalObservation, DigitalPayout, Instrument, OptionType};

#[derive(Debug, Clone, PartialEq)]
pub enum PathPayoff {
    Vanilla {
        option_type: OptionType,
        strike: f64,
    },
    Barrier {
        option_type: OptionType,
        strike: f64,
        barrier: f64,
        kind: BarrierKind,
        rebate: f64,
    },
    Digital {
        option_type: OptionType,
        strike: f64,
        payout: DigitalPayout,
    },
    Touch {
        level: f64,
        up: bool,
        one_touch: bool,
        amount: f64,
    },
}

impl PathPayoff {
    /// Payoff for a European-exercise instrument.
    pub fn from_instrument(instrument: &Instrument) -> FxResult<Self> {
        let payoff = match instrument {
            Instrument::EuropeanVanilla(terms) => PathPayoff::Vanilla {
                option_type: terms.option_type,
                strike: terms.strike,
            },
            Instrument::AmericanVanilla(_) => {
                return Err(FxError::unsupported(
                    "MonteCarlo",
                    "early exercise is not simulated; use the PDE method for American options",
                ))
            }
            Instrument::Barrier(b) => PathPayoff::Barrier {
                option_type: b.terms.option_type,
                strike: b.terms.strike,
                barrier: b.barrier,
                kind: b.kind,
                rebate: b.rebate,
            },
            Instrument::Digital(d) => match d.observation {
                DigitalObservation::AtExpiry => PathPayoff::Digital {
                    option_type: d.terms.option_type,
                    strike: d.terms.strike,
                    payout: d.payout,
                },
                DigitalObservation::OneTouch | DigitalObservation::NoTouch => {
                    let amount = match d.payout {
                        DigitalPayout::CashOrNothing { amount } => amount,
                        DigitalPayout::AssetOrNothing => {
                            return Err(FxError::unsupported(
                                "MonteCarlo",
                                "touch digitals pay a cash amount",
                            ))
                        }
                    };
                    PathPayoff::Touch {
                        level: d.terms.strike,
                        up: d.terms.option_type == OptionType::Call,
                        one_touch: d.observation == DigitalObservation::OneTouch,
                        amount,
                    }
                }
            },
        };
        Ok(payoff)
    }

    /// Whether intermediate monitoring points matter
    pub fn needs_path(&self) -> bool {
        matches!(self, PathPayoff::Barrier { .. } | PathPayoff::Touch { .. })
    }

    pub fn calculate(&self, path: &[f64]) -> f64 {
        let terminal = match path.last() {
            Some(&s) => s,
            None => return 0.0,
        };
        match *self {
            PathPayoff::Vanilla {
                option_type,
                strike,
            } => intrinsic(option_type, terminal, strike),
            PathPayoff::Barrier {
                option_type,
                strike,
                barrier,
                kind,
                rebate,
            } => {
                let hit = path.iter().any(|&s| kind.is_breached(s, barrier));
                let alive = if kind.is_knock_out() { !hit } else { hit };
                if alive {
                    intrinsic(option_type, terminal, strike)
                } else {
                    rebate
                }
            }
            PathPayoff::Digital {
                option_type,
                strike,
                payout,
            } => digital_payoff(option_type, payout, terminal, strike),
            PathPayoff::Touch {
                level,
                up,
                one_touch,
                amount,
            } => {
                let touched = path
                    .iter()
                    .any(|&s| if up { s >= level } else { s <= level });
                if touched == one_touch {
                    amount
                } else {
                    0.0
                }
            }
        }
    }
}
