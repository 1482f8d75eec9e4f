//! Finite-difference pricer
//!
//! Each instrument is reduced to a weighted sum of grid contracts:
//!
//! | Instrument | Contracts |
//! |---|---|
//! | European / American vanilla | one vanilla, with early exercise for American |
//! | at-expiry digital | one digital |
//! | knock-out barrier | vanilla absorbed at the barrier, paying the rebate |
//! | knock-in barrier | vanilla − knock-out(rebate 0) + knock-out cash(rebate) |
//! | one-touch | zero payoff absorbed at the level, paying the amount |
//! | no-touch | cash amount absorbed at the level |
//!
//! Spot already beyond a barrier or touch level resolves without a grid.
//! The legs of one instrument are stepped together, so a cancelled run reads
//! every leg on the same layer.
//!
//! Delta, gamma and theta come off the grid. Vega and the rhos are central
//! bump-and-reprice differences on the (deterministic) solver. A valuation
//! whose bumped solves are cut short is partial.

pub mod grid;
pub mod solver;

use crate::config::{FdScheme, GreeksConfig, PricingMethod, PricingModelConfig};
use crate::error::{validation::*, FxError, FxResult};
use crate::instruments::{DigitalObservation, DigitalPayout, Instrument, OptionType};
use crate::market::MarketDataSnapshot;
use crate::mc::cancel::CancellationSignal;
use crate::pricer::{Greeks, Pricer, UnitValuation, WorkTally};
use grid::{FdContract, FdMarket, FdPayoff, FdProblem};
use solver::{check_stability, ThetaStepper};
use tracing::debug;

/// An instrument as seen by the grid.
#[derive(Debug, Clone, PartialEq)]
enum Decomposition {
    /// Amount paid at expiry regardless of the path
    Settled(f64),
    /// Weighted grid contracts
    Legs(Vec<(f64, FdContract)>),
}

fn decompose(instrument: &Instrument, spot: f64) -> FxResult<Decomposition> {
    let terms = instrument.terms();
    let (k, t, ot) = (terms.strike, terms.expiry, terms.option_type);
    let vanilla = FdContract::european(FdPayoff::Vanilla(ot), k, t);

    let legs = match instrument {
        Instrument::EuropeanVanilla(_) => vec![(1.0, vanilla)],
        Instrument::AmericanVanilla(_) => vec![(1.0, vanilla.with_early_exercise())],
        Instrument::Barrier(b) => {
            let up = b.kind.is_up();
            let breached = b.kind.is_breached(spot, b.barrier);
            match (b.kind.is_knock_out(), breached) {
                (true, true) => return Ok(Decomposition::Settled(b.rebate)),
                (false, true) => vec![(1.0, vanilla)],
                (true, false) => vec![(1.0, vanilla.knocked_out_at(b.barrier, up, b.rebate))],
                (false, false) => {
                    let mut legs = vec![
                        (1.0, vanilla),
                        (-1.0, vanilla.knocked_out_at(b.barrier, up, 0.0)),
                    ];
                    if b.rebate != 0.0 {
                        let cash = FdContract::european(FdPayoff::Cash(b.rebate), k, t)
                            .knocked_out_at(b.barrier, up, 0.0);
                        legs.push((1.0, cash));
                    }
                    legs
                }
            }
        }
        Instrument::Digital(d) => match d.observation {
            DigitalObservation::AtExpiry => {
                vec![(1.0, FdContract::european(FdPayoff::Digital(ot, d.payout), k, t))]
            }
            DigitalObservation::OneTouch | DigitalObservation::NoTouch => {
                let amount = match d.payout {
                    DigitalPayout::CashOrNothing { amount } => amount,
                    DigitalPayout::AssetOrNothing => {
                        return Err(FxError::unsupported("PDE", "touch digitals pay a cash amount"))
                    }
                };
                let up = ot == OptionType::Call;
                let touched = if up { spot >= k } else { spot <= k };
                let one_touch = d.observation == DigitalObservation::OneTouch;
                match (one_touch, touched) {
                    (true, true) => return Ok(Decomposition::Settled(amount)),
                    (false, true) => return Ok(Decomposition::Settled(0.0)),
                    (true, false) => vec![(
                        1.0,
                        FdContract::european(FdPayoff::Cash(0.0), k, t)
                            .knocked_out_at(k, up, amount),
                    )],
                    (false, false) => vec![(
                        1.0,
                        FdContract::european(FdPayoff::Cash(amount), k, t)
                            .knocked_out_at(k, up, 0.0),
                    )],
                }
            }
        },
    };
    Ok(Decomposition::Legs(legs))
}

/// Grid readouts of a weighted set of contracts on a common layer.
struct Composite {
    value: f64,
    delta: f64,
    gamma: f64,
    theta: f64,
    completed: usize,
    requested: usize,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PdePricer;

impl PdePricer {
    /// Step every leg in lockstep, polling `cancel` once per time step, and
    /// read the weighted sum on the last layer all legs reached.
    fn solve_legs(
        &self,
        legs: &[(f64, FdContract)],
        market: FdMarket,
        scheme: FdScheme,
        config: &PricingModelConfig,
        cancel: &dyn CancellationSignal,
    ) -> FxResult<Composite> {
        let mut steppers = legs
            .iter()
            .map(|&(_, contract)| {
                ThetaStepper::new(
                    &FdProblem { contract, market },
                    scheme,
                    config.time_steps,
                    config.grid_size,
                )
            })
            .collect::<FxResult<Vec<_>>>()?;
        for _ in 0..config.time_steps {
            if cancel.is_cancelled() {
                break;
            }
            for stepper in steppers.iter_mut() {
                stepper.step()?;
            }
        }

        let mut out = Composite {
            value: 0.0,
            delta: 0.0,
            gamma: 0.0,
            theta: 0.0,
            completed: steppers.first().map_or(0, ThetaStepper::completed_steps),
            requested: config.time_steps,
        };
        for (&(w, _), stepper) in legs.iter().zip(steppers) {
            let s = stepper.finish()?;
            debug!(
                nodes = s.grid().nodes(),
                steps = s.completed_steps(),
                dx = s.grid().dx(),
                "PDE leg solved"
            );
            let layer = s.completed_steps();
            let r = s.readout(layer, market.spot);
            out.value += w * r.value;
            out.delta += w * r.delta;
            out.gamma += w * r.gamma;
            out.theta += w * s.theta(layer, market.spot);
        }
        Ok(out)
    }

    /// Composite value of a bumped market; `None` if the solve was cut short.
    fn bumped_value(
        &self,
        legs: &[(f64, FdContract)],
        market: FdMarket,
        scheme: FdScheme,
        config: &PricingModelConfig,
        cancel: &dyn CancellationSignal,
        tally: &mut WorkTally,
    ) -> FxResult<Option<f64>> {
        match self.solve_legs(legs, market, scheme, config, cancel) {
            Ok(c) => {
                tally.record(c.completed, c.requested);
                Ok((c.completed == c.requested).then_some(c.value))
            }
            Err(FxError::Cancelled { .. }) => {
                tally.record(0, config.time_steps);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Values at a pair of bumped markets, both on one scheme.
    ///
    /// An explicit step that is stable for the base market can be unstable
    /// once volatility or rates are bumped; the pair then runs Crank–Nicolson.
    #[allow(clippy::too_many_arguments)]
    fn bumped_pair(
        &self,
        legs: &[(f64, FdContract)],
        up: FdMarket,
        down: FdMarket,
        config: &PricingModelConfig,
        cancel: &dyn CancellationSignal,
        tally: &mut WorkTally,
    ) -> FxResult<Option<(f64, f64)>> {
        let mut scheme = config.scheme;
        if scheme == FdScheme::Explicit {
            for market in [up, down] {
                for &(_, contract) in legs {
                    let problem = FdProblem { contract, market };
                    match check_stability(&problem, scheme, config.time_steps, config.grid_size) {
                        Ok(()) => {}
                        Err(FxError::GridInstability { dt, dt_max, .. }) => {
                            debug!(
                                dt,
                                dt_max, "bumped explicit step unstable, using Crank-Nicolson"
                            );
                            scheme = FdScheme::CrankNicolson;
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }
        let u = self.bumped_value(legs, up, scheme, config, cancel, tally)?;
        let d = self.bumped_value(legs, down, scheme, config, cancel, tally)?;
        Ok(u.zip(d))
    }

    fn bumped_greeks(
        &self,
        legs: &[(f64, FdContract)],
        market: FdMarket,
        config: &PricingModelConfig,
        cancel: &dyn CancellationSignal,
        greeks: &mut Greeks,
        tally: &mut WorkTally,
    ) -> FxResult<()> {
        let requested = config.greeks;
        if requested.contains(GreeksConfig::VEGA) {
            let h = market.sigma * config.vol_bump;
            let up = FdMarket { sigma: market.sigma + h, ..market };
            let down = FdMarket { sigma: market.sigma - h, ..market };
            if let Some((u, d)) = self.bumped_pair(legs, up, down, config, cancel, tally)? {
                greeks.vega = (u - d) / (2.0 * h);
            }
        }
        let h = config.rate_bump;
        if requested.contains(GreeksConfig::RHO_DOMESTIC) {
            let up = FdMarket { rd: market.rd + h, ..market };
            let down = FdMarket { rd: market.rd - h, ..market };
            if let Some((u, d)) = self.bumped_pair(legs, up, down, config, cancel, tally)? {
                greeks.rho_domestic = (u - d) / (2.0 * h);
            }
        }
        if requested.contains(GreeksConfig::RHO_FOREIGN) {
            let up = FdMarket { rf: market.rf + h, ..market };
            let down = FdMarket { rf: market.rf - h, ..market };
            if let Some((u, d)) = self.bumped_pair(legs, up, down, config, cancel, tally)? {
                greeks.rho_foreign = (u - d) / (2.0 * h);
            }
        }
        Ok(())
    }
}

/// Keep only the requested Greeks
fn mask(greeks: Greeks, requested: GreeksConfig) -> Greeks {
    let pick = |flag: GreeksConfig, v: f64| if requested.contains(flag) { v } else { f64::NAN };
    Greeks {
        delta: pick(GreeksConfig::DELTA, greeks.delta),
        gamma: pick(GreeksConfig::GAMMA, greeks.gamma),
        vega: pick(GreeksConfig::VEGA, greeks.vega),
        theta: pick(GreeksConfig::THETA, greeks.theta),
        rho_domestic: pick(GreeksConfig::RHO_DOMESTIC, greeks.rho_domestic),
        rho_foreign: pick(GreeksConfig::RHO_FOREIGN, greeks.rho_foreign),
    }
}

impl Pricer for PdePricer {
    fn method(&self) -> PricingMethod {
        PricingMethod::Pde
    }

    fn price_unit(
        &self,
        instrument: &Instrument,
        market: &MarketDataSnapshot,
        config: &PricingModelConfig,
        cancel: &dyn CancellationSignal,
    ) -> FxResult<UnitValuation> {
        let terms = instrument.terms();
        let (spot, k, t) = (market.spot(), terms.strike, terms.expiry);
        validate_positive("strike", k)?;
        validate_non_negative("expiry", t)?;
        validate_count("grid_size", config.grid_size, 3)?;
        validate_count("time_steps", config.time_steps, 1)?;

        let rd = market.domestic_rate(t);
        let rf = market.foreign_rate(t);
        let legs = match decompose(instrument, spot)? {
            Decomposition::Settled(amount) => {
                // V = A·exp(−r_d T)
                let price = amount * market.domestic_df(t);
                let greeks = Greeks {
                    theta: rd * price,
                    rho_domestic: -t * price,
                    ..Greeks::default()
                };
                return Ok(UnitValuation::complete(price, mask(greeks, config.greeks)));
            }
            Decomposition::Legs(legs) => legs,
        };

        if t == 0.0 {
            let (price, delta) = legs.iter().fold((0.0, 0.0), |(p, d), (w, c)| {
                (p + w * c.payoff.terminal(spot, k), d + w * c.payoff.terminal_delta(spot, k))
            });
            let greeks = Greeks {
                delta,
                ..Greeks::default()
            };
            return Ok(UnitValuation::complete(price, mask(greeks, config.greeks)));
        }

        let sigma = market.volatility(t, k)?;
        validate_positive("volatility", sigma)?;
        let fd_market = FdMarket { spot, rd, rf, sigma };

        let base = self.solve_legs(&legs, fd_market, config.scheme, config, cancel)?;
        validate_finite("pde_price", base.value)?;

        let mut greeks = Greeks {
            delta: base.delta,
            gamma: base.gamma,
            theta: base.theta,
            ..Greeks::NOT_COMPUTED
        };
        let mut tally = WorkTally::default();
        tally.record(base.completed, base.requested);
        if !tally.interrupted {
            self.bumped_greeks(&legs, fd_market, config, cancel, &mut greeks, &mut tally)?;
        }
        // A bump cut short leaves its Greeks NaN, so the valuation is partial
        let completion = tally.completion();

        Ok(UnitValuation {
            price: base.value,
            greeks: mask(greeks, config.greeks),
            confidence_interval: None,
            completion,
            warnings: Vec::new(),
        })
    }
}
