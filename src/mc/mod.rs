//! Monte Carlo pricer
//!
//! Greeks are central bump-and-reprice differences with common random
//! numbers: every bumped run reuses the base seed, so partition `p` sees the
//! same normal draws in every scenario.
//!
//! | Greek | Bump |
//! |---|---|
//! | delta, gamma | spot × (1 ± `spot_bump`) |
//! | vega | whole surface × (1 ± `vol_bump`) |
//! | rho_d, rho_f | curve ± `rate_bump` |
//! | theta | expiry one day shorter (forward difference) |
//!
//! Greeks not requested in the configuration are `NaN`.

pub mod cancel;
pub mod mc_engine;
pub mod payoffs;

use crate::config::{GreeksConfig, PricingMethod, PricingModelConfig, VolDynamics};
use crate::error::{FxError, FxResult, PrecisionWarning};
use crate::instruments::Instrument;
use crate::market::MarketDataSnapshot;
use crate::models::gbm::FxGbm;
use crate::models::local_vol::LocalVolGrid;
use crate::pricer::{ConfidenceInterval, Greeks, Pricer, UnitValuation, WorkTally};
use cancel::CancellationSignal;
use mc_engine::{simulate, McEstimate, McSettings};
use payoffs::PathPayoff;
use rayon::ThreadPool;
use tracing::{debug, warn};

pub const MIN_RECOMMENDED_PATHS: usize = 1000;
const LOCAL_VOL_TIME_NODES: usize = 50;
const LOCAL_VOL_SPACE_NODES: usize = 101;
const ONE_DAY: f64 = 1.0 / 365.0;

/// Smallest monitoring grid that keeps discrete-monitoring bias acceptable:
/// weekly steps, never fewer than ten
pub fn min_monitoring_steps(expiry: f64) -> usize {
    ((52.0 * expiry).ceil() as usize).max(10)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MonteCarloPricer;

impl MonteCarloPricer {
    #[allow(clippy::too_many_arguments)]
    fn estimate(
        &self,
        payoff: &PathPayoff,
        market: &MarketDataSnapshot,
        strike: f64,
        expiry: f64,
        config: &PricingModelConfig,
        settings: &McSettings,
        pool: &ThreadPool,
        cancel: &dyn CancellationSignal,
    ) -> FxResult<McEstimate> {
        let rd = market.domestic_rate(expiry);
        let rf = market.foreign_rate(expiry);
        let discount = market.domestic_df(expiry);
        let spot = market.spot();
        match config.vol_dynamics {
            VolDynamics::Constant => {
                let sigma = market.volatility(expiry, strike)?;
                let gbm = FxGbm::new(rd, rf, sigma);
                simulate(&gbm, payoff, spot, expiry, discount, settings, pool, cancel)
            }
            VolDynamics::LocalVol => {
                let grid = LocalVolGrid::from_surface(
                    market.surface(),
                    spot,
                    rd,
                    rf,
                    expiry.max(ONE_DAY),
                    LOCAL_VOL_TIME_NODES,
                    LOCAL_VOL_SPACE_NODES,
                )?;
                simulate(&grid, payoff, spot, expiry, discount, settings, pool, cancel)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn bumped_greeks(
        &self,
        payoff: &PathPayoff,
        market: &MarketDataSnapshot,
        strike: f64,
        expiry: f64,
        base: f64,
        config: &PricingModelConfig,
        settings: &McSettings,
        pool: &ThreadPool,
        cancel: &dyn CancellationSignal,
        tally: &mut WorkTally,
    ) -> FxResult<Greeks> {
        let mut greeks = Greeks::NOT_COMPUTED;
        let requested = config.greeks;
        let mut run = |m: &MarketDataSnapshot, t: f64| -> FxResult<Option<f64>> {
            match self.estimate(payoff, m, strike, t, config, settings, pool, cancel) {
                // Only complete runs keep common random numbers with the base
                Ok(est) => {
                    tally.record(est.paths_used, est.paths_requested);
                    Ok(est.is_complete().then_some(est.mean))
                }
                Err(FxError::Cancelled { completed, requested: paths }) => {
                    tally.record(completed, paths);
                    Ok(None)
                }
                Err(e) => Err(e),
            }
        };

        if requested.intersects(GreeksConfig::DELTA | GreeksConfig::GAMMA) {
            let h = market.spot() * config.spot_bump;
            let up = run(&market.with_spot(market.spot() + h)?, expiry)?;
            let down = run(&market.with_spot(market.spot() - h)?, expiry)?;
            if let (Some(up), Some(down)) = (up, down) {
                if requested.contains(GreeksConfig::DELTA) {
                    greeks.delta = (up - down) / (2.0 * h);
                }
                if requested.contains(GreeksConfig::GAMMA) {
                    greeks.gamma = (up - 2.0 * base + down) / (h * h);
                }
            }
        }

        if requested.contains(GreeksConfig::VEGA) {
            let sigma = market.volatility(expiry, strike)?;
            let b = config.vol_bump;
            let up = run(&market.with_vol_scale(1.0 + b), expiry)?;
            let down = run(&market.with_vol_scale(1.0 - b), expiry)?;
            if let (Some(up), Some(down)) = (up, down) {
                greeks.vega = (up - down) / (2.0 * b * sigma);
            }
        }

        if requested.contains(GreeksConfig::THETA) {
            let step = ONE_DAY.min(expiry);
            if step > 0.0 {
                if let Some(shorter) = run(market, expiry - step)? {
                    greeks.theta = (shorter - base) / step;
                }
            } else {
                greeks.theta = 0.0;
            }
        }

        let h = config.rate_bump;
        if requested.contains(GreeksConfig::RHO_DOMESTIC) {
            let up = run(&market.with_domestic_shift(h), expiry)?;
            let down = run(&market.with_domestic_shift(-h), expiry)?;
            if let (Some(up), Some(down)) = (up, down) {
                greeks.rho_domestic = (up - down) / (2.0 * h);
            }
        }
        if requested.contains(GreeksConfig::RHO_FOREIGN) {
            let up = run(&market.with_foreign_shift(h), expiry)?;
            let down = run(&market.with_foreign_shift(-h), expiry)?;
            if let (Some(up), Some(down)) = (up, down) {
                greeks.rho_foreign = (up - down) / (2.0 * h);
            }
        }

        Ok(greeks)
    }
}

impl Pricer for MonteCarloPricer {
    fn method(&self) -> PricingMethod {
        PricingMethod::MonteCarlo
    }

    fn price_unit(
        &self,
        instrument: &Instrument,
        market: &MarketDataSnapshot,
        config: &PricingModelConfig,
        cancel: &dyn CancellationSignal,
    ) -> FxResult<UnitValuation> {
        let payoff = PathPayoff::from_instrument(instrument)?;
        let terms = instrument.terms();
        let (strike, expiry) = (terms.strike, terms.expiry);

        let steps = if payoff.needs_path() || config.vol_dynamics == VolDynamics::LocalVol {
            config.time_steps
        } else {
            1
        };
        let settings = McSettings {
            paths: config.paths,
            steps,
            antithetic: config.antithetic,
            seed: config.seed,
            partition_size: config.partition_size,
        };

        let mut warnings = Vec::new();
        if config.paths < MIN_RECOMMENDED_PATHS {
            warnings.push(PrecisionWarning::ThinPathCount {
                paths: config.paths,
                minimum: MIN_RECOMMENDED_PATHS,
            });
        }
        if payoff.needs_path() && steps < min_monitoring_steps(expiry) {
            warnings.push(PrecisionWarning::CoarseBarrierMonitoring {
                time_steps: steps,
                minimum: min_monitoring_steps(expiry),
            });
        }
        for warning in &warnings {
            warn!(instrument = instrument.kind_name(), %warning, "Monte Carlo precision warning");
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.thread_count())
            .build()
            .map_err(|e| FxError::NumericalInstability {
                method: "Monte Carlo".to_string(),
                reason: format!("cannot start worker pool: {}", e),
            })?;

        let base =
            self.estimate(&payoff, market, strike, expiry, config, &settings, &pool, cancel)?;
        debug!(
            mean = base.mean,
            std_error = base.std_error,
            paths = base.paths_used,
            "Monte Carlo base run"
        );

        let mut tally = WorkTally::default();
        tally.record(base.paths_used, base.paths_requested);
        let greeks = if base.is_complete() && !config.greeks.is_empty() {
            self.bumped_greeks(
                &payoff, market, strike, expiry, base.mean, config, &settings, &pool, cancel,
                &mut tally,
            )?
        } else {
            Greeks::NOT_COMPUTED
        };
        // A bump cut short leaves its Greeks NaN, so the valuation is partial
        let completion = tally.completion();
        if tally.interrupted && base.is_complete() {
            debug!(
                completed = tally.completed,
                requested = tally.requested,
                "Monte Carlo Greeks interrupted by cancellation"
            );
        }

        Ok(UnitValuation {
            price: base.mean,
            greeks,
            confidence_interval: Some(ConfidenceInterval::from_estimate(base.mean, base.std_error)),
            completion,
            warnings,
        })
    }
}
