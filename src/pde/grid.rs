// src/pde/grid.rs
//! Contract description and log-spot grid for the finite-difference solver.

use crate::error::{FxError, FxResult};
use crate::instruments::payoff::{digital_asymptote, digital_payoff, intrinsic, vanilla_asymptote};
use crate::instruments::{DigitalPayout, OptionType};

/// Half-width of the grid in standard deviations of `ln S_T`
pub const STD_DEVS: f64 = 5.0;

/// Terminal payoff of one grid contract.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FdPayoff {
    Vanilla(OptionType),
    Digital(OptionType, DigitalPayout),
    /// Fixed amount paid at expiry wherever the contract is still alive
    Cash(f64),
}

impl FdPayoff {
    pub fn terminal(&self, spot: f64, strike: f64) -> f64 {
        match *self {
            FdPayoff::Vanilla(ot) => intrinsic(ot, spot, strike),
            FdPayoff::Digital(ot, payout) => digital_payoff(ot, payout, spot, strike),
            FdPayoff::Cash(amount) => amount,
        }
    }

    /// Slope of the terminal payoff, used for delta at expiry.
    pub fn terminal_delta(&self, spot: f64, strike: f64) -> f64 {
        match *self {
            FdPayoff::Vanilla(OptionType::Call) if spot > strike => 1.0,
            FdPayoff::Vanilla(OptionType::Put) if spot < strike => -1.0,
            FdPayoff::Digital(ot, DigitalPayout::AssetOrNothing)
                if digital_payoff(ot, DigitalPayout::AssetOrNothing, spot, strike) > 0.0 =>
            {
                1.0
            }
            _ => 0.0,
        }
    }

    /// Value far from the strike, given discount factors to expiry.
    pub fn far_field(&self, spot: f64, strike: f64, df_domestic: f64, df_foreign: f64) -> f64 {
        match *self {
            FdPayoff::Vanilla(ot) => vanilla_asymptote(ot, spot, strike, df_domestic, df_foreign),
            FdPayoff::Digital(ot, payout) => {
                digital_asymptote(ot, payout, spot, strike, df_domestic, df_foreign)
            }
            FdPayoff::Cash(amount) => amount * df_domestic,
        }
    }
}

/// Condition on one edge of the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundaryCondition {
    /// Edge far from the strike; value from the payoff's asymptote
    Asymptotic,
    /// Edge on a knock-out level; paying `rebate` at expiry once touched
    Absorbing { level: f64, rebate: f64 },
}

/// One contract solved on its own grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FdContract {
    pub payoff: FdPayoff,
    pub strike: f64,
    pub expiry: f64,
    pub lower: BoundaryCondition,
    pub upper: BoundaryCondition,
    pub early_exercise: bool,
}

impl FdContract {
    pub fn european(payoff: FdPayoff, strike: f64, expiry: f64) -> Self {
        FdContract {
            payoff,
            strike,
            expiry,
            lower: BoundaryCondition::Asymptotic,
            upper: BoundaryCondition::Asymptotic,
            early_exercise: false,
        }
    }

    pub fn with_early_exercise(mut self) -> Self {
        self.early_exercise = true;
        self
    }

    /// Knock out at `level`, on the upper edge when `up`
    pub fn knocked_out_at(mut self, level: f64, up: bool, rebate: f64) -> Self {
        let edge = BoundaryCondition::Absorbing { level, rebate };
        if up {
            self.upper = edge;
        } else {
            self.lower = edge;
        }
        self
    }
}

/// Flat market inputs to one solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FdMarket {
    pub spot: f64,
    pub rd: f64,
    pub rf: f64,
    pub sigma: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FdProblem {
    pub contract: FdContract,
    pub market: FdMarket,
}

impl FdProblem {
    /// Value held on an edge with `tau` years to expiry.
    pub fn boundary_value(&self, edge: BoundaryCondition, spot: f64, tau: f64) -> f64 {
        let df_d = (-self.market.rd * tau).exp();
        match edge {
            BoundaryCondition::Absorbing { rebate, .. } => rebate * df_d,
            BoundaryCondition::Asymptotic => {
                let df_f = (-self.market.rf * tau).exp();
                let c = &self.contract;
                let v = c.payoff.far_field(spot, c.strike, df_d, df_f);
                if c.early_exercise {
                    v.max(c.payoff.terminal(spot, c.strike))
                } else {
                    v
                }
            }
        }
    }
}

/// Uniform grid in `x = ln S`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogSpotGrid {
    x: Vec<f64>,
    spots: Vec<f64>,
    dx: f64,
}

impl LogSpotGrid {
    /// Span `ln S_0 ± 5σ√T`, widened to cover the strike and cut at any
    /// knock-out level so the level is an edge node.
    pub fn new(problem: &FdProblem, nodes: usize) -> FxResult<Self> {
        if nodes < 3 {
            return Err(FxError::invalid("grid_size", nodes as f64, "must be at least 3"));
        }
        let FdMarket { spot, sigma, .. } = problem.market;
        let c = &problem.contract;
        let x0 = spot.ln();
        let xk = c.strike.ln();
        let width = STD_DEVS * sigma * c.expiry.sqrt();

        let mut lo = x0.min(xk) - width;
        let mut hi = x0.max(xk) + width;
        if let BoundaryCondition::Absorbing { level, .. } = c.lower {
            lo = level.ln();
        }
        if let BoundaryCondition::Absorbing { level, .. } = c.upper {
            hi = level.ln();
        }
        if !(lo < x0 && x0 < hi) {
            return Err(FxError::invalid(
                "spot",
                spot,
                format!("must lie strictly inside the grid [{:.6}, {:.6}]", lo.exp(), hi.exp()),
            ));
        }

        let dx = (hi - lo) / (nodes - 1) as f64;
        let x: Vec<f64> = (0..nodes).map(|i| lo + i as f64 * dx).collect();
        let spots = x.iter().map(|x| x.exp()).collect();
        Ok(LogSpotGrid { x, spots, dx })
    }

    pub fn nodes(&self) -> usize {
        self.x.len()
    }

    pub fn dx(&self) -> f64 {
        self.dx
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn spots(&self) -> &[f64] {
        &self.spots
    }

    /// Interior node nearest to `ln spot`
    pub fn nearest_interior(&self, spot: f64) -> usize {
        let i = ((spot.ln() - self.x[0]) / self.dx).round();
        (i.max(1.0) as usize).min(self.nodes() - 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn problem(contract: FdContract) -> FdProblem {
        FdProblem {
            contract,
            market: FdMarket {
                spot: 1.1,
                rd: 0.05,
                rf: 0.03,
                sigma: 0.1,
            },
        }
    }

    #[test]
    fn test_grid_covers_spot_and_strike() {
        let p = problem(FdContract::european(FdPayoff::Vanilla(OptionType::Call), 1.5, 1.0));
        let grid = LogSpotGrid::new(&p, 101).unwrap();
        assert_eq!(grid.nodes(), 101);
        assert!(grid.spots()[0] < 1.1 && grid.spots()[100] > 1.5);
    }

    #[test]
    fn test_knock_out_level_is_edge_node() {
        let c = FdContract::european(FdPayoff::Vanilla(OptionType::Call), 1.1, 1.0)
            .knocked_out_at(1.3, true, 0.0);
        let grid = LogSpotGrid::new(&problem(c), 51).unwrap();
        assert!((grid.spots()[50] - 1.3).abs() < 1e-12);
    }

    #[test]
    fn test_spot_on_level_rejected() {
        let c = FdContract::european(FdPayoff::Vanilla(OptionType::Put), 1.1, 1.0)
            .knocked_out_at(1.1, false, 0.0);
        assert!(LogSpotGrid::new(&problem(c), 51).is_err());
    }

    #[test]
    fn test_absorbing_edge_pays_discounted_rebate() {
        let c = FdContract::european(FdPayoff::Vanilla(OptionType::Call), 1.1, 1.0)
            .knocked_out_at(1.3, true, 0.02);
        let p = problem(c);
        let v = p.boundary_value(p.contract.upper, 1.3, 0.5);
        assert!((v - 0.02 * (-0.025f64).exp()).abs() < 1e-15);
    }
}
