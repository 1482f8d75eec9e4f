// src/pde/solver.rs
//! Theta-scheme time stepping in log-spot
//!
//! # Equation
//!
//! With `x = ln S` and `τ` the time to expiry the Garman–Kohlhagen PDE reads
//! ```text
//! ∂V/∂τ = ½σ² V_xx + μ V_x − r_d V,   μ = r_d − r_f − ½σ²
//! ```
//! Central differences give the operator `(LV)_i = a V_{i-1} + b V_i + c V_{i+1}`
//! with
//! ```text
//! a = σ²/(2dx²) − μ/(2dx),  b = −σ²/dx² − r_d,  c = σ²/(2dx²) + μ/(2dx)
//! ```
//! and each step solves `(I − θ dτ L) V^{n+1} = (I + (1 − θ) dτ L) V^n`.
//!
//! | Scheme | θ | Stability |
//! |---|---|---|
//! | Explicit | 0 | `dτ ≤ 1 / (σ²/dx² + r_d)` |
//! | Implicit | 1 | unconditional |
//! | Crank–Nicolson | ½ | unconditional; first two steps implicit |
//!
//! Every layer is kept in a `(time_steps + 1) × nodes` array; layer `n`
//! holds values with `n · dτ` left to expiry.

use super::grid::{FdProblem, LogSpotGrid};
use crate::config::FdScheme;
use crate::error::{FxError, FxResult};
use crate::math_utils::solve_tridiagonal_inplace;
use crate::mc::cancel::CancellationSignal;
use ndarray::{Array2, ArrayView1};

/// Implicit start-up steps for Crank–Nicolson
pub const RANNACHER_STEPS: usize = 2;

/// Largest stable explicit time step
pub fn explicit_dt_max(sigma: f64, rd: f64, dx: f64) -> f64 {
    1.0 / (sigma * sigma / (dx * dx) + rd.max(0.0))
}

fn theta_for(scheme: FdScheme, step: usize) -> f64 {
    match scheme {
        FdScheme::Explicit => 0.0,
        FdScheme::Implicit => 1.0,
        FdScheme::CrankNicolson if step < RANNACHER_STEPS => 1.0,
        FdScheme::CrankNicolson => 0.5,
    }
}

/// Spot readout from one layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotReadout {
    pub value: f64,
    pub delta: f64,
    pub gamma: f64,
}

#[derive(Debug, Clone)]
pub struct FdSolution {
    grid: LogSpotGrid,
    values: Array2<f64>,
    dt: f64,
    completed_steps: usize,
    requested_steps: usize,
}

impl FdSolution {
    pub fn grid(&self) -> &LogSpotGrid {
        &self.grid
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn completed_steps(&self) -> usize {
        self.completed_steps
    }

    pub fn requested_steps(&self) -> usize {
        self.requested_steps
    }

    pub fn is_complete(&self) -> bool {
        self.completed_steps == self.requested_steps
    }

    pub fn layer(&self, step: usize) -> ArrayView1<'_, f64> {
        self.values.row(step.min(self.completed_steps))
    }

    /// Value, delta and gamma at `spot` on layer `step`.
    ///
    /// A quadratic in `x` through the three nodes around `ln spot` gives
    /// `V_x` and `V_xx`; then `Δ = V_x / S` and `Γ = (V_xx − V_x) / S²`.
    pub fn readout(&self, step: usize, spot: f64) -> SpotReadout {
        let v = self.layer(step);
        let i = self.grid.nearest_interior(spot);
        let dx = self.grid.dx();
        let h = spot.ln() - self.grid.x()[i];

        let v_x = (v[i + 1] - v[i - 1]) / (2.0 * dx);
        let v_xx = (v[i + 1] - 2.0 * v[i] + v[i - 1]) / (dx * dx);
        let slope = v_x + v_xx * h;
        SpotReadout {
            value: v[i] + v_x * h + 0.5 * v_xx * h * h,
            delta: slope / spot,
            gamma: (v_xx - slope) / (spot * spot),
        }
    }

    /// Calendar theta at `spot`: one step less to expiry, per year.
    pub fn theta(&self, step: usize, spot: f64) -> f64 {
        let step = step.min(self.completed_steps);
        if step == 0 {
            return 0.0;
        }
        (self.readout(step - 1, spot).value - self.readout(step, spot).value) / self.dt
    }
}

/// Time step for `time_steps` on `grid`, rejecting an unstable explicit step.
fn checked_dt(
    problem: &FdProblem,
    grid: &LogSpotGrid,
    scheme: FdScheme,
    time_steps: usize,
) -> FxResult<f64> {
    if time_steps == 0 {
        return Err(FxError::invalid("time_steps", 0.0, "must be positive"));
    }
    let expiry = problem.contract.expiry;
    let dt = expiry / time_steps as f64;
    if scheme == FdScheme::Explicit {
        let dt_max = explicit_dt_max(problem.market.sigma, problem.market.rd, grid.dx());
        if dt > dt_max {
            return Err(FxError::GridInstability {
                dt,
                dt_max,
                min_time_steps: (expiry / dt_max).ceil() as usize,
            });
        }
    }
    Ok(dt)
}

/// Fails with [`FxError::GridInstability`] if `scheme` cannot step `problem`
/// with `time_steps` on a grid of `grid_size` nodes.
pub fn check_stability(
    problem: &FdProblem,
    scheme: FdScheme,
    time_steps: usize,
    grid_size: usize,
) -> FxResult<()> {
    let grid = LogSpotGrid::new(problem, grid_size)?;
    checked_dt(problem, &grid, scheme, time_steps).map(|_| ())
}

/// Steps one contract backward from expiry, one layer per call.
///
/// Several steppers advanced in turn stay on a common layer, which is what
/// a weighted set of contracts needs when the run is cut short.
#[derive(Debug, Clone)]
pub struct ThetaStepper {
    problem: FdProblem,
    scheme: FdScheme,
    grid: LogSpotGrid,
    dt: f64,
    a: f64,
    b: f64,
    c: f64,
    exercise: Vec<f64>,
    values: Array2<f64>,
    current: Vec<f64>,
    next: Vec<f64>,
    lower: Vec<f64>,
    diag: Vec<f64>,
    upper: Vec<f64>,
    rhs: Vec<f64>,
    c_star: Vec<f64>,
    d_star: Vec<f64>,
    solved: Vec<f64>,
    completed: usize,
    requested: usize,
}

impl ThetaStepper {
    pub fn new(
        problem: &FdProblem,
        scheme: FdScheme,
        time_steps: usize,
        grid_size: usize,
    ) -> FxResult<Self> {
        let grid = LogSpotGrid::new(problem, grid_size)?;
        let dt = checked_dt(problem, &grid, scheme, time_steps)?;
        let contract = &problem.contract;
        let m = &problem.market;
        let dx = grid.dx();

        let var = m.sigma * m.sigma;
        let mu = m.rd - m.rf - 0.5 * var;

        let nodes = grid.nodes();
        let last = nodes - 1;
        let spots = grid.spots();
        let exercise: Vec<f64> = spots
            .iter()
            .map(|&s| contract.payoff.terminal(s, contract.strike))
            .collect();

        let mut values = Array2::<f64>::zeros((time_steps + 1, nodes));
        let mut current = exercise.clone();
        current[0] = problem.boundary_value(contract.lower, spots[0], 0.0);
        current[last] = problem.boundary_value(contract.upper, spots[last], 0.0);
        values.row_mut(0).assign(&ArrayView1::from(&current[..]));

        let interior = nodes - 2;
        Ok(Self {
            problem: *problem,
            scheme,
            dt,
            a: 0.5 * var / (dx * dx) - 0.5 * mu / dx,
            b: -var / (dx * dx) - m.rd,
            c: 0.5 * var / (dx * dx) + 0.5 * mu / dx,
            exercise,
            values,
            current,
            next: vec![0.0; nodes],
            lower: vec![0.0; interior],
            diag: vec![0.0; interior],
            upper: vec![0.0; interior],
            rhs: vec![0.0; interior],
            c_star: vec![0.0; interior],
            d_star: vec![0.0; interior],
            solved: vec![0.0; interior],
            grid,
            completed: 0,
            requested: time_steps,
        })
    }

    pub fn completed_steps(&self) -> usize {
        self.completed
    }

    pub fn is_done(&self) -> bool {
        self.completed >= self.requested
    }

    /// Advance one time step; a no-op once every step has run.
    pub fn step(&mut self) -> FxResult<()> {
        if self.is_done() {
            return Ok(());
        }
        let n = self.completed;
        let contract = &self.problem.contract;
        let spots = self.grid.spots();
        let last = self.grid.nodes() - 1;
        let interior = last - 1;
        let (a, b, c, dt) = (self.a, self.b, self.c, self.dt);

        let theta = theta_for(self.scheme, n);
        let tau = (n + 1) as f64 * dt;
        let b_lo = self.problem.boundary_value(contract.lower, spots[0], tau);
        let b_hi = self.problem.boundary_value(contract.upper, spots[last], tau);
        let current = &self.current;

        if theta == 0.0 {
            for i in 1..last {
                self.next[i] =
                    current[i] + dt * (a * current[i - 1] + b * current[i] + c * current[i + 1]);
            }
        } else {
            let explicit = (1.0 - theta) * dt;
            let implicit = theta * dt;
            for j in 0..interior {
                let i = j + 1;
                self.lower[j] = -implicit * a;
                self.diag[j] = 1.0 - implicit * b;
                self.upper[j] = -implicit * c;
                self.rhs[j] = current[i]
                    + explicit * (a * current[i - 1] + b * current[i] + c * current[i + 1]);
            }
            self.rhs[0] += implicit * a * b_lo;
            self.rhs[interior - 1] += implicit * c * b_hi;
            solve_tridiagonal_inplace(
                &self.lower,
                &self.diag,
                &self.upper,
                &self.rhs,
                &mut self.c_star,
                &mut self.d_star,
                &mut self.solved,
            )?;
            self.next[1..last].copy_from_slice(&self.solved);
        }
        self.next[0] = b_lo;
        self.next[last] = b_hi;

        if contract.early_exercise {
            for (v, &e) in self.next.iter_mut().zip(&self.exercise) {
                *v = v.max(e);
            }
        }

        std::mem::swap(&mut self.current, &mut self.next);
        self.values
            .row_mut(n + 1)
            .assign(&ArrayView1::from(&self.current[..]));
        self.completed = n + 1;
        Ok(())
    }

    /// The layers stepped so far.
    ///
    /// Fails with [`FxError::Cancelled`] if no step ran.
    pub fn finish(self) -> FxResult<FdSolution> {
        if self.completed == 0 {
            return Err(FxError::Cancelled {
                completed: 0,
                requested: self.requested,
            });
        }
        if self.current.iter().any(|v| !v.is_finite()) {
            return Err(FxError::NumericalInstability {
                method: "PDE".to_string(),
                reason: format!("non-finite grid values after {} steps", self.completed),
            });
        }
        Ok(FdSolution {
            grid: self.grid,
            values: self.values,
            dt: self.dt,
            completed_steps: self.completed,
            requested_steps: self.requested,
        })
    }
}

/// Solve `problem` backward from expiry.
///
/// The signal is polled before every time step. If it fires the solution
/// stops at the last finished layer; with no finished layer the call fails
/// with [`FxError::Cancelled`].
pub fn solve(
    problem: &FdProblem,
    scheme: FdScheme,
    time_steps: usize,
    grid_size: usize,
    cancel: &dyn CancellationSignal,
) -> FxResult<FdSolution> {
    let mut stepper = ThetaStepper::new(problem, scheme, time_steps, grid_size)?;
    while !stepper.is_done() && !cancel.is_cancelled() {
        stepper.step()?;
    }
    stepper.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::garman_kohlhagen::gk_price;
    use crate::instruments::OptionType;
    use crate::mc::cancel::{CancellationToken, NeverCancel};
    use crate::pde::grid::{FdContract, FdMarket, FdPayoff};

    fn problem(option_type: OptionType) -> FdProblem {
        FdProblem {
            contract: FdContract::european(FdPayoff::Vanilla(option_type), 1.1, 1.0),
            market: FdMarket {
                spot: 1.1,
                rd: 0.05,
                rf: 0.03,
                sigma: 0.1,
            },
        }
    }

    #[test]
    fn test_crank_nicolson_matches_closed_form() {
        for ot in [OptionType::Call, OptionType::Put] {
            let sol = solve(&problem(ot), FdScheme::CrankNicolson, 200, 400, &NeverCancel).unwrap();
            let v = sol.readout(sol.completed_steps(), 1.1).value;
            let exact = gk_price(ot, 1.1, 1.1, 0.05, 0.03, 0.1, 1.0);
            assert!((v - exact).abs() < 2e-4, "{:?}: {} vs {}", ot, v, exact);
        }
    }

    #[test]
    fn test_implicit_matches_closed_form() {
        let sol =
            solve(&problem(OptionType::Call), FdScheme::Implicit, 400, 400, &NeverCancel).unwrap();
        let v = sol.readout(400, 1.1).value;
        let exact = gk_price(OptionType::Call, 1.1, 1.1, 0.05, 0.03, 0.1, 1.0);
        assert!((v - exact).abs() < 5e-4);
    }

    #[test]
    fn test_explicit_rejects_large_step() {
        let err = solve(&problem(OptionType::Call), FdScheme::Explicit, 10, 400, &NeverCancel)
            .unwrap_err();
        match err {
            FxError::GridInstability {
                dt,
                dt_max,
                min_time_steps,
            } => {
                assert!(dt > dt_max);
                assert!(1.0 / min_time_steps as f64 <= dt_max);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_explicit_within_bound_is_accurate() {
        let sol =
            solve(&problem(OptionType::Put), FdScheme::Explicit, 2000, 101, &NeverCancel).unwrap();
        let v = sol.readout(2000, 1.1).value;
        let exact = gk_price(OptionType::Put, 1.1, 1.1, 0.05, 0.03, 0.1, 1.0);
        assert!((v - exact).abs() < 1e-3);
    }

    #[test]
    fn test_check_stability_matches_solve() {
        let p = problem(OptionType::Call);
        assert!(check_stability(&p, FdScheme::Explicit, 2000, 101).is_ok());
        assert!(matches!(
            check_stability(&p, FdScheme::Explicit, 10, 101),
            Err(FxError::GridInstability { .. })
        ));
        assert!(check_stability(&p, FdScheme::CrankNicolson, 10, 101).is_ok());
    }

    #[test]
    fn test_stepper_stops_where_asked() {
        let mut stepper =
            ThetaStepper::new(&problem(OptionType::Put), FdScheme::Implicit, 40, 101).unwrap();
        for _ in 0..15 {
            stepper.step().unwrap();
        }
        let sol = stepper.finish().unwrap();
        assert_eq!(sol.completed_steps(), 15);
        assert!(!sol.is_complete());
        let full =
            solve(&problem(OptionType::Put), FdScheme::Implicit, 40, 101, &NeverCancel).unwrap();
        assert_eq!(sol.layer(15), full.layer(15));
    }

    #[test]
    fn test_cancel_before_first_step() {
        let token = CancellationToken::new();
        token.cancel();
        let err =
            solve(&problem(OptionType::Call), FdScheme::Implicit, 50, 101, &token).unwrap_err();
        assert!(matches!(err, FxError::Cancelled { completed: 0, requested: 50 }));
    }
}
