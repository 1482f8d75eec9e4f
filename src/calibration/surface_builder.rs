// src/calibration/surface_builder.rs
//! Volatility surface from a grid of option premiums
//!
//! Every quote is inverted independently (a parallel map over nodes). A node
//! that fails with a recoverable error is retried once with a relaxed solver;
//! if it still fails it is reported and left out of its smile. The build only
//! fails when fewer than two tenors keep at least one node.

use super::implied_vol::{ImpliedVolSolver, QuoteInputs};
use crate::error::{FxError, FxResult};
use crate::instruments::OptionType;
use crate::market::MarketDataSnapshot;
use crate::vol::{InterpolationMethod, SmileSlice, VolatilitySurface};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Quoted premium per unit of foreign notional, in domestic currency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub tenor: f64,
    pub strike: f64,
    pub option_type: OptionType,
    pub price: f64,
}

impl PriceQuote {
    pub fn new(tenor: f64, strike: f64, option_type: OptionType, price: f64) -> Self {
        Self {
            tenor,
            strike,
            option_type,
            price,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteGrid {
    pub quotes: Vec<PriceQuote>,
    pub method: InterpolationMethod,
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl QuoteGrid {
    pub fn new(quotes: Vec<PriceQuote>) -> Self {
        Self {
            quotes,
            method: InterpolationMethod::Linear,
            tolerance: 1e-10,
            max_iterations: 100,
        }
    }

    pub fn with_method(mut self, method: InterpolationMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn push(&mut self, quote: PriceQuote) {
        self.quotes.push(quote);
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

/// A quote that could not be inverted.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeFailure {
    pub quote: PriceQuote,
    pub error: FxError,
}

#[derive(Debug, Clone)]
pub struct CalibrationReport {
    pub surface: VolatilitySurface,
    pub failures: Vec<NodeFailure>,
    /// Nodes that converged only on the relaxed retry
    pub retried: usize,
}

enum NodeOutcome {
    Solved { vol: f64, retried: bool },
    Failed(FxError),
}

fn solve_node(
    quote: &PriceQuote,
    market: &MarketDataSnapshot,
    solver: &ImpliedVolSolver,
) -> NodeOutcome {
    let inputs = QuoteInputs {
        option_type: quote.option_type,
        price: quote.price,
        spot: market.spot(),
        strike: quote.strike,
        rd: market.domestic_rate(quote.tenor),
        rf: market.foreign_rate(quote.tenor),
        expiry: quote.tenor,
    };
    match solver.solve(&inputs) {
        Ok(vol) => NodeOutcome::Solved { vol, retried: false },
        Err(e) if e.is_recoverable() => match solver.relaxed().solve(&inputs) {
            Ok(vol) => NodeOutcome::Solved { vol, retried: true },
            Err(e) => NodeOutcome::Failed(e),
        },
        Err(e) => NodeOutcome::Failed(e),
    }
}

/// Rebuild the surface, dropping nodes that fail.
pub fn calibrate_surface(
    grid: &QuoteGrid,
    market: &MarketDataSnapshot,
) -> FxResult<VolatilitySurface> {
    calibrate_surface_with_report(grid, market).map(|report| report.surface)
}

/// Rebuild the surface and report which nodes failed.
pub fn calibrate_surface_with_report(
    grid: &QuoteGrid,
    market: &MarketDataSnapshot,
) -> FxResult<CalibrationReport> {
    let solver = ImpliedVolSolver::new(grid.tolerance, grid.max_iterations);
    let outcomes: Vec<NodeOutcome> = grid
        .quotes
        .par_iter()
        .map(|q| solve_node(q, market, &solver))
        .collect();

    let mut nodes: Vec<(f64, f64, f64)> = Vec::with_capacity(outcomes.len());
    let mut failures = Vec::new();
    let mut retried = 0;
    for (quote, outcome) in grid.quotes.iter().zip(outcomes) {
        match outcome {
            NodeOutcome::Solved { vol, retried: r } => {
                retried += r as usize;
                nodes.push((quote.tenor, quote.strike, vol));
            }
            NodeOutcome::Failed(error) => {
                warn!(
                    tenor = quote.tenor,
                    strike = quote.strike,
                    %error,
                    "calibration node failed"
                );
                failures.push(NodeFailure {
                    quote: *quote,
                    error,
                });
            }
        }
    }

    nodes.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
    let mut slices = Vec::new();
    let mut start = 0;
    while start < nodes.len() {
        let tenor = nodes[start].0;
        let end = start + nodes[start..].iter().take_while(|n| n.0 == tenor).count();
        let mut quotes: Vec<(f64, f64)> = Vec::with_capacity(end - start);
        for &(_, k, v) in &nodes[start..end] {
            // Call and put at one strike: keep the first
            if quotes.last().map_or(true, |&(last, _)| last != k) {
                quotes.push((k, v));
            }
        }
        slices.push(SmileSlice::new(tenor, market.forward(tenor), quotes)?);
        start = end;
    }

    if slices.len() < 2 {
        return Err(FxError::Calibration {
            reason: format!(
                "only {} tenor(s) calibrated out of {} quotes ({} failed nodes)",
                slices.len(),
                grid.len(),
                failures.len()
            ),
            current_error: None,
        });
    }

    let surface = VolatilitySurface::new(slices, grid.method)?;
    info!(
        quotes = grid.len(),
        tenors = surface.slices().len(),
        failed = failures.len(),
        retried,
        "volatility surface calibrated"
    );
    Ok(CalibrationReport {
        surface,
        failures,
        retried,
    })
}
