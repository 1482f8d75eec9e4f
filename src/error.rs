// src/error.rs
use std::fmt;
use thiserror::Error;

/// Error taxonomy for the fx-pricer library
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FxError {
    /// Malformed or degenerate instrument, market or configuration input
    #[error("Invalid input '{parameter}' = {value}: {constraint}")]
    InvalidInput {
        parameter: String,
        value: f64,
        constraint: String,
    },

    /// Surface or curve query outside the supported domain
    #[error("Out of range: {axis} = {value} not in [{min}, {max}]")]
    OutOfRange {
        axis: String,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Volatility surface construction invariant violated
    #[error("Invalid volatility surface: {reason}")]
    InvalidSurface { reason: String },

    /// Root-finder or SABR fit did not converge
    #[error("Calibration failed{}: {reason}", fmt_current_error(.current_error))]
    Calibration {
        reason: String,
        current_error: Option<f64>,
    },

    /// Explicit finite-difference scheme violates its stability bound
    #[error(
        "Grid instability: dt = {dt:.6e} exceeds stable dt_max = {dt_max:.6e}; use at least {min_time_steps} time steps or an implicit scheme"
    )]
    GridInstability {
        dt: f64,
        dt_max: f64,
        min_time_steps: usize,
    },

    /// Requested method cannot value the instrument
    #[error("Unsupported operation '{operation}' in context: {context}")]
    UnsupportedOperation { operation: String, context: String },

    /// Non-finite or otherwise unusable numerical result
    #[error("Numerical instability in {method}: {reason}")]
    NumericalInstability { method: String, reason: String },

    /// Cancelled before any unit of work completed
    #[error("Valuation cancelled after {completed} of {requested} work units")]
    Cancelled { completed: usize, requested: usize },
}

fn fmt_current_error(current_error: &Option<f64>) -> String {
    match current_error {
        Some(err) => format!(" (current error: {:.6e})", err),
        None => String::new(),
    }
}

impl FxError {
    /// Whether the caller may retry with relaxed settings.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FxError::Calibration { .. } | FxError::GridInstability { .. }
        )
    }

    pub(crate) fn invalid(parameter: &str, value: f64, constraint: impl Into<String>) -> Self {
        FxError::InvalidInput {
            parameter: parameter.to_string(),
            value,
            constraint: constraint.into(),
        }
    }

    pub(crate) fn unsupported(operation: impl Into<String>, context: impl Into<String>) -> Self {
        FxError::UnsupportedOperation {
            operation: operation.into(),
            context: context.into(),
        }
    }
}

/// Result type alias for fx-pricer operations
pub type FxResult<T> = Result<T, FxError>;

/// Non-fatal signal that a result is numerically thin.
///
/// Attached to a [`crate::pricer::ValuationResult`] and logged; never returned as an error.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub enum PrecisionWarning {
    /// Fewer Monte Carlo paths than the recommended minimum
    ThinPathCount { paths: usize, minimum: usize },
    /// Barrier or touch monitoring grid too coarse for the instrument tenor
    CoarseBarrierMonitoring { time_steps: usize, minimum: usize },
}

impl fmt::Display for PrecisionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrecisionWarning::ThinPathCount { paths, minimum } => write!(
                f,
                "only {} Monte Carlo paths (recommended minimum {}); estimate is noisy",
                paths, minimum
            ),
            PrecisionWarning::CoarseBarrierMonitoring {
                time_steps,
                minimum,
            } => write!(
                f,
                "{} monitoring steps is coarse for this tenor (recommended minimum {}); discrete-monitoring bias is large",
                time_steps, minimum
            ),
        }
    }
}

/// Validation utilities
pub mod validation {
    use super::{FxError, FxResult};

    /// Validate that a parameter is positive and finite
    pub fn validate_positive(name: &str, value: f64) -> FxResult<()> {
        if !(value > 0.0) || !value.is_finite() {
            Err(FxError::invalid(name, value, "must be positive (> 0) and finite"))
        } else {
            Ok(())
        }
    }

    /// Validate that a parameter is non-negative and finite
    pub fn validate_non_negative(name: &str, value: f64) -> FxResult<()> {
        if !(value >= 0.0) || !value.is_finite() {
            Err(FxError::invalid(name, value, "must be non-negative (≥ 0) and finite"))
        } else {
            Ok(())
        }
    }

    /// Validate that a parameter is within a closed range
    pub fn validate_range(name: &str, value: f64, min: f64, max: f64) -> FxResult<()> {
        if !(value >= min && value <= max) {
            Err(FxError::invalid(
                name,
                value,
                format!("must be in range [{}, {}]", min, max),
            ))
        } else {
            Ok(())
        }
    }

    /// Validate that a value is finite and not NaN
    pub fn validate_finite(name: &str, value: f64) -> FxResult<()> {
        if !value.is_finite() {
            Err(FxError::invalid(
                name,
                value,
                "must be finite (not NaN or infinite)",
            ))
        } else {
            Ok(())
        }
    }

    /// Validate an integer count against a lower bound
    pub fn validate_count(name: &str, value: usize, min: usize) -> FxResult<()> {
        if value < min {
            Err(FxError::invalid(
                name,
                value as f64,
                format!("must be at least {}", min),
            ))
        } else {
            Ok(())
        }
    }
}
