//! Implied volatility and surface calibration.

pub mod implied_vol;
pub mod surface_builder;

pub use implied_vol::{implied_vol, ImpliedVolSolver, QuoteInputs};
pub use surface_builder::{
    calibrate_surface, calibrate_surface_with_report, CalibrationReport, NodeFailure, PriceQuote,
    QuoteGrid,
};
