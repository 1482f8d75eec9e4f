//! # fx-pricer: FX option valuation and risk
//!
//! Prices FX options on a currency pair against a market snapshot (spot,
//! domestic and foreign zero curves, implied volatility surface) and
//! reports premium and Greeks.
//!
//! ## Key Features
//!
//! - **Three engines**: Garman–Kohlhagen closed forms, parallel Monte Carlo
//!   and a Crank–Nicolson finite-difference solver behind one [`Pricer`] trait
//! - **Instruments**: European and American vanillas, knock-in/knock-out
//!   barriers with rebates, at-expiry and touch digitals
//! - **Volatility**: tenor/strike surfaces with linear, cubic-spline or SABR
//!   smiles and total-variance interpolation in tenor
//! - **Calibration**: implied-vol inversion and surface rebuilds from premium grids
//! - **Reproducibility**: Monte Carlo results are identical for any thread count
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::Utc;
//! use fx_pricer::{
//!     price, CurrencyPair, Instrument, MarketDataSnapshot, OptionTerms, OptionType,
//!     PricingModelConfig, VolatilitySurface, ZeroCurve,
//! };
//!
//! let pair = CurrencyPair::parse("EURUSD").unwrap();
//! let market = MarketDataSnapshot::new(
//!     Utc::now(),
//!     pair.clone(),
//!     1.10,
//!     ZeroCurve::flat(0.05).unwrap(),
//!     ZeroCurve::flat(0.03).unwrap(),
//!     VolatilitySurface::flat(0.10, 1.10).unwrap(),
//! )
//! .unwrap();
//!
//! let call = Instrument::european(
//!     OptionTerms::new(pair, OptionType::Call, 1.10, 1.0, 1_000_000.0).unwrap(),
//! )
//! .unwrap();
//! let config = PricingModelConfig::for_instrument(&call);
//! let result = price(&call, &market, &config).unwrap();
//! println!("premium {:.2} USD, delta {:.0} EUR", result.price(), result.greeks().delta);
//! ```
//!
//! ## Conventions
//!
//! Spot is quoted as domestic (quote) currency per unit of foreign (base)
//! currency. Rates are continuously compounded zero rates, times are ACT/365F
//! year fractions and prices are in domestic currency.

pub mod analytics;
pub mod calibration;
pub mod config;
pub mod error;
pub mod instruments;
pub mod market;
pub mod math_utils;
pub mod mc;
pub mod models;
pub mod output;
pub mod pde;
pub mod pricer;
pub mod rng;
pub mod vol;

pub use calibration::{
    calibrate_surface, calibrate_surface_with_report, implied_vol, PriceQuote, QuoteGrid,
};
pub use config::{FdScheme, GreeksConfig, PricingMethod, PricingModelConfig, VolDynamics};
pub use error::{FxError, FxResult, PrecisionWarning};
pub use instruments::{
    BarrierKind, DigitalObservation, DigitalPayout, ExerciseStyle, Instrument, NotionalCurrency,
    OptionTerms, OptionType,
};
pub use market::{parse_tenor, CurrencyPair, MarketDataSnapshot, ZeroCurve};
pub use mc::cancel::{CancellationSignal, CancellationToken, NeverCancel};
pub use pricer::{
    price, price_with_cancellation, Completion, ConfidenceInterval, Greeks, Pricer, PricerSelector,
    TradeDirection, ValuationResult,
};
pub use vol::{DeltaQuote, Extrapolation, InterpolationMethod, SmileSlice, VolatilitySurface};
