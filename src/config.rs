// src/config.rs
//! Pricing configuration
//!
//! [`PricingModelConfig`] carries every numerical knob of the three engines.
//! Unset fields fall back to defaults, so a JSON file only needs the keys it
//! changes:
//! ```json
//! { "method": "MonteCarlo", "paths": 200000, "seed": 7, "greeks": "DELTA | VEGA" }
//! ```

use crate::error::{validation::*, FxError, FxResult};
use crate::instruments::{DigitalObservation, Instrument};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PricingMethod {
    Analytic,
    MonteCarlo,
    Pde,
}

/// Time-stepping scheme of the finite-difference engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FdScheme {
    /// Forward Euler; conditionally stable
    Explicit,
    /// Backward Euler
    Implicit,
    /// θ = 1/2 with two implicit start-up steps
    CrankNicolson,
}

/// Volatility used along Monte Carlo paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolDynamics {
    /// Surface volatility at the strike and expiry, held constant
    Constant,
    /// Dupire local volatility derived from the surface
    LocalVol,
}

bitflags! {
    /// Greeks requested from bump-and-reprice engines
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct GreeksConfig: u32 {
        const NONE = 0;
        const DELTA = 1 << 0;
        const GAMMA = 1 << 1;
        const VEGA = 1 << 2;
        const THETA = 1 << 3;
        const RHO_DOMESTIC = 1 << 4;
        const RHO_FOREIGN = 1 << 5;
        const ALL = Self::DELTA.bits()
            | Self::GAMMA.bits()
            | Self::VEGA.bits()
            | Self::THETA.bits()
            | Self::RHO_DOMESTIC.bits()
            | Self::RHO_FOREIGN.bits();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingModelConfig {
    /// `None` lets the selector pick per instrument
    pub method: Option<PricingMethod>,
    pub paths: usize,
    pub antithetic: bool,
    pub seed: u64,
    /// MC monitoring steps / PDE time steps
    pub time_steps: usize,
    /// PDE spot nodes
    pub grid_size: usize,
    /// Implied-vol price tolerance
    pub tolerance: f64,
    pub scheme: FdScheme,
    pub vol_dynamics: VolDynamics,
    pub greeks: GreeksConfig,
    /// Relative spot bump
    pub spot_bump: f64,
    /// Relative volatility bump
    pub vol_bump: f64,
    /// Absolute rate bump
    pub rate_bump: f64,
    pub max_iterations: usize,
    /// Worker threads for Monte Carlo; `None` uses every core
    pub threads: Option<usize>,
    /// Paths per reproducible MC partition
    pub partition_size: usize,
}

impl Default for PricingModelConfig {
    fn default() -> Self {
        PricingModelConfig {
            method: None,
            paths: 100_000,
            antithetic: true,
            seed: 42,
            time_steps: 200,
            grid_size: 400,
            tolerance: 1e-8,
            scheme: FdScheme::CrankNicolson,
            vol_dynamics: VolDynamics::Constant,
            greeks: GreeksConfig::ALL,
            spot_bump: 0.01,
            vol_bump: 0.01,
            rate_bump: 1e-4,
            max_iterations: 100,
            threads: None,
            partition_size: 4096,
        }
    }
}

impl PricingModelConfig {
    /// Defaults with the method chosen for the instrument variant.
    pub fn for_instrument(instrument: &Instrument) -> Self {
        Self {
            method: Some(default_method(instrument)),
            ..Self::default()
        }
    }

    pub fn with_method(mut self, method: PricingMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn validate(&self) -> FxResult<()> {
        validate_count("paths", self.paths, 1)?;
        validate_count("time_steps", self.time_steps, 1)?;
        validate_count("grid_size", self.grid_size, 3)?;
        validate_count("max_iterations", self.max_iterations, 1)?;
        validate_count("partition_size", self.partition_size, 1)?;
        validate_positive("tolerance", self.tolerance)?;
        validate_positive("spot_bump", self.spot_bump)?;
        validate_positive("vol_bump", self.vol_bump)?;
        validate_positive("rate_bump", self.rate_bump)?;
        if self.spot_bump >= 0.5 || self.vol_bump >= 0.5 {
            return Err(FxError::invalid(
                "relative_bump",
                self.spot_bump.max(self.vol_bump),
                "relative spot and vol bumps must be below 50%",
            ));
        }
        if let Some(threads) = self.threads {
            validate_count("threads", threads, 1)?;
        }
        Ok(())
    }

    pub fn thread_count(&self) -> usize {
        self.threads.unwrap_or_else(num_cpus::get).max(1)
    }

    pub fn from_json_str(json: &str) -> FxResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| {
            FxError::invalid("config_json", f64::NAN, format!("unparseable configuration: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> FxResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            FxError::invalid(
                "config_file",
                f64::NAN,
                format!("cannot read {}: {}", path.display(), e),
            )
        })?;
        Self::from_json_str(&text)
    }
}

/// Method used when the configuration leaves it open
pub fn default_method(instrument: &Instrument) -> PricingMethod {
    match instrument {
        Instrument::EuropeanVanilla(_) => PricingMethod::Analytic,
        Instrument::AmericanVanilla(_) | Instrument::Barrier(_) => PricingMethod::Pde,
        Instrument::Digital(d) => match d.observation {
            DigitalObservation::AtExpiry => PricingMethod::Analytic,
            DigitalObservation::OneTouch | DigitalObservation::NoTouch => PricingMethod::MonteCarlo,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruments::{BarrierKind, OptionTerms, OptionType};
    use crate::market::currency::CurrencyPair;

    fn terms() -> OptionTerms {
        OptionTerms::new(
            CurrencyPair::parse("EURUSD").unwrap(),
            OptionType::Call,
            1.1,
            1.0,
            1e6,
        )
        .unwrap()
    }

    #[test]
    fn test_default_is_valid() {
        assert!(PricingModelConfig::default().validate().is_ok());
    }

    #[test]
    fn test_per_instrument_defaults() {
        let euro = Instrument::european(terms()).unwrap();
        let amer = Instrument::american(terms()).unwrap();
        let barrier = Instrument::barrier(terms(), 1.3, BarrierKind::UpAndOut, 0.0).unwrap();
        assert_eq!(PricingModelConfig::for_instrument(&euro).method, Some(PricingMethod::Analytic));
        assert_eq!(PricingModelConfig::for_instrument(&amer).method, Some(PricingMethod::Pde));
        assert_eq!(PricingModelConfig::for_instrument(&barrier).method, Some(PricingMethod::Pde));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg = PricingModelConfig::from_json_str(
            r#"{ "method": "MonteCarlo", "paths": 5000, "greeks": "DELTA | VEGA" }"#,
        )
        .unwrap();
        assert_eq!(cfg.method, Some(PricingMethod::MonteCarlo));
        assert_eq!(cfg.paths, 5000);
        assert_eq!(cfg.greeks, GreeksConfig::DELTA | GreeksConfig::VEGA);
        assert_eq!(cfg.seed, PricingModelConfig::default().seed);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let cfg = PricingModelConfig {
            grid_size: 2,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
        assert!(PricingModelConfig::from_json_str(r#"{ "paths": 0 }"#).is_err());
        assert!(PricingModelConfig::from_json_str("not json").is_err());
    }
}
