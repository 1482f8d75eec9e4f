//! Spot dynamics simulated by the Monte Carlo engine.

pub mod gbm;
pub mod local_vol;
pub mod model;

pub use gbm::FxGbm;
pub use local_vol::LocalVolGrid;
pub use model::SpotDynamics;
