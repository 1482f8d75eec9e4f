//! Market data: currency pairs, zero curves and the valuation snapshot.

pub mod currency;
pub mod curve;
pub mod snapshot;

pub use currency::CurrencyPair;
pub use curve::{parse_tenor, ZeroCurve};
pub use snapshot::MarketDataSnapshot;
