//! Implied volatility: quoted smiles, SABR fits and the interpolated surface.

pub mod sabr;
pub mod smile;
pub mod surface;

pub use sabr::{fit_sabr, SabrParams};
pub use smile::{DeltaQuote, SmileSlice};
pub use surface::{Extrapolation, InterpolationMethod, SabrFallback, VolatilitySurface};
