//! Currency pair conventions.
//!
//! A pair `BASE/QUOTE` quotes how many units of QUOTE buy one unit of BASE.
//! For option pricing the base is the foreign currency and the quote the
//! domestic one: EUR/USD at 1.10 means one EUR costs 1.10 USD, premiums are
//! paid in USD and EUR rates play the role of a dividend yield.

use crate::error::{FxError, FxResult};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    base: String,
    quote: String,
}

impl CurrencyPair {
    pub fn new(base: &str, quote: &str) -> FxResult<Self> {
        let base = normalise_code(base)?;
        let quote = normalise_code(quote)?;
        if base == quote {
            return Err(FxError::invalid(
                "currency_pair",
                f64::NAN,
                format!("base and quote must differ, got {}/{}", base, quote),
            ));
        }
        Ok(Self { base, quote })
    }

    /// Parse `"EURUSD"`, `"EUR/USD"` or `"eur usd"`.
    pub fn parse(pair: &str) -> FxResult<Self> {
        let compact: String = pair
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .collect();
        if compact.len() != 6 {
            return Err(FxError::invalid(
                "currency_pair",
                compact.len() as f64,
                format!("'{}' is not a six-letter currency pair", pair),
            ));
        }
        Self::new(&compact[..3], &compact[3..])
    }

    /// Foreign currency (the asset being priced).
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Domestic currency (premium and discounting currency).
    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// Multiplier that converts a price difference into pips.
    pub fn pip_scale(&self) -> f64 {
        if self.quote == "JPY" {
            100.0
        } else {
            10_000.0
        }
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.base, self.quote)
    }
}

fn normalise_code(code: &str) -> FxResult<String> {
    let code = code.trim().to_ascii_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(FxError::invalid(
            "currency_code",
            code.len() as f64,
            format!("'{}' is not a three-letter ISO code", code),
        ));
    }
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pair_formats() {
        let a = CurrencyPair::parse("EURUSD").unwrap();
        let b = CurrencyPair::parse("eur/usd").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.base(), "EUR");
        assert_eq!(a.quote(), "USD");
        assert_eq!(a.to_string(), "EURUSD");
    }

    #[test]
    fn test_pip_scale() {
        assert_eq!(CurrencyPair::parse("USDJPY").unwrap().pip_scale(), 100.0);
        assert_eq!(CurrencyPair::parse("GBPUSD").unwrap().pip_scale(), 10_000.0);
    }

    #[test]
    fn test_rejects_malformed_pairs() {
        assert!(CurrencyPair::parse("EURUS").is_err());
        assert!(CurrencyPair::parse("USDUSD").is_err());
    }
}
