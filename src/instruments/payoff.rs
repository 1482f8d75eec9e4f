//! Terminal payoffs and deep in/out-of-the-money asymptotes.
//!
//! Values are per unit of foreign notional, in domestic currency.

use super::{DigitalPayout, OptionType};

#[inline]
pub fn intrinsic(option_type: OptionType, spot: f64, strike: f64) -> f64 {
    match option_type {
        OptionType::Call => (spot - strike).max(0.0),
        OptionType::Put => (strike - spot).max(0.0),
    }
}

/// Whether `spot` finishes in the money for an at-expiry digital.
#[inline]
pub fn digital_in_the_money(option_type: OptionType, spot: f64, strike: f64) -> bool {
    match option_type {
        OptionType::Call => spot > strike,
        OptionType::Put => spot < strike,
    }
}

#[inline]
pub fn digital_payoff(
    option_type: OptionType,
    payout: DigitalPayout,
    spot: f64,
    strike: f64,
) -> f64 {
    if !digital_in_the_money(option_type, spot, strike) {
        return 0.0;
    }
    match payout {
        DigitalPayout::CashOrNothing { amount } => amount,
        DigitalPayout::AssetOrNothing => spot,
    }
}

/// Value of a European vanilla far from the strike, where the optionality is worthless:
/// the discounted forward intrinsic `max(±(S·DF_f − K·DF_d), 0)`.
#[inline]
pub fn vanilla_asymptote(
    option_type: OptionType,
    spot: f64,
    strike: f64,
    df_domestic: f64,
    df_foreign: f64,
) -> f64 {
    (option_type.sign() * (spot * df_foreign - strike * df_domestic)).max(0.0)
}

/// Far-field value of an at-expiry digital: its payout discounted if in the money, zero otherwise.
#[inline]
pub fn digital_asymptote(
    option_type: OptionType,
    payout: DigitalPayout,
    spot: f64,
    strike: f64,
    df_domestic: f64,
    df_foreign: f64,
) -> f64 {
    if !digital_in_the_money(option_type, spot, strike) {
        return 0.0;
    }
    match payout {
        DigitalPayout::CashOrNothing { amount } => amount * df_domestic,
        DigitalPayout::AssetOrNothing => spot * df_foreign,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intrinsic() {
        assert_eq!(intrinsic(OptionType::Call, 1.2, 1.1), 1.2 - 1.1);
        assert_eq!(intrinsic(OptionType::Put, 1.2, 1.1), 0.0);
    }

    #[test]
    fn test_digital_payoff() {
        let cash = DigitalPayout::CashOrNothing { amount: 2.0 };
        assert_eq!(digital_payoff(OptionType::Call, cash, 1.2, 1.1), 2.0);
        assert_eq!(digital_payoff(OptionType::Put, cash, 1.2, 1.1), 0.0);
        assert_eq!(
            digital_payoff(OptionType::Call, DigitalPayout::AssetOrNothing, 1.2, 1.1),
            1.2
        );
    }

    #[test]
    fn test_vanilla_asymptote_is_discounted_forward_intrinsic() {
        let v = vanilla_asymptote(OptionType::Call, 3.0, 1.0, 0.95, 0.97);
        assert!((v - (3.0 * 0.97 - 0.95)).abs() < 1e-14);
        assert_eq!(vanilla_asymptote(OptionType::Call, 0.1, 1.0, 0.95, 0.97), 0.0);
    }
}
