// src/analytics/garman_kohlhagen.rs
//! Garman–Kohlhagen closed forms for European FX options
//!
//! # Mathematical Foundation
//!
//! Under the risk-neutral measure of the domestic currency the spot rate
//! follows a GBM whose drift is the rate differential:
//! ```text
//! dS_t = (r_d - r_f) S_t dt + σ S_t dW_t
//! ```
//!
//! The foreign rate plays the role of a continuous dividend yield, so
//! ```text
//! d₁ = [ln(S/K) + (r_d - r_f + σ²/2)T] / (σ√T)
//! d₂ = d₁ - σ√T
//! ```
//!
//! All functions here assume validated inputs (`S, K, σ, T > 0`) and return
//! values per unit of foreign notional, in domestic currency.

use crate::error::{FxError, FxResult};
use crate::instruments::{DigitalPayout, OptionType};
use crate::math_utils::{norm_cdf, norm_inv, norm_pdf};
use crate::pricer::result::Greeks;

/// Outright forward by covered interest parity
///
/// ```text
/// F = S e^((r_d - r_f)T)
/// ```
pub fn gk_forward(s: f64, rd: f64, rf: f64, t: f64) -> f64 {
    s * ((rd - rf) * t).exp()
}

pub fn gk_d1_d2(s: f64, k: f64, rd: f64, rf: f64, sigma: f64, t: f64) -> (f64, f64) {
    let sqrt_t = t.sqrt();
    let d1 = ((s / k).ln() + (rd - rf + 0.5 * sigma * sigma) * t) / (sigma * sqrt_t);
    (d1, d1 - sigma * sqrt_t)
}

/// Garman–Kohlhagen price
///
/// # Formula
/// ```text
/// C = S e^(-r_f T) Φ(d₁) - K e^(-r_d T) Φ(d₂)
/// P = K e^(-r_d T) Φ(-d₂) - S e^(-r_f T) Φ(-d₁)
/// ```
pub fn gk_price(
    option_type: OptionType,
    s: f64,
    k: f64,
    rd: f64,
    rf: f64,
    sigma: f64,
    t: f64,
) -> f64 {
    let (d1, d2) = gk_d1_d2(s, k, rd, rf, sigma, t);
    let w = option_type.sign();
    let df_d = (-rd * t).exp();
    let df_f = (-rf * t).exp();
    w * (s * df_f * norm_cdf(w * d1) - k * df_d * norm_cdf(w * d2))
}

/// Spot delta ∂V/∂S
///
/// ```text
/// Δ_call = e^(-r_f T) Φ(d₁),  Δ_put = -e^(-r_f T) Φ(-d₁)
/// ```
pub fn gk_delta(
    option_type: OptionType,
    s: f64,
    k: f64,
    rd: f64,
    rf: f64,
    sigma: f64,
    t: f64,
) -> f64 {
    let (d1, _) = gk_d1_d2(s, k, rd, rf, sigma, t);
    let w = option_type.sign();
    w * (-rf * t).exp() * norm_cdf(w * d1)
}

/// Gamma ∂²V/∂S², identical for calls and puts
///
/// ```text
/// Γ = e^(-r_f T) φ(d₁) / (S σ √T)
/// ```
pub fn gk_gamma(s: f64, k: f64, rd: f64, rf: f64, sigma: f64, t: f64) -> f64 {
    let (d1, _) = gk_d1_d2(s, k, rd, rf, sigma, t);
    (-rf * t).exp() * norm_pdf(d1) / (s * sigma * t.sqrt())
}

/// Vega ∂V/∂σ, identical for calls and puts
///
/// ```text
/// ν = S e^(-r_f T) φ(d₁) √T
/// ```
pub fn gk_vega(s: f64, k: f64, rd: f64, rf: f64, sigma: f64, t: f64) -> f64 {
    let (d1, _) = gk_d1_d2(s, k, rd, rf, sigma, t);
    s * (-rf * t).exp() * norm_pdf(d1) * t.sqrt()
}

/// Theta: change in value per year of calendar time (`-∂V/∂T`)
///
/// ```text
/// Θ_call = -S e^(-r_f T) φ(d₁) σ/(2√T) + r_f S e^(-r_f T) Φ(d₁) - r_d K e^(-r_d T) Φ(d₂)
/// ```
pub fn gk_theta(
    option_type: OptionType,
    s: f64,
    k: f64,
    rd: f64,
    rf: f64,
    sigma: f64,
    t: f64,
) -> f64 {
    let (d1, d2) = gk_d1_d2(s, k, rd, rf, sigma, t);
    let w = option_type.sign();
    let df_d = (-rd * t).exp();
    let df_f = (-rf * t).exp();
    -s * df_f * norm_pdf(d1) * sigma / (2.0 * t.sqrt())
        + w * (rf * s * df_f * norm_cdf(w * d1) - rd * k * df_d * norm_cdf(w * d2))
}

/// Domestic rho ∂V/∂r_d
pub fn gk_rho_domestic(
    option_type: OptionType,
    s: f64,
    k: f64,
    rd: f64,
    rf: f64,
    sigma: f64,
    t: f64,
) -> f64 {
    let (_, d2) = gk_d1_d2(s, k, rd, rf, sigma, t);
    let w = option_type.sign();
    w * k * t * (-rd * t).exp() * norm_cdf(w * d2)
}

/// Foreign rho ∂V/∂r_f
pub fn gk_rho_foreign(
    option_type: OptionType,
    s: f64,
    k: f64,
    rd: f64,
    rf: f64,
    sigma: f64,
    t: f64,
) -> f64 {
    let (d1, _) = gk_d1_d2(s, k, rd, rf, sigma, t);
    let w = option_type.sign();
    -w * s * t * (-rf * t).exp() * norm_cdf(w * d1)
}

pub fn gk_greeks(
    option_type: OptionType,
    s: f64,
    k: f64,
    rd: f64,
    rf: f64,
    sigma: f64,
    t: f64,
) -> Greeks {
    Greeks {
        delta: gk_delta(option_type, s, k, rd, rf, sigma, t),
        gamma: gk_gamma(s, k, rd, rf, sigma, t),
        vega: gk_vega(s, k, rd, rf, sigma, t),
        theta: gk_theta(option_type, s, k, rd, rf, sigma, t),
        rho_domestic: gk_rho_domestic(option_type, s, k, rd, rf, sigma, t),
        rho_foreign: gk_rho_foreign(option_type, s, k, rd, rf, sigma, t),
    }
}

/// Strike whose spot delta equals `delta` at volatility `sigma`
///
/// Inverts `Δ_call = e^(-r_f T) Φ(d₁)` (puts: `Δ = -e^(-r_f T) Φ(-d₁)`):
/// ```text
/// K = S exp(-d₁ σ√T + (r_d - r_f + σ²/2)T)
/// ```
/// `delta` carries the sign of the option: in `(0, e^(-r_f T))` for calls and
/// `(-e^(-r_f T), 0)` for puts.
pub fn strike_from_delta(
    option_type: OptionType,
    s: f64,
    delta: f64,
    rd: f64,
    rf: f64,
    sigma: f64,
    t: f64,
) -> FxResult<f64> {
    let df_f = (-rf * t).exp();
    let n_d1 = match option_type {
        OptionType::Call => delta / df_f,
        OptionType::Put => 1.0 + delta / df_f,
    };
    if !(n_d1 > 0.0 && n_d1 < 1.0) {
        return Err(FxError::invalid(
            "delta",
            delta,
            format!(
                "spot delta of a {:?} must lie strictly inside the attainable range (|Δ| < {:.6})",
                option_type, df_f
            ),
        ));
    }
    let d1 = norm_inv(n_d1)?;
    let sqrt_t = t.sqrt();
    Ok(s * (-d1 * sigma * sqrt_t + (rd - rf + 0.5 * sigma * sigma) * t).exp())
}

/// European digital price
///
/// ```text
/// cash:  V = A e^(-r_d T) Φ(w d₂)
/// asset: V = S e^(-r_f T) Φ(w d₁)
/// ```
/// with `w = +1` for calls (pays above strike), `-1` for puts.
pub fn digital_price(
    option_type: OptionType,
    payout: DigitalPayout,
    s: f64,
    k: f64,
    rd: f64,
    rf: f64,
    sigma: f64,
    t: f64,
) -> f64 {
    let (d1, d2) = gk_d1_d2(s, k, rd, rf, sigma, t);
    let w = option_type.sign();
    match payout {
        DigitalPayout::CashOrNothing { amount } => amount * (-rd * t).exp() * norm_cdf(w * d2),
        DigitalPayout::AssetOrNothing => s * (-rf * t).exp() * norm_cdf(w * d1),
    }
}

/// Analytic Greeks of a European digital
///
/// Uses `∂d/∂S = 1/(Sσ√T)`, `∂d₁/∂σ = -d₂/σ`, `∂d₂/∂σ = -d₁/σ`,
/// `∂d/∂r_d = √T/σ = -∂d/∂r_f` and `∂d/∂T = μ/(σ√T) - d/(2T)` with
/// `μ = r_d - r_f ± σ²/2`.
pub fn digital_greeks(
    option_type: OptionType,
    payout: DigitalPayout,
    s: f64,
    k: f64,
    rd: f64,
    rf: f64,
    sigma: f64,
    t: f64,
) -> Greeks {
    let (d1, d2) = gk_d1_d2(s, k, rd, rf, sigma, t);
    let w = option_type.sign();
    let sqrt_t = t.sqrt();
    let sig_sqrt_t = sigma * sqrt_t;
    let price = digital_price(option_type, payout, s, k, rd, rf, sigma, t);

    match payout {
        DigitalPayout::CashOrNothing { amount } => {
            // dV/dd₂ up to the sign w
            let a = amount * (-rd * t).exp() * w * norm_pdf(d2);
            let mu = rd - rf - 0.5 * sigma * sigma;
            let dv_dt = -rd * price + a * (mu / sig_sqrt_t - d2 / (2.0 * t));
            Greeks {
                delta: a / (s * sig_sqrt_t),
                gamma: -a * d1 / (s * s * sigma * sigma * t),
                vega: -a * d1 / sigma,
                theta: -dv_dt,
                rho_domestic: -t * price + a * sqrt_t / sigma,
                rho_foreign: -a * sqrt_t / sigma,
            }
        }
        DigitalPayout::AssetOrNothing => {
            let df_f = (-rf * t).exp();
            let a = s * df_f * w * norm_pdf(d1);
            let mu = rd - rf + 0.5 * sigma * sigma;
            let dv_dt = -rf * price + a * (mu / sig_sqrt_t - d1 / (2.0 * t));
            Greeks {
                delta: df_f * norm_cdf(w * d1) + a / (s * sig_sqrt_t),
                gamma: -a * d2 / (s * s * sigma * sigma * t),
                vega: -a * d2 / sigma,
                theta: -dv_dt,
                rho_domestic: a * sqrt_t / sigma,
                rho_foreign: -t * price - a * sqrt_t / sigma,
            }
        }
    }
}
