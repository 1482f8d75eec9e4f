// tests/analytic_test.rs
use approx::assert_abs_diff_eq;
use chrono::{TimeZone, Utc};
use fx_pricer::{
    price, CurrencyPair, FxError, Instrument, MarketDataSnapshot, NotionalCurrency, OptionTerms,
    OptionType, PricingMethod, PricingModelConfig, TradeDirection, VolatilitySurface, ZeroCurve,
};

fn market() -> MarketDataSnapshot {
    MarketDataSnapshot::new(
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap(),
        CurrencyPair::parse("EURUSD").unwrap(),
        1.1,
        ZeroCurve::flat(0.05).unwrap(),
        ZeroCurve::flat(0.03).unwrap(),
        VolatilitySurface::flat(0.10, 1.1).unwrap(),
    )
    .unwrap()
}

fn terms(option_type: OptionType, strike: f64, expiry: f64, notional: f64) -> OptionTerms {
    OptionTerms::new(
        CurrencyPair::parse("EURUSD").unwrap(),
        option_type,
        strike,
        expiry,
        notional,
    )
    .unwrap()
}

#[test]
fn test_reference_call_price_and_greeks() {
    let call = Instrument::european(terms(OptionType::Call, 1.1, 1.0, 1.0)).unwrap();
    let result = price(&call, &market(), &PricingModelConfig::default()).unwrap();
    let g = result.greeks();

    println!("GK call: {} delta {}", result.price(), g.delta);
    assert_eq!(result.method(), PricingMethod::Analytic);
    assert_abs_diff_eq!(result.price(), 0.053555770633715305, epsilon = 1e-6);
    assert_abs_diff_eq!(g.delta, 0.5810118796662318, epsilon = 1e-6);
    assert_abs_diff_eq!(g.gamma, 3.4112758810630717, epsilon = 1e-6);
    assert_abs_diff_eq!(g.vega, 0.4127643816086317, epsilon = 1e-6);
    assert_abs_diff_eq!(g.theta, -0.03074269190140293, epsilon = 1e-6);
    assert_abs_diff_eq!(g.rho_domestic, 0.5855572969991397, epsilon = 1e-6);
    assert_abs_diff_eq!(g.rho_foreign, -0.639113067632855, epsilon = 1e-6);
    assert!(result.confidence_interval().is_none());
    assert!(result.is_complete());
}

#[test]
fn test_put_call_parity() {
    let m = market();
    for &k in &[0.9, 1.0, 1.1, 1.25, 1.4] {
        for &t in &[0.1, 0.5, 2.0] {
            let call = Instrument::european(terms(OptionType::Call, k, t, 1.0)).unwrap();
            let put = Instrument::european(terms(OptionType::Put, k, t, 1.0)).unwrap();
            let c = price(&call, &m, &PricingModelConfig::default()).unwrap().price();
            let p = price(&put, &m, &PricingModelConfig::default()).unwrap().price();
            let parity = 1.1 * (-0.03 * t).exp() - k * (-0.05 * t).exp();
            assert!(
                (c - p - parity).abs() < 1e-12,
                "parity broken at K={} T={}: {}",
                k,
                t,
                c - p - parity
            );
        }
    }
}

#[test]
fn test_expiry_pays_intrinsic() {
    let call = Instrument::european(terms(OptionType::Call, 1.0, 0.0, 1.0)).unwrap();
    let result = price(&call, &market(), &PricingModelConfig::default()).unwrap();
    assert_abs_diff_eq!(result.price(), 0.1, epsilon = 1e-15);
    assert_eq!(result.greeks().delta, 1.0);
}

#[test]
fn test_notional_scaling_and_conventions() {
    let m = market();
    let unit = Instrument::european(terms(OptionType::Call, 1.1, 1.0, 1.0)).unwrap();
    let big = Instrument::european(terms(OptionType::Call, 1.1, 1.0, 1_000_000.0)).unwrap();
    let cfg = PricingModelConfig::default();
    let u = price(&unit, &m, &cfg).unwrap();
    let b = price(&big, &m, &cfg).unwrap();

    assert_abs_diff_eq!(b.price(), 1e6 * u.price(), epsilon = 1e-6);
    assert_abs_diff_eq!(b.unit_price(), u.price(), epsilon = 1e-15);
    assert_abs_diff_eq!(b.premium_pips(), u.price() * 10_000.0, epsilon = 1e-9);
    assert_abs_diff_eq!(b.premium_pct(), 100.0 * u.price() / 1.1, epsilon = 1e-9);
    assert_abs_diff_eq!(
        b.delta_hedge_notional(TradeDirection::ClientBuys),
        -b.delta_hedge_notional(TradeDirection::ClientSells),
        epsilon = 1e-9
    );

    // 1.1M USD notional is 1M EUR at spot
    let usd = Instrument::european(
        terms(OptionType::Call, 1.1, 1.0, 1_100_000.0)
            .with_notional_currency(NotionalCurrency::Domestic),
    )
    .unwrap();
    assert_abs_diff_eq!(price(&usd, &m, &cfg).unwrap().price(), b.price(), epsilon = 1e-6);
}

#[test]
fn test_analytic_rejects_american() {
    let am = Instrument::american(terms(OptionType::Put, 1.1, 1.0, 1.0)).unwrap();
    let cfg = PricingModelConfig::default().with_method(PricingMethod::Analytic);
    let err = price(&am, &market(), &cfg).unwrap_err();
    assert!(matches!(err, FxError::UnsupportedOperation { .. }), "got {:?}", err);
}

#[test]
fn test_pair_mismatch_rejected() {
    let gbp = OptionTerms::new(
        CurrencyPair::parse("GBPUSD").unwrap(),
        OptionType::Call,
        1.3,
        1.0,
        1.0,
    )
    .unwrap();
    let instrument = Instrument::european(gbp).unwrap();
    let err = price(&instrument, &market(), &PricingModelConfig::default()).unwrap_err();
    assert!(matches!(err, FxError::InvalidInput { .. }));
}

#[test]
fn test_invalid_terms_fail_fast() {
    let pair = CurrencyPair::parse("EURUSD").unwrap();
    assert!(OptionTerms::new(pair.clone(), OptionType::Call, -1.0, 1.0, 1.0).is_err());
    assert!(OptionTerms::new(pair.clone(), OptionType::Call, 1.1, -0.5, 1.0).is_err());
    assert!(OptionTerms::new(pair, OptionType::Call, 1.1, 1.0, 0.0).is_err());
}
