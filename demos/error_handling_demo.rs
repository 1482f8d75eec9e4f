// demos/error_handling_demo.rs
use chrono::Utc;
use fx_pricer::{
    implied_vol, price, price_with_cancellation, CancellationToken, CurrencyPair, Extrapolation,
    FdScheme, FxError, Instrument, InterpolationMethod, MarketDataSnapshot, OptionTerms,
    OptionType, PricingMethod, PricingModelConfig, SmileSlice, VolatilitySurface, ZeroCurve,
};
use tracing_subscriber::EnvFilter;

fn report(label: &str, outcome: Result<String, FxError>) {
    match outcome {
        Ok(value) => println!("   {:<44} ok: {}", label, value),
        Err(e) => println!(
            "   {:<44} ✓ {} ({})",
            label,
            e,
            if e.is_recoverable() { "recoverable" } else { "fatal" }
        ),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    println!("Error Handling Demo for fx-pricer");
    println!("=================================\n");

    let pair = CurrencyPair::parse("EURUSD").expect("valid pair");
    let market = MarketDataSnapshot::new(
        Utc::now(),
        pair.clone(),
        1.10,
        ZeroCurve::flat(0.05).expect("valid curve"),
        ZeroCurve::flat(0.03).expect("valid curve"),
        VolatilitySurface::flat(0.10, 1.10).expect("valid surface"),
    )
    .expect("valid market");
    let call_terms = OptionTerms::new(pair.clone(), OptionType::Call, 1.10, 1.0, 1e6).unwrap();
    let call = Instrument::european(call_terms).unwrap();

    println!("1. Invalid inputs");
    report(
        "negative strike",
        OptionTerms::new(pair.clone(), OptionType::Call, -1.0, 1.0, 1e6).map(|_| String::new()),
    );
    report("unknown currency pair", CurrencyPair::parse("EURO").map(|p| p.to_string()));
    report(
        "zero paths",
        PricingModelConfig::from_json_str(r#"{"paths": 0}"#).map(|c| format!("{:?}", c.paths)),
    );

    println!("\n2. Surface errors");
    report(
        "single-tenor surface",
        SmileSlice::new(0.5, 1.1, vec![(1.1, 0.1)])
            .and_then(|s| VolatilitySurface::new(vec![s], InterpolationMethod::Linear))
            .map(|_| String::new()),
    );
    let strict = market.with_surface(
        VolatilitySurface::flat(0.10, 1.10).unwrap().with_extrapolation(Extrapolation::Disallowed),
    );
    report("query past the last tenor", strict.volatility(45.0, 1.1).map(|v| v.to_string()));

    println!("\n3. Engine limits");
    let put_terms = OptionTerms::new(pair, OptionType::Put, 1.10, 1.0, 1e6).unwrap();
    let american = Instrument::american(put_terms).unwrap();
    report(
        "American on the analytic engine",
        price(
            &american,
            &market,
            &PricingModelConfig::default().with_method(PricingMethod::Analytic),
        )
        .map(|r| r.price().to_string()),
    );
    let explicit = PricingModelConfig {
        scheme: FdScheme::Explicit,
        ..PricingModelConfig::default().with_method(PricingMethod::Pde)
    };
    report(
        "explicit PDE at the default step count",
        price(&american, &market, &explicit).map(|r| r.price().to_string()),
    );

    println!("\n4. Calibration");
    report(
        "premium above no-arbitrage bound",
        implied_vol(OptionType::Call, 2.0, 1.1, 1.1, 0.05, 0.03, 1.0, 1e-8, 100)
            .map(|v| v.to_string()),
    );
    report(
        "iteration budget of 1",
        implied_vol(OptionType::Call, 0.06, 1.1, 1.1, 0.05, 0.03, 1.0, 1e-14, 1)
            .map(|v| v.to_string()),
    );

    println!("\n5. Precision warnings and cancellation");
    let thin = PricingModelConfig {
        paths: 500,
        ..PricingModelConfig::default().with_method(PricingMethod::MonteCarlo)
    };
    match price(&call, &market, &thin) {
        Ok(r) => println!(
            "   {:<44} price {:.2} with {} warning(s)",
            "500-path Monte Carlo",
            r.price(),
            r.warnings().len()
        ),
        Err(e) => println!("   500-path Monte Carlo failed: {}", e),
    }
    let token = CancellationToken::new();
    token.cancel();
    report(
        "cancelled before the first partition",
        price_with_cancellation(&call, &market, &thin, &token).map(|r| r.price().to_string()),
    );

    println!("\nError handling demo completed");
}
