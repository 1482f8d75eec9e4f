// demos/demo.rs
use chrono::Utc;
use fx_pricer::math_utils::Timer;
use fx_pricer::output;
use fx_pricer::{
    price, BarrierKind, CurrencyPair, DeltaQuote, DigitalObservation, DigitalPayout, Instrument,
    InterpolationMethod, MarketDataSnapshot, OptionTerms, OptionType, PricingMethod,
    PricingModelConfig, SmileSlice, ValuationResult, VolatilitySurface, ZeroCurve,
};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("Running fx-pricer demo\n");
    let market = build_market().expect("valid market data");
    let pair = market.pair().clone();
    let t = market.expiry_from("6M").expect("valid tenor");
    let k = market.forward(t);
    let notional = 10_000_000.0;
    let terms = |ot| OptionTerms::new(pair.clone(), ot, k, t, notional).expect("valid terms");

    let trades = vec![
        ("6M ATMF call", Instrument::european(terms(OptionType::Call)).unwrap()),
        ("6M ATMF American put", Instrument::american(terms(OptionType::Put)).unwrap()),
        (
            "6M up-and-out call 1.1500",
            Instrument::barrier(terms(OptionType::Call), 1.15, BarrierKind::UpAndOut, 0.0).unwrap(),
        ),
        (
            "6M down-and-in put 1.0500",
            Instrument::barrier(terms(OptionType::Put), 1.05, BarrierKind::DownAndIn, 0.0).unwrap(),
        ),
        (
            "6M cash digital call",
            Instrument::digital(
                terms(OptionType::Call),
                DigitalPayout::CashOrNothing { amount: 0.01 },
                DigitalObservation::AtExpiry,
            )
            .unwrap(),
        ),
    ];

    let mut results: Vec<(String, ValuationResult)> = Vec::new();
    for (label, trade) in &trades {
        let config = PricingModelConfig::for_instrument(trade);
        let mut timer = Timer::new();
        timer.start();
        match price(trade, &market, &config) {
            Ok(result) => {
                print_result(label, &result, timer.elapsed_ms());
                results.push((label.to_string(), result));
            }
            Err(e) => println!("{:<28} failed: {}", label, e),
        }
    }

    // Cross-check the vanilla on every engine
    println!("\nEngine comparison for the ATMF call:");
    for method in [PricingMethod::Analytic, PricingMethod::MonteCarlo, PricingMethod::Pde] {
        let config = PricingModelConfig::default().with_method(method);
        let mut timer = Timer::new();
        timer.start();
        let result = price(&trades[0].1, &market, &config).expect("vanilla prices on every engine");
        println!(
            "  {:<10?} {:>12.2} USD   delta {:>12.0} EUR   ({:.1} ms)",
            method,
            result.price(),
            result.greeks().delta,
            timer.elapsed_ms()
        );
    }

    let rows: Vec<(&str, &ValuationResult)> =
        results.iter().map(|(l, r)| (l.as_str(), r)).collect();
    match output::write_valuation_to_csv("valuations.csv", &rows) {
        Ok(()) => println!("\nValuations written to valuations.csv"),
        Err(e) => println!("\nCould not write valuations.csv: {}", e),
    }
}

fn build_market() -> fx_pricer::FxResult<MarketDataSnapshot> {
    let pair = CurrencyPair::parse("EUR/USD")?;
    let spot = 1.0850;
    let usd = ZeroCurve::from_tenors(&[
        ("1M", 0.0530),
        ("3M", 0.0525),
        ("6M", 0.0510),
        ("1Y", 0.0480),
    ])?;
    let eur = ZeroCurve::from_tenors(&[
        ("1M", 0.0385),
        ("3M", 0.0390),
        ("6M", 0.0380),
        ("1Y", 0.0360),
    ])?;

    let quotes = |rr: f64, bf: f64| {
        vec![
            DeltaQuote { delta: -0.25, vol: 0.070 + bf - 0.5 * rr },
            DeltaQuote { delta: 0.25, vol: 0.070 + bf + 0.5 * rr },
        ]
    };
    let mut slices = Vec::new();
    for (tenor, atm, rr, bf) in [
        ("1M", 0.068, -0.002, 0.002),
        ("6M", 0.072, -0.003, 0.003),
        ("1Y", 0.075, -0.004, 0.0035),
    ] {
        let t = fx_pricer::parse_tenor(tenor)?;
        let rd = usd.zero_rate(t);
        let rf = eur.zero_rate(t);
        slices.push(SmileSlice::from_delta_quotes(t, spot, rd, rf, atm, &quotes(rr, bf))?);
    }
    let surface = VolatilitySurface::new(slices, InterpolationMethod::CubicSpline)?;
    MarketDataSnapshot::new(Utc::now(), pair, spot, usd, eur, surface)
}

fn print_result(label: &str, r: &ValuationResult, elapsed_ms: f64) {
    let g = r.greeks();
    println!(
        "{:<28} {:>10?} premium {:>12.2} USD ({:>6.1} pips, {:.3}%)  delta {:>12.0}  vega/pt {:>10.2}  theta/day {:>8.2}  [{:.1} ms]",
        label,
        r.method(),
        r.price(),
        r.premium_pips(),
        r.premium_pct(),
        g.delta,
        g.vega_per_point(),
        g.theta_per_day(),
        elapsed_ms
    );
    if let Some(ci) = r.confidence_interval() {
        println!("{:<28} 95% CI [{:.2}, {:.2}]", "", ci.lower, ci.upper);
    }
    for w in r.warnings() {
        println!("{:<28} warning: {}", "", w);
    }
}
