// demos/surface_calibration.rs
use chrono::Utc;
use fx_pricer::analytics::garman_kohlhagen::gk_price;
use fx_pricer::calibration::calibrate_surface_with_report;
use fx_pricer::output;
use fx_pricer::{
    CurrencyPair, InterpolationMethod, MarketDataSnapshot, OptionType, PriceQuote, QuoteGrid,
    VolatilitySurface, ZeroCurve,
};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("Surface calibration from a premium grid");
    println!("=======================================\n");

    let (spot, rd, rf) = (148.50, 0.002, 0.050);
    let market = MarketDataSnapshot::new(
        Utc::now(),
        CurrencyPair::parse("USDJPY").expect("valid pair"),
        spot,
        ZeroCurve::flat(rd).expect("valid curve"),
        ZeroCurve::flat(rf).expect("valid curve"),
        VolatilitySurface::flat(0.10, spot).expect("valid surface"),
    )
    .expect("valid market");

    // Premiums generated from a skewed smile, as a dealer screen would show them
    let smile = |t: f64, k: f64| {
        let m = (k / market.forward(t)).ln();
        0.095 + 0.004 * t.sqrt() - 0.12 * m + 0.9 * m * m
    };
    let mut grid = QuoteGrid::new(Vec::new()).with_method(InterpolationMethod::Sabr);
    for &t in &[1.0 / 12.0, 0.25, 0.5, 1.0] {
        for &moneyness in &[0.92, 0.96, 1.0, 1.04, 1.08] {
            let k = (market.forward(t) * moneyness * 100.0).round() / 100.0;
            let ot = if moneyness < 1.0 { OptionType::Put } else { OptionType::Call };
            grid.push(PriceQuote::new(t, k, ot, gk_price(ot, spot, k, rd, rf, smile(t, k), t)));
        }
    }
    // A stale quote below intrinsic
    grid.push(PriceQuote::new(0.5, 140.0, OptionType::Call, 1.0));

    let report = match calibrate_surface_with_report(&grid, &market) {
        Ok(report) => report,
        Err(e) => {
            println!("Calibration failed: {}", e);
            return;
        }
    };

    println!("Calibrated {} quotes into {} tenors", grid.len(), report.surface.slices().len());
    println!("Relaxed retries: {}", report.retried);
    for failure in &report.failures {
        println!(
            "  dropped T={:.4} K={:.2}: {}",
            failure.quote.tenor, failure.quote.strike, failure.error
        );
    }
    for fallback in report.surface.sabr_fallbacks() {
        println!("  linear smile at T={:.4}: {}", fallback.tenor, fallback.error);
    }

    println!("\n{:>8} {:>10} {:>10} {:>10}", "tenor", "strike", "quoted", "surface");
    for slice in report.surface.slices() {
        for &k in slice.strikes() {
            let fitted = report.surface.volatility_at(slice.tenor(), k).unwrap_or(f64::NAN);
            println!(
                "{:>8.4} {:>10.2} {:>10.4} {:>10.4}",
                slice.tenor(),
                k,
                smile(slice.tenor(), k),
                fitted
            );
        }
    }

    match output::write_surface_to_csv("surface.csv", &report.surface) {
        Ok(()) => println!("\nSurface nodes written to surface.csv"),
        Err(e) => println!("\nCould not write surface.csv: {}", e),
    }
}
