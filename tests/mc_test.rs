// tests/mc_test.rs
use approx::assert_abs_diff_eq;
use chrono::{TimeZone, Utc};
use fx_pricer::{
    price, price_with_cancellation, BarrierKind, CancellationSignal, CancellationToken, Completion,
    CurrencyPair, FxError, GreeksConfig, Instrument, MarketDataSnapshot, OptionTerms, OptionType,
    PrecisionWarning, PricingMethod, PricingModelConfig, VolDynamics, VolatilitySurface, ZeroCurve,
};
use std::sync::atomic::{AtomicUsize, Ordering};

const ANALYTIC_CALL: f64 = 0.053555770633715305;

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

fn eurusd(option_type: OptionType) -> OptionTerms {
    OptionTerms::new(CurrencyPair::parse("EURUSD").unwrap(), option_type, 1.1, 1.0, 1.0).unwrap()
}

fn call() -> Instrument {
    Instrument::european(eurusd(OptionType::Call)).unwrap()
}

fn mc_config(paths: usize, antithetic: bool) -> PricingModelConfig {
    PricingModelConfig {
        paths,
        antithetic,
        greeks: GreeksConfig::NONE,
        ..PricingModelConfig::default().with_method(PricingMethod::MonteCarlo)
    }
}

/// Fires after a fixed number of polls.
struct CancelAfter {
    polls: AtomicUsize,
    limit: usize,
}

impl CancellationSignal for CancelAfter {
    fn is_cancelled(&self) -> bool {
        self.polls.fetch_add(1, Ordering::SeqCst) >= self.limit
    }
}

#[test]
fn test_mc_vs_analytic() {
    let result = price(&call(), &market(), &mc_config(200_000, true)).unwrap();
    let ci = result.confidence_interval().expect("Monte Carlo reports an interval");

    println!("MC: {} ± {}  analytic: {}", result.price(), ci.std_error, ANALYTIC_CALL);
    assert_eq!(result.method(), PricingMethod::MonteCarlo);
    assert!((result.price() - ANALYTIC_CALL).abs() < 1e-3);
    assert!(ci.lower < result.price() && result.price() < ci.upper);
    assert!(ci.std_error < 5e-4);
}

#[test]
fn test_antithetic_reduces_standard_error() {
    let plain = price(&call(), &market(), &mc_config(50_000, false)).unwrap();
    let anti = price(&call(), &market(), &mc_config(50_000, true)).unwrap();
    let se_plain = plain.confidence_interval().unwrap().std_error;
    let se_anti = anti.confidence_interval().unwrap().std_error;
    println!("SE plain {} antithetic {}", se_plain, se_anti);
    assert!(se_anti < se_plain);
}

#[test]
fn test_standard_error_shrinks_with_paths() {
    let small = price(&call(), &market(), &mc_config(10_000, true)).unwrap();
    let large = price(&call(), &market(), &mc_config(160_000, true)).unwrap();
    let ratio = small.confidence_interval().unwrap().std_error
        / large.confidence_interval().unwrap().std_error;
    // √16 = 4 in expectation
    assert!(ratio > 3.0 && ratio < 5.0, "SE ratio {}", ratio);
}

#[test]
fn test_reproducible_across_thread_counts() {
    let one = PricingModelConfig {
        threads: Some(1),
        ..mc_config(60_000, true)
    };
    let many = PricingModelConfig {
        threads: Some(4),
        ..mc_config(60_000, true)
    };
    let a = price(&call(), &market(), &one).unwrap();
    let b = price(&call(), &market(), &many).unwrap();
    assert_eq!(a.price().to_bits(), b.price().to_bits());

    let reseeded = PricingModelConfig { seed: 7, ..one };
    let c = price(&call(), &market(), &reseeded).unwrap();
    assert_ne!(a.price().to_bits(), c.price().to_bits());
}

#[test]
fn test_cancel_mid_run_returns_partial() {
    let cfg = PricingModelConfig {
        threads: Some(1),
        partition_size: 4096,
        ..mc_config(100_000, false)
    };
    let signal = CancelAfter {
        polls: AtomicUsize::new(0),
        limit: 3,
    };
    let result = price_with_cancellation(&call(), &market(), &cfg, &signal).unwrap();
    match result.completion() {
        Completion::Partial { completed, requested } => {
            assert_eq!(requested, 100_000);
            assert_eq!(completed, 3 * 4096);
        }
        Completion::Complete => panic!("run should be partial"),
    }
    assert!(!result.is_complete());
    assert!(result.greeks().delta.is_nan());
    assert!((result.price() - ANALYTIC_CALL).abs() < 5e-3);
}

fn all_greeks_finite(result: &fx_pricer::ValuationResult) -> bool {
    let g = result.greeks();
    [g.delta, g.gamma, g.vega, g.theta, g.rho_domestic, g.rho_foreign]
        .iter()
        .all(|v| v.is_finite())
}

#[test]
fn test_cancel_during_greeks_is_partial() {
    // 10 partitions per run: the base run takes the first 10 polls
    let cfg = PricingModelConfig {
        threads: Some(1),
        partition_size: 4096,
        greeks: GreeksConfig::ALL,
        ..mc_config(40_960, false)
    };
    for limit in [10, 11, 15, 29, 30, 45, 69, 89, 99, 100] {
        let signal = CancelAfter {
            polls: AtomicUsize::new(0),
            limit,
        };
        let result = price_with_cancellation(&call(), &market(), &cfg, &signal).unwrap();
        assert!(
            result.is_complete() == all_greeks_finite(&result),
            "limit {}: complete={} greeks={:?}",
            limit,
            result.is_complete(),
            result.greeks()
        );
        if limit < 100 {
            match result.completion() {
                Completion::Partial { completed, requested } => {
                    // Base run plus nine bumped runs
                    assert_eq!(requested, 10 * 40_960, "limit {}", limit);
                    assert!(completed >= 40_960 && completed < requested, "limit {}", limit);
                }
                Completion::Complete => panic!("limit {}: Greeks were cut short", limit),
            }
        }
    }
}

#[test]
fn test_cancel_before_start_is_an_error() {
    let token = CancellationToken::new();
    token.cancel();
    let err = price_with_cancellation(&call(), &market(), &mc_config(10_000, true), &token)
        .unwrap_err();
    assert!(matches!(err, FxError::Cancelled { completed: 0, .. }));
}

#[test]
fn test_precision_warnings() {
    let thin = price(&call(), &market(), &mc_config(500, true)).unwrap();
    assert!(thin
        .warnings()
        .iter()
        .any(|w| matches!(w, PrecisionWarning::ThinPathCount { paths: 500, .. })));

    let barrier = Instrument::barrier(
        eurusd(OptionType::Call),
        1.3,
        BarrierKind::UpAndOut,
        0.0,
    )
    .unwrap();
    let coarse = PricingModelConfig {
        time_steps: 5,
        ..mc_config(20_000, true)
    };
    let result = price(&barrier, &market(), &coarse).unwrap();
    assert!(result
        .warnings()
        .iter()
        .any(|w| matches!(
            w,
            PrecisionWarning::CoarseBarrierMonitoring {
                time_steps: 5,
                minimum: 52
            }
        )));
}

#[test]
fn test_bumped_greeks_close_to_analytic() {
    let cfg = PricingModelConfig {
        greeks: GreeksConfig::DELTA | GreeksConfig::VEGA,
        ..mc_config(200_000, true)
    };
    let result = price(&call(), &market(), &cfg).unwrap();
    let g = result.greeks();
    println!("MC delta {} vega {}", g.delta, g.vega);
    assert_abs_diff_eq!(g.delta, 0.5810118796662318, epsilon = 0.01);
    assert!((g.vega - 0.4127643816086317).abs() / 0.4127643816086317 < 0.05);
    assert!(g.gamma.is_nan(), "unrequested Greeks are not computed");
}

#[test]
fn test_knock_in_plus_knock_out_is_vanilla() {
    let terms = eurusd(OptionType::Call);
    let ko = Instrument::barrier(terms.clone(), 1.25, BarrierKind::UpAndOut, 0.0).unwrap();
    let ki = Instrument::barrier(terms, 1.25, BarrierKind::UpAndIn, 0.0).unwrap();
    let cfg = PricingModelConfig {
        time_steps: 100,
        ..mc_config(100_000, true)
    };
    let sum =
        price(&ko, &market(), &cfg).unwrap().price() + price(&ki, &market(), &cfg).unwrap().price();
    assert!((sum - ANALYTIC_CALL).abs() < 2e-3, "KO + KI = {}", sum);
}

#[test]
fn test_local_vol_on_flat_surface_matches_constant() {
    let cfg = PricingModelConfig {
        vol_dynamics: VolDynamics::LocalVol,
        time_steps: 50,
        ..mc_config(100_000, true)
    };
    let result = price(&call(), &market(), &cfg).unwrap();
    assert!((result.price() - ANALYTIC_CALL).abs() < 2e-3, "local vol MC {}", result.price());
}

#[test]
fn test_american_is_not_simulated() {
    let am = Instrument::american(eurusd(OptionType::Put)).unwrap();
    let err = price(&am, &market(), &mc_config(10_000, true)).unwrap_err();
    assert!(matches!(err, FxError::UnsupportedOperation { .. }));
}
