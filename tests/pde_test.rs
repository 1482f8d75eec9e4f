// tests/pde_test.rs
use approx::assert_abs_diff_eq;
use chrono::{TimeZone, Utc};
use fx_pricer::{
    price, price_with_cancellation, BarrierKind, CancellationSignal, Completion, CurrencyPair,
    DigitalObservation, DigitalPayout, FdScheme, FxError, GreeksConfig, Instrument,
    MarketDataSnapshot, OptionTerms, OptionType, PricingMethod, PricingModelConfig,
    VolatilitySurface, ZeroCurve,
};
use std::sync::atomic::{AtomicUsize, Ordering};

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

fn terms(option_type: OptionType, strike: f64) -> OptionTerms {
    OptionTerms::new(CurrencyPair::parse("EURUSD").unwrap(), option_type, strike, 1.0, 1.0).unwrap()
}

fn barrier(option_type: OptionType, level: f64, kind: BarrierKind, rebate: f64) -> Instrument {
    Instrument::barrier(terms(option_type, 1.1), level, kind, rebate).unwrap()
}

fn pde() -> PricingModelConfig {
    PricingModelConfig::default().with_method(PricingMethod::Pde)
}

fn pde_price(instrument: &Instrument) -> f64 {
    let cfg = PricingModelConfig {
        greeks: GreeksConfig::NONE,
        ..pde()
    };
    price(instrument, &market(), &cfg).unwrap().price()
}

#[test]
fn test_pde_matches_analytic_for_europeans() {
    let analytic = PricingModelConfig::default().with_method(PricingMethod::Analytic);
    for ot in [OptionType::Call, OptionType::Put] {
        for &k in &[1.0, 1.1, 1.2] {
            let option = Instrument::european(terms(ot, k)).unwrap();
            let exact = price(&option, &market(), &analytic).unwrap().price();
            let grid = pde_price(&option);
            println!("{:?} K={}: PDE {} analytic {}", ot, k, grid, exact);
            assert!((grid - exact).abs() < 1e-4, "{:?} K={}: {} vs {}", ot, k, grid, exact);
        }
    }
}

#[test]
fn test_pde_greeks_match_analytic() {
    let option = Instrument::european(terms(OptionType::Call, 1.1)).unwrap();
    let result = price(&option, &market(), &pde()).unwrap();
    let g = result.greeks();
    assert_eq!(result.method(), PricingMethod::Pde);
    assert_abs_diff_eq!(g.delta, 0.5810118796662318, epsilon = 1e-3);
    assert!((g.gamma - 3.4112758810630717).abs() / 3.4112758810630717 < 0.01);
    assert!((g.theta + 0.03074269190140293).abs() / 0.03074269190140293 < 0.01);
    assert!((g.vega - 0.4127643816086317).abs() / 0.4127643816086317 < 0.01);
    assert!((g.rho_domestic - 0.5855572969991397).abs() / 0.5855572969991397 < 0.01);
    assert!((g.rho_foreign + 0.639113067632855).abs() / 0.639113067632855 < 0.01);
}

#[test]
fn test_american_not_below_european() {
    let analytic = PricingModelConfig::default().with_method(PricingMethod::Analytic);
    for ot in [OptionType::Call, OptionType::Put] {
        for &k in &[1.0, 1.1, 1.2] {
            let european = Instrument::european(terms(ot, k)).unwrap();
            let american = Instrument::american(terms(ot, k)).unwrap();
            let eu = price(&european, &market(), &analytic).unwrap().price();
            let am = pde_price(&american);
            assert!(am >= eu - 1e-4, "{:?} K={}: American {} < European {}", ot, k, am, eu);
        }
    }
    // r_d > r_f: early exercise of the put is worth something
    let am_put = pde_price(&Instrument::american(terms(OptionType::Put, 1.1)).unwrap());
    let eu_put = pde_price(&Instrument::european(terms(OptionType::Put, 1.1)).unwrap());
    assert!(am_put > eu_put + 1e-3, "American {} European {}", am_put, eu_put);
}

#[test]
fn test_american_is_the_default_pde_case() {
    let american = Instrument::american(terms(OptionType::Put, 1.1)).unwrap();
    let cfg = PricingModelConfig::for_instrument(&american);
    assert_eq!(price(&american, &market(), &cfg).unwrap().method(), PricingMethod::Pde);
}

#[test]
fn test_explicit_scheme_instability() {
    let option = Instrument::european(terms(OptionType::Call, 1.1)).unwrap();
    let cfg = PricingModelConfig {
        scheme: FdScheme::Explicit,
        ..pde()
    };
    let err = price(&option, &market(), &cfg).unwrap_err();
    match &err {
        FxError::GridInstability { dt, dt_max, min_time_steps } => {
            assert!(dt > dt_max);
            assert!(*min_time_steps > cfg.time_steps);
        }
        other => panic!("expected GridInstability, got {:?}", other),
    }
    assert!(err.is_recoverable());

    for scheme in [FdScheme::Implicit, FdScheme::CrankNicolson] {
        let stable = PricingModelConfig { scheme, ..cfg.clone() };
        assert!(price(&option, &market(), &stable).is_ok());
    }
}

#[test]
fn test_up_and_out_matches_continuous_barrier_formula() {
    let uo = barrier(OptionType::Call, 1.3, BarrierKind::UpAndOut, 0.0);
    // Reiner–Rubinstein up-and-out call
    assert_abs_diff_eq!(pde_price(&uo), 0.02962548789574561, epsilon = 1e-4);
}

#[test]
fn test_knock_in_plus_knock_out_is_vanilla() {
    let analytic = PricingModelConfig::default().with_method(PricingMethod::Analytic);
    let put = Instrument::european(terms(OptionType::Put, 1.1)).unwrap();
    let vanilla = price(&put, &market(), &analytic).unwrap().price();
    let ko = barrier(OptionType::Put, 1.0, BarrierKind::DownAndOut, 0.0);
    let ki = barrier(OptionType::Put, 1.0, BarrierKind::DownAndIn, 0.0);
    assert_abs_diff_eq!(pde_price(&ko) + pde_price(&ki), vanilla, epsilon = 1e-4);
}

#[test]
fn test_rebates() {
    let df = (-0.05f64).exp();
    // Breached on the valuation date: settles to the discounted rebate
    let breached = barrier(OptionType::Call, 1.15, BarrierKind::DownAndOut, 0.01);
    assert_abs_diff_eq!(pde_price(&breached), 0.01 * df, epsilon = 1e-15);

    // A knock-in with rebate is worth its zero-rebate twin plus the rebate on no-hit paths
    let with = barrier(OptionType::Call, 1.3, BarrierKind::UpAndIn, 0.01);
    let without = barrier(OptionType::Call, 1.3, BarrierKind::UpAndIn, 0.0);
    let diff = pde_price(&with) - pde_price(&without);
    assert!(diff > 0.0 && diff < 0.01 * df);
}

#[test]
fn test_touch_digitals() {
    let one_touch = Instrument::digital(
        terms(OptionType::Put, 1.0),
        DigitalPayout::CashOrNothing { amount: 1.0 },
        DigitalObservation::OneTouch,
    )
    .unwrap();
    let no_touch = Instrument::digital(
        terms(OptionType::Put, 1.0),
        DigitalPayout::CashOrNothing { amount: 1.0 },
        DigitalObservation::NoTouch,
    )
    .unwrap();
    let ot = pde_price(&one_touch);
    let nt = pde_price(&no_touch);
    assert_abs_diff_eq!(ot, 0.2791737647162509, epsilon = 1e-4);
    assert_abs_diff_eq!(ot + nt, (-0.05f64).exp(), epsilon = 1e-6);
}

#[test]
fn test_cancel_mid_grid_returns_partial() {
    struct CancelAfter(AtomicUsize);
    impl CancellationSignal for CancelAfter {
        fn is_cancelled(&self) -> bool {
            self.0.fetch_add(1, Ordering::SeqCst) >= 50
        }
    }
    let option = Instrument::european(terms(OptionType::Call, 1.1)).unwrap();
    let cancel = CancelAfter(AtomicUsize::new(0));
    let result = price_with_cancellation(&option, &market(), &pde(), &cancel).unwrap();
    assert_eq!(
        result.completion(),
        Completion::Partial {
            completed: 50,
            requested: 200
        }
    );
    assert!(result.greeks().vega.is_nan());
    assert!(result.greeks().delta.is_finite());
}

#[test]
fn test_expiry_day_pays_intrinsic() {
    let terms =
        OptionTerms::new(CurrencyPair::parse("EURUSD").unwrap(), OptionType::Put, 1.2, 0.0, 1.0)
            .unwrap();
    let am = Instrument::american(terms).unwrap();
    assert_abs_diff_eq!(pde_price(&am), 0.1, epsilon = 1e-12);
}

struct CancelAfterPolls {
    polls: AtomicUsize,
    limit: usize,
}

impl CancellationSignal for CancelAfterPolls {
    fn is_cancelled(&self) -> bool {
        self.polls.fetch_add(1, Ordering::SeqCst) >= self.limit
    }
}

fn cancel_after(limit: usize) -> CancelAfterPolls {
    CancelAfterPolls {
        polls: AtomicUsize::new(0),
        limit,
    }
}

#[test]
fn test_cancel_during_bumped_greeks_is_partial() {
    let option = Instrument::european(terms(OptionType::Call, 1.1)).unwrap();
    // One poll per time step: 200 for the base solve, then six bumped solves
    for limit in [200, 250, 399, 400, 1000, 1399, 1400] {
        let result =
            price_with_cancellation(&option, &market(), &pde(), &cancel_after(limit)).unwrap();
        let g = result.greeks();
        let finite = [g.delta, g.gamma, g.vega, g.theta, g.rho_domestic, g.rho_foreign]
            .iter()
            .all(|v| v.is_finite());
        assert_eq!(result.is_complete(), finite, "limit {}: {:?}", limit, g);
        assert_eq!(result.is_complete(), limit >= 1400, "limit {}", limit);
    }

    let result = price_with_cancellation(&option, &market(), &pde(), &cancel_after(200)).unwrap();
    assert_eq!(
        result.completion(),
        Completion::Partial {
            completed: 200,
            requested: 1400
        }
    );
    assert!(result.greeks().delta.is_finite());
    assert!(result.greeks().vega.is_nan());
}

#[test]
fn test_cancelled_knock_in_reads_all_legs_on_one_layer() {
    let ki = barrier(OptionType::Put, 1.0, BarrierKind::DownAndIn, 0.01);
    let cfg = PricingModelConfig {
        greeks: GreeksConfig::NONE,
        ..pde()
    };
    let result = price_with_cancellation(&ki, &market(), &cfg, &cancel_after(50)).unwrap();
    assert_eq!(
        result.completion(),
        Completion::Partial {
            completed: 50,
            requested: 200
        }
    );
    assert!(result.price().is_finite() && result.price() > 0.0);
}

#[test]
fn test_explicit_scheme_near_stability_limit_keeps_vega() {
    // 225 steps on 101 nodes is just stable at σ = 10% but not at σ = 10.1%
    let uo = barrier(OptionType::Call, 1.3, BarrierKind::UpAndOut, 0.0);
    let explicit = PricingModelConfig {
        scheme: FdScheme::Explicit,
        time_steps: 225,
        grid_size: 101,
        ..pde()
    };
    let result = price(&uo, &market(), &explicit).unwrap();
    assert!(result.is_complete());
    assert!(result.greeks().vega.is_finite());

    let cn = PricingModelConfig {
        scheme: FdScheme::CrankNicolson,
        ..explicit.clone()
    };
    let reference = price(&uo, &market(), &cn).unwrap();
    assert_abs_diff_eq!(result.greeks().vega, reference.greeks().vega, epsilon = 1e-12);
    assert_abs_diff_eq!(result.price(), reference.price(), epsilon = 1e-3);
}
