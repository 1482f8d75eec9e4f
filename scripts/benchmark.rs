// scripts/benchmark.rs
use chrono::Utc;
use fx_pricer::math_utils::Timer;
use fx_pricer::output::write_timings_to_csv;
use fx_pricer::{
    price, BarrierKind, CurrencyPair, Instrument, MarketDataSnapshot, OptionTerms, OptionType,
    PricingMethod, PricingModelConfig, VolatilitySurface, ZeroCurve,
};
use std::env;
use std::process::Command;

#[derive(Debug)]
struct SystemInfo {
    os: String,
    cpu_model: String,
    cpu_cores: usize,
    memory_gb: f64,
    rust_version: String,
    rayon_threads: usize,
}

impl SystemInfo {
    fn gather() -> Self {
        Self {
            os: env::consts::OS.to_string(),
            cpu_model: Self::get_cpu_model(),
            cpu_cores: num_cpus::get(),
            memory_gb: Self::get_memory_gb(),
            rust_version: Self::get_rust_version(),
            rayon_threads: rayon::current_num_threads(),
        }
    }

    fn get_cpu_model() -> String {
        #[cfg(target_os = "linux")]
        {
            std::fs::read_to_string("/proc/cpuinfo")
                .ok()
                .and_then(|content| {
                    content
                        .lines()
                        .find(|line| line.starts_with("model name"))
                        .and_then(|line| line.split(':').nth(1))
                        .map(|s| s.trim().to_string())
                })
                .unwrap_or_else(|| "Unknown CPU".to_string())
        }

        #[cfg(target_os = "macos")]
        {
            Command::new("sysctl")
                .args(["-n", "machdep.cpu.brand_string"])
                .output()
                .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
                .unwrap_or_else(|_| "Unknown CPU".to_string())
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        {
            "Unknown CPU".to_string()
        }
    }

    fn get_memory_gb() -> f64 {
        #[cfg(target_os = "linux")]
        {
            std::fs::read_to_string("/proc/meminfo")
                .ok()
                .and_then(|content| {
                    content
                        .lines()
                        .find(|line| line.starts_with("MemTotal:"))
                        .and_then(|line| line.split_whitespace().nth(1))
                        .and_then(|s| s.parse::<u64>().ok())
                        .map(|kb| kb as f64 / (1024.0 * 1024.0))
                })
                .unwrap_or(0.0)
        }

        #[cfg(not(target_os = "linux"))]
        {
            0.0
        }
    }

    fn get_rust_version() -> String {
        Command::new("rustc")
            .arg("--version")
            .output()
            .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
            .unwrap_or_else(|_| "Unknown".to_string())
    }

    fn print(&self) {
        println!("System: {} / {}", self.os, self.cpu_model);
        println!(
            "Cores: {} (rayon threads: {}), memory: {:.1} GB",
            self.cpu_cores, self.rayon_threads, self.memory_gb
        );
        println!("Toolchain: {}\n", self.rust_version);
    }
}

fn market() -> fx_pricer::FxResult<MarketDataSnapshot> {
    MarketDataSnapshot::new(
        Utc::now(),
        CurrencyPair::parse("EURUSD")?,
        1.10,
        ZeroCurve::flat(0.05)?,
        ZeroCurve::flat(0.03)?,
        VolatilitySurface::flat(0.10, 1.10)?,
    )
}

/// Best of `runs` wall-clock times in milliseconds.
fn time_best<F: FnMut()>(runs: usize, mut f: F) -> f64 {
    let mut best = f64::INFINITY;
    for _ in 0..runs {
        let mut timer = Timer::new();
        timer.start();
        f();
        best = best.min(timer.elapsed_ms());
    }
    best
}

fn main() -> fx_pricer::FxResult<()> {
    let runs: usize = env::args().nth(1).and_then(|s| s.parse().ok()).unwrap_or(3);

    println!("fx-pricer benchmark");
    println!("===================");
    SystemInfo::gather().print();

    let market = market()?;
    let pair = market.pair().clone();
    let terms = OptionTerms::new(pair, OptionType::Call, 1.10, 1.0, 1_000_000.0)?;
    let vanilla = Instrument::european(terms.clone())?;
    let barrier = Instrument::barrier(terms, 1.30, BarrierKind::UpAndOut, 0.0)?;

    let mut rows: Vec<(String, usize, f64)> = Vec::new();

    for &paths in &[10_000usize, 100_000, 1_000_000] {
        let config = PricingModelConfig {
            paths,
            ..PricingModelConfig::default().with_method(PricingMethod::MonteCarlo)
        };
        let ms = time_best(runs, || {
            let _ = price(&vanilla, &market, &config);
        });
        println!("MC vanilla     {:>9} paths  {:>10.2} ms", paths, ms);
        rows.push((format!("mc_vanilla_{}", paths), paths, ms));

        let ms = time_best(runs, || {
            let _ = price(&barrier, &market, &config);
        });
        println!("MC up-and-out  {:>9} paths  {:>10.2} ms", paths, ms);
        rows.push((format!("mc_barrier_{}", paths), paths, ms));
    }

    for &(steps, nodes) in &[(100usize, 200usize), (400, 800), (1000, 2000)] {
        let config = PricingModelConfig {
            time_steps: steps,
            grid_size: nodes,
            ..PricingModelConfig::default().with_method(PricingMethod::Pde)
        };
        let ms = time_best(runs, || {
            let _ = price(&barrier, &market, &config);
        });
        println!("PDE up-and-out {:>4} x {:>5} grid {:>10.2} ms", steps, nodes, ms);
        rows.push((format!("pde_barrier_{}x{}", steps, nodes), steps * nodes, ms));
    }

    if let Err(e) = std::fs::create_dir_all("bench") {
        println!("Could not create bench/: {}", e);
        return Ok(());
    }
    let labelled: Vec<(&str, usize, f64)> =
        rows.iter().map(|(l, n, ms)| (l.as_str(), *n, *ms)).collect();
    match write_timings_to_csv("bench/timings.csv", &labelled) {
        Ok(()) => println!("\nTimings written to bench/timings.csv"),
        Err(e) => println!("\nCould not write timings: {}", e),
    }
    Ok(())
}
