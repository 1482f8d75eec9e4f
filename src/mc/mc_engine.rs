// src/mc/mc_engine.rs
//! Partitioned Monte Carlo simulation
//!
//! # Estimator
//!
//! Each sample is the discounted payoff of one path (or, with antithetic
//! variates, the average of a path and its mirror built from `-Z`):
//! ```text
//! V̂ = DF_d(T) · (1/N) Σ payoff(path_i)
//! SE = s / √N,   95% CI = V̂ ± 1.96 · SE
//! ```
//!
//! # Reproducibility
//!
//! Samples are split into fixed-size partitions. Partition `p` draws from its
//! own stream seeded from `(seed, p)` and accumulates `(count, mean, M2)`
//! with Welford's update. Partition statistics are merged in index order, so
//! the estimate is bit-identical whatever the number of worker threads.
//!
//! # Cancellation
//!
//! The signal is polled before each partition starts. Partitions that never
//! start are dropped and the estimate reports how many samples it used.

use crate::error::{FxError, FxResult};
use crate::mc::cancel::CancellationSignal;
use crate::mc::payoffs::PathPayoff;
use crate::models::model::SpotDynamics;
use crate::rng::{get_normal_draw, RngFactory};
use rayon::prelude::*;
use rayon::ThreadPool;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct McSettings {
    /// Simulated paths, mirrors included
    pub paths: usize,
    pub steps: usize,
    pub antithetic: bool,
    pub seed: u64,
    /// Samples per partition
    pub partition_size: usize,
}

impl McSettings {
    /// Independent samples: path pairs when antithetic, single paths otherwise
    pub fn samples(&self) -> usize {
        if self.antithetic {
            (self.paths + 1) / 2
        } else {
            self.paths
        }
    }

    pub fn paths_per_sample(&self) -> usize {
        if self.antithetic {
            2
        } else {
            1
        }
    }

    fn partitions(&self) -> usize {
        (self.samples() + self.partition_size - 1) / self.partition_size
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct McEstimate {
    pub mean: f64,
    pub std_error: f64,
    pub paths_used: usize,
    pub paths_requested: usize,
}

impl McEstimate {
    pub fn is_complete(&self) -> bool {
        self.paths_used >= self.paths_requested
    }
}

/// Running `(count, mean, M2)` of one partition
#[derive(Debug, Clone, Copy, Default)]
struct Moments {
    count: usize,
    mean: f64,
    m2: f64,
}

impl Moments {
    fn push(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    /// Chan et al. pairwise merge
    fn merge(self, other: Moments) -> Moments {
        if other.count == 0 {
            return self;
        }
        if self.count == 0 {
            return other;
        }
        let count = self.count + other.count;
        let delta = other.mean - self.mean;
        let mean = self.mean + delta * other.count as f64 / count as f64;
        let m2 = self.m2
            + other.m2
            + delta * delta * (self.count as f64 * other.count as f64) / count as f64;
        Moments { count, mean, m2 }
    }
}

/// Simulate `payoff` under `dynamics` from `spot` to `expiry`.
///
/// Fails with [`FxError::Cancelled`] if no partition completed and with
/// [`FxError::NumericalInstability`] if the estimate is not finite.
#[allow(clippy::too_many_arguments)]
pub fn simulate<D: SpotDynamics>(
    dynamics: &D,
    payoff: &PathPayoff,
    spot: f64,
    expiry: f64,
    discount: f64,
    settings: &McSettings,
    pool: &ThreadPool,
    cancel: &dyn CancellationSignal,
) -> FxResult<McEstimate> {
    let samples = settings.samples();
    let steps = settings.steps.max(1);
    let dt = expiry / steps as f64;
    let factory = RngFactory::new(settings.seed);

    let run_partition = |p: usize| -> Option<Moments> {
        if cancel.is_cancelled() {
            return None;
        }
        let start = p * settings.partition_size;
        let end = (start + settings.partition_size).min(samples);
        let mut rng = factory.partition_stream(p as u64);

        // Reused for every sample of the partition
        let mut normals = vec![0.0; steps];
        let mut path = vec![0.0; steps + 1];
        let mut moments = Moments::default();

        for _ in start..end {
            for z in normals.iter_mut() {
                *z = get_normal_draw(&mut rng);
            }
            fill_path(dynamics, spot, dt, &normals, 1.0, &mut path);
            let mut value = payoff.calculate(&path);
            if settings.antithetic {
                fill_path(dynamics, spot, dt, &normals, -1.0, &mut path);
                value = 0.5 * (value + payoff.calculate(&path));
            }
            moments.push(discount * value);
        }
        Some(moments)
    };

    let partials: Vec<Option<Moments>> = pool.install(|| {
        (0..settings.partitions())
            .into_par_iter()
            .map(run_partition)
            .collect()
    });

    let total = partials
        .into_iter()
        .flatten()
        .fold(Moments::default(), Moments::merge);

    let paths_used = (total.count * settings.paths_per_sample()).min(settings.paths);
    if total.count == 0 {
        return Err(FxError::Cancelled {
            completed: 0,
            requested: settings.paths,
        });
    }

    let variance = if total.count > 1 {
        total.m2 / (total.count - 1) as f64
    } else {
        0.0
    };
    let std_error = (variance / total.count as f64).sqrt();
    if !total.mean.is_finite() || !std_error.is_finite() {
        return Err(FxError::NumericalInstability {
            method: "Monte Carlo".to_string(),
            reason: format!("non-finite estimate {} ± {}", total.mean, std_error),
        });
    }

    Ok(McEstimate {
        mean: total.mean,
        std_error,
        paths_used,
        paths_requested: settings.paths,
    })
}

fn fill_path<D: SpotDynamics>(
    dynamics: &D,
    spot: f64,
    dt: f64,
    normals: &[f64],
    sign: f64,
    path: &mut [f64],
) {
    path[0] = spot;
    let mut s = spot;
    for (i, &z) in normals.iter().enumerate() {
        s = dynamics.step(s, i as f64 * dt, dt, sign * z);
        path[i + 1] = s;
    }
}
