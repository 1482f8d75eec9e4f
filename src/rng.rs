// src/rng.rs
//! Random Number Generation for Monte Carlo Simulations
//!
//! # Design
//!
//! Monte Carlo valuations must be:
//! 1. **Reproducible**: same seed → same price, bit for bit
//! 2. **Independent of parallelism**: the degree of parallelism never changes the result
//! 3. **Parallel safe**: every partition of paths owns its stream
//!
//! # Partitioned Streams
//!
//! Paths are split into fixed-size partitions by index range. Partition `p`
//! draws from a `StdRng` whose seed is a splitmix64 mix of `(base_seed, p)`:
//! ```text
//! z = base_seed + golden * (p + 1)
//! z = (z ⊕ (z >> 30)) * 0xbf58476d1ce4e5b9
//! z = (z ⊕ (z >> 27)) * 0x94d049bb133111eb
//! seed_p = z ⊕ (z >> 31)
//! ```
//! Since partition boundaries depend only on the configuration, any thread
//! may run any partition without changing the numbers it sees.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

const GOLDEN_GAMMA: u64 = 0x9e3779b97f4a7c15;

/// Counter-based splitmix64 generator
///
/// Used to derive well-separated seeds for partition streams.
#[derive(Debug, Clone)]
pub struct CounterRng {
    base_seed: u64,
    counter: u64,
}

impl CounterRng {
    pub fn new(base_seed: u64, counter: u64) -> Self {
        Self { base_seed, counter }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.counter = self.counter.wrapping_add(1);
        let mut z = self
            .base_seed
            .wrapping_add(self.counter.wrapping_mul(GOLDEN_GAMMA));
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9u64);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111ebu64);
        z ^ (z >> 31)
    }

    pub fn uniform(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / 9007199254740992.0) // 2^53
    }
}

/// Factory for the isolated random stream of each path partition
#[derive(Debug, Clone, Copy)]
pub struct RngFactory {
    base_seed: u64,
}

impl RngFactory {
    pub fn new(base_seed: u64) -> Self {
        Self { base_seed }
    }

    /// Seed of partition `partition`, derived from the base seed alone
    pub fn partition_seed(&self, partition: u64) -> u64 {
        CounterRng::new(self.base_seed, partition).next_u64()
    }

    /// Stream for one partition of paths
    pub fn partition_stream(&self, partition: u64) -> StdRng {
        StdRng::seed_from_u64(self.partition_seed(partition))
    }
}

pub fn get_normal_draw<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    StandardNormal.sample(rng)
}
