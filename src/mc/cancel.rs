// src/mc/cancel.rs
//! Cooperative cancellation for long-running valuations.
//!
//! Engines poll the signal between units of work (one Monte Carlo partition,
//! one PDE time step) and stop early with a partial result.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub trait CancellationSignal: Sync {
    fn is_cancelled(&self) -> bool;
}

/// Signal that never fires
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

impl CancellationSignal for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Shareable flag; clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl CancellationSignal for CancellationToken {
    fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let token = CancellationToken::new();
        let observer = token.clone();
        assert!(!observer.is_cancelled());
        token.cancel();
        assert!(observer.is_cancelled());
        token.reset();
        assert!(!observer.is_cancelled());
        assert!(!NeverCancel.is_cancelled());
    }
}
