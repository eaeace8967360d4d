//! MCTS search statistics for diagnostics and tuning.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Statistics collected across all searches of one engine.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStats {
    /// Simulations completed.
    pub simulations: u64,

    /// Nodes expanded (including root expansions).
    pub expansions: u64,

    /// Simulations that ended on a terminal state.
    pub terminal_hits: u64,

    /// Evaluator calls made by workers and root expansion.
    pub evaluations: u64,

    /// Evaluator calls that returned an error.
    pub evaluation_failures: u64,

    /// Total time spent inside `search` (microseconds).
    pub time_us: u64,
}

impl SearchStats {
    /// Create new empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculate simulations per second.
    #[must_use]
    pub fn simulations_per_second(&self) -> f64 {
        if self.time_us == 0 {
            0.0
        } else {
            self.simulations as f64 / (self.time_us as f64 / 1_000_000.0)
        }
    }

    /// Fraction of simulations that reached a terminal state.
    #[must_use]
    pub fn terminal_ratio(&self) -> f64 {
        if self.simulations == 0 {
            0.0
        } else {
            self.terminal_hits as f64 / self.simulations as f64
        }
    }
}

/// Shared counters updated by worker threads.
#[derive(Debug, Default)]
pub(crate) struct SearchCounters {
    pub simulations: AtomicU64,
    pub expansions: AtomicU64,
    pub terminal_hits: AtomicU64,
    pub evaluations: AtomicU64,
    pub evaluation_failures: AtomicU64,
    pub time_us: AtomicU64,
}

impl SearchCounters {
    #[inline]
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SearchStats {
        SearchStats {
            simulations: self.simulations.load(Ordering::Relaxed),
            expansions: self.expansions.load(Ordering::Relaxed),
            terminal_hits: self.terminal_hits.load(Ordering::Relaxed),
            evaluations: self.evaluations.load(Ordering::Relaxed),
            evaluation_failures: self.evaluation_failures.load(Ordering::Relaxed),
            time_us: self.time_us.load(Ordering::Relaxed),
        }
    }
}
