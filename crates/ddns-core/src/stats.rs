//! Process-wide runtime counters
//!
//! [`RuntimeStats`] is constructed by whoever owns the engine and shared by
//! `Arc` with the components that report into it. Cycle counters live behind a
//! single mutex; the in-flight operation gauge is a lone atomic so workers can
//! release it without touching the lock.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Point-in-time copy of the counters, used for heartbeats
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Cycles started since launch
    pub cycles: u64,
    /// Cycles that completed without error
    pub successes: u64,
    /// Cycles that failed with a recoverable error
    pub errors: u64,
    /// Failures since the last success
    pub consecutive_errors: u64,
    /// Network operations currently running (including abandoned ones)
    pub active_operations: usize,
    /// When the last successful cycle finished
    pub last_success: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Counters {
    cycles: u64,
    successes: u64,
    errors: u64,
    consecutive_errors: u64,
    last_success: Option<DateTime<Utc>>,
}

/// Runtime counters shared between the scheduler and the bounded executor
#[derive(Debug, Default)]
pub struct RuntimeStats {
    counters: Mutex<Counters>,
    active_operations: AtomicUsize,
}

impl RuntimeStats {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    fn counters(&self) -> std::sync::MutexGuard<'_, Counters> {
        // Counters stay consistent even if a holder panicked mid-update
        self.counters.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Count a new cycle
    pub fn record_cycle_start(&self) {
        self.counters().cycles += 1;
    }

    /// Count a successful cycle and reset the failure streak
    pub fn record_success(&self) {
        let mut counters = self.counters();
        counters.successes += 1;
        counters.consecutive_errors = 0;
        counters.last_success = Some(Utc::now());
    }

    /// Count a recoverable failure, returning the current streak length
    pub fn record_failure(&self) -> u64 {
        let mut counters = self.counters();
        counters.errors += 1;
        counters.consecutive_errors += 1;
        counters.consecutive_errors
    }

    /// Register an in-flight operation
    ///
    /// The gauge is decremented when the returned guard is dropped, which
    /// happens exactly once whichever task ends up owning it.
    pub fn operation_started(self: &Arc<Self>) -> OperationGuard {
        self.active_operations.fetch_add(1, Ordering::SeqCst);
        OperationGuard {
            stats: Arc::clone(self),
        }
    }

    /// Operations currently in flight
    pub fn active_operations(&self) -> usize {
        self.active_operations.load(Ordering::SeqCst)
    }

    /// Copy the counters
    pub fn snapshot(&self) -> StatsSnapshot {
        let counters = self.counters();
        StatsSnapshot {
            cycles: counters.cycles,
            successes: counters.successes,
            errors: counters.errors,
            consecutive_errors: counters.consecutive_errors,
            active_operations: self.active_operations(),
            last_success: counters.last_success,
        }
    }
}

/// Keeps one unit of the active-operation gauge while alive
#[derive(Debug)]
pub struct OperationGuard {
    stats: Arc<RuntimeStats>,
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        self.stats.active_operations.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_resets_failure_streak() {
        let stats = RuntimeStats::new();
        stats.record_cycle_start();
        assert_eq!(stats.record_failure(), 1);
        stats.record_cycle_start();
        assert_eq!(stats.record_failure(), 2);
        stats.record_cycle_start();
        stats.record_success();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.cycles, 3);
        assert_eq!(snapshot.errors, 2);
        assert_eq!(snapshot.successes, 1);
        assert_eq!(snapshot.consecutive_errors, 0);
        assert!(snapshot.last_success.is_some());
    }

    #[test]
    fn guard_releases_gauge_once() {
        let stats = Arc::new(RuntimeStats::new());
        let first = stats.operation_started();
        let second = stats.operation_started();
        assert_eq!(stats.active_operations(), 2);

        drop(first);
        assert_eq!(stats.active_operations(), 1);
        drop(second);
        assert_eq!(stats.snapshot().active_operations, 0);
    }
}
