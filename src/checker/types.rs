//! Coordinator configuration, per-target results, and statistics

use crate::types::{Discovery, Target};

/// Upper bound on simultaneous in-flight fetches, regardless of target count.
pub const MAX_WORKERS: usize = 4;

/// Configuration for the check coordinator
#[derive(Debug, Clone)]
pub struct CheckConfig {
    /// Maximum concurrent fetches per cycle
    pub max_concurrent_fetches: usize,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: MAX_WORKERS,
        }
    }
}

/// What one target task produced: candidate discoveries, or a failure that
/// must not affect sibling targets.
#[derive(Debug)]
pub struct TargetReport {
    pub target: Target,
    pub discoveries: Vec<Discovery>,
    pub error: Option<String>,
}

impl TargetReport {
    pub(super) fn failure(target: Target, error: impl Into<String>) -> Self {
        Self {
            target,
            discoveries: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// Running counters across cycles
#[derive(Debug, Clone, Default)]
pub struct CheckStats {
    /// Completed check cycles
    pub cycles_completed: u64,
    /// Targets actually fetched (skipped targets excluded)
    pub targets_checked: u64,
    /// Targets whose fetch or scan failed
    pub failed_targets: u64,
    /// Committed discoveries
    pub discoveries: u64,
    /// Successful notification dispatches
    pub notifications_sent: u64,
    /// Failed notification dispatches
    pub notification_failures: u64,
}
