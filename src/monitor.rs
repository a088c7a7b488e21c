//! Monitor loop driving repeated check cycles until mission-complete.
//!
//! The loop itself is sequential: cycles never overlap, and the decision
//! after each cycle is an explicit `LoopAction` so the failure-recovery
//! policy is a visible, testable transition rather than a blanket catch-all.
//! Sleeps race the interrupt signal; an in-flight cycle always finishes its
//! started fetches before the loop can exit.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::signal;

use crate::checker::CheckCoordinator;
use crate::notify::{self, NotificationSink};

/// Fallback sleep after an unexpected cycle failure.
pub const ERROR_RETRY_INTERVAL: Duration = Duration::from_secs(60);

/// What the loop does after a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopAction {
    /// Every combination is found and auto-stop is on: summarize and stop.
    Stop,
    /// Sleep the configured interval, then run the next cycle.
    Sleep(Duration),
    /// The cycle failed; sleep the fallback interval and try again.
    SleepAfterError(Duration),
}

/// How a monitor run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// Mission-complete: every pair found, auto-stop configured.
    Completed,
    /// User-initiated stop via interrupt.
    Interrupted,
}

/// Drives check cycles on an interval and decides when the mission is done.
pub struct Monitor {
    coordinator: CheckCoordinator,
    sink: Arc<dyn NotificationSink>,
    interval: Duration,
    auto_stop: bool,
}

impl Monitor {
    pub fn new(
        coordinator: CheckCoordinator,
        sink: Arc<dyn NotificationSink>,
        interval: Duration,
        auto_stop: bool,
    ) -> Self {
        Self {
            coordinator,
            sink,
            interval,
            auto_stop,
        }
    }

    /// Run until mission-complete or interrupt.
    pub async fn run(&self) -> Result<MonitorOutcome> {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            auto_stop = self.auto_stop,
            "starting monitor"
        );
        self.announce_startup().await;

        loop {
            let cycle = self.coordinator.run_cycle().await;
            if let Err(e) = &cycle {
                tracing::error!(error = %format!("{e:#}"), "check cycle failed");
            }

            let (found, total) = self.coordinator.ledger().completion_counts();
            tracing::info!(found, total, "progress");
            if found > 0 && found < total {
                tracing::info!(remaining = total - found, "still searching");
            }

            match Self::next_action(&cycle, found == total, self.auto_stop, self.interval) {
                LoopAction::Stop => {
                    tracing::info!("all combinations found, stopping monitor");
                    self.announce_completion().await;
                    return Ok(MonitorOutcome::Completed);
                }
                LoopAction::Sleep(duration) => {
                    tracing::info!(secs = duration.as_secs(), "sleeping until next check");
                    if Self::sleep_or_interrupt(duration).await {
                        tracing::info!("monitor stopped by user");
                        return Ok(MonitorOutcome::Interrupted);
                    }
                }
                LoopAction::SleepAfterError(duration) => {
                    tracing::warn!(secs = duration.as_secs(), "backing off after cycle failure");
                    if Self::sleep_or_interrupt(duration).await {
                        tracing::info!("monitor stopped by user");
                        return Ok(MonitorOutcome::Interrupted);
                    }
                }
            }
        }
    }

    /// Decide the next loop action from the cycle result and completion state.
    fn next_action(
        cycle: &Result<bool>,
        complete: bool,
        auto_stop: bool,
        interval: Duration,
    ) -> LoopAction {
        match cycle {
            Err(_) => LoopAction::SleepAfterError(ERROR_RETRY_INTERVAL),
            Ok(_) if complete && auto_stop => LoopAction::Stop,
            Ok(_) => LoopAction::Sleep(interval),
        }
    }

    /// Sleep, returning true if the user interrupted instead.
    async fn sleep_or_interrupt(duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            result = signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::warn!(error = %e, "interrupt handler unavailable");
                }
                true
            }
        }
    }

    async fn announce_startup(&self) {
        let ledger = self.coordinator.ledger();
        let (title, body) =
            notify::startup_message(ledger.targets(), ledger.terms(), self.interval);
        if let Err(e) = self.sink.send(&title, &body).await {
            tracing::warn!(error = %e, "startup notification failed");
        }
    }

    async fn announce_completion(&self) {
        let (title, body) = notify::completion_message(&self.coordinator.ledger().snapshot());
        // Accepted degraded behavior: a lost summary at mission-complete
        // still stops the monitor.
        if let Err(e) = self.sink.send(&title, &body).await {
            tracing::error!(error = %e, "completion notification failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(found: bool) -> Result<bool> {
        Ok(found)
    }

    fn err() -> Result<bool> {
        Err(anyhow::anyhow!("boom"))
    }

    const INTERVAL: Duration = Duration::from_secs(300);

    #[test]
    fn complete_with_auto_stop_stops() {
        assert_eq!(
            Monitor::next_action(&ok(true), true, true, INTERVAL),
            LoopAction::Stop
        );
    }

    #[test]
    fn complete_without_auto_stop_keeps_running() {
        assert_eq!(
            Monitor::next_action(&ok(false), true, false, INTERVAL),
            LoopAction::Sleep(INTERVAL)
        );
    }

    #[test]
    fn incomplete_sleeps_configured_interval() {
        assert_eq!(
            Monitor::next_action(&ok(true), false, true, INTERVAL),
            LoopAction::Sleep(INTERVAL)
        );
    }

    #[test]
    fn cycle_error_uses_fallback_interval() {
        assert_eq!(
            Monitor::next_action(&err(), false, true, INTERVAL),
            LoopAction::SleepAfterError(ERROR_RETRY_INTERVAL)
        );
    }

    #[test]
    fn cycle_error_beats_completion() {
        // A failed cycle cannot be trusted for a completion decision.
        assert_eq!(
            Monitor::next_action(&err(), true, true, INTERVAL),
            LoopAction::SleepAfterError(ERROR_RETRY_INTERVAL)
        );
    }
}
