//! Periodic scheduling of watch cycles.
//!
//! Runs one cycle immediately, then waits `interval` after each cycle
//! finishes before starting the next. Cycles never overlap. Shutdown is
//! cooperative: the token is observed while sleeping and at the top of the
//! loop, and an in-flight cycle always runs to completion.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::models::MonitorConfig;
use crate::pipeline::cycle::{CycleOrchestrator, CycleOutcome};

/// Counters for a scheduler run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Cycles started
    pub cycles: usize,
    /// Cycles that ended in `CycleOutcome::Failed`
    pub failures: usize,
    /// Cycles that panicked
    pub panics: usize,
}

/// Fixed-interval cycle scheduler.
#[derive(Debug, Clone)]
pub struct Scheduler {
    interval: Duration,
    cooldown: Duration,
}

impl Scheduler {
    pub fn new(interval: Duration, cooldown: Duration) -> Self {
        Self { interval, cooldown }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(config.check_interval(), config.error_cooldown())
    }

    /// Run cycles until `token` is cancelled.
    pub async fn run(
        &self,
        orchestrator: &CycleOrchestrator,
        token: CancellationToken,
    ) -> SchedulerStats {
        let mut stats = SchedulerStats::default();

        while !token.is_cancelled() {
            stats.cycles += 1;
            match AssertUnwindSafe(orchestrator.run_cycle())
                .catch_unwind()
                .await
            {
                Ok(CycleOutcome::Failed { .. }) => stats.failures += 1,
                Ok(_) => {}
                Err(panic) => {
                    stats.panics += 1;
                    log::error!(
                        "Cycle panicked: {}. Cooling down for {}s",
                        panic_message(panic.as_ref()),
                        self.cooldown.as_secs()
                    );
                    if !sleep_or_cancel(self.cooldown, &token).await {
                        break;
                    }
                }
            }

            log::debug!("Next check in {}s", self.interval.as_secs());
            if !sleep_or_cancel(self.interval, &token).await {
                break;
            }
        }

        log::info!(
            "Scheduler stopped after {} cycles ({} failed, {} panicked)",
            stats.cycles,
            stats.failures,
            stats.panics
        );
        stats
    }
}

/// Sleep for `duration`. Returns false if cancelled first.
async fn sleep_or_cancel(duration: Duration, token: &CancellationToken) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Cancel `token` on SIGINT or SIGTERM.
pub async fn wait_for_shutdown(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Unable to listen for interrupt signal: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Unable to listen for terminate signal: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    log::info!("Shutdown requested, finishing current cycle...");
    token.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::pipeline::testing::{
        FailingSource, MemoryStore, PanicOnceSource, RecordingNotifier, StaticSource, product,
        site,
    };
    use crate::services::ProductSource;

    const INTERVAL: Duration = Duration::from_secs(300);
    const COOLDOWN: Duration = Duration::from_secs(60);

    fn orchestrator(source: Arc<dyn ProductSource>) -> CycleOrchestrator {
        CycleOrchestrator::new(
            Arc::new(site()),
            source,
            Arc::new(MemoryStore::default()),
            Arc::new(RecordingNotifier::default()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_until_cancelled() {
        let token = CancellationToken::new();
        let source = Arc::new(
            StaticSource::new(vec![product("A", "1")]).cancelling_after(3, token.clone()),
        );
        let scheduler = Scheduler::new(INTERVAL, COOLDOWN);

        let start = tokio::time::Instant::now();
        let stats = scheduler.run(&orchestrator(source.clone()), token).await;

        assert_eq!(stats.cycles, 3);
        assert_eq!(stats.failures, 0);
        assert_eq!(source.calls(), 3);
        // Two full intervals between three cycles; the third cycle's
        // cancellation cuts the final sleep short.
        let elapsed = start.elapsed();
        assert!(elapsed >= INTERVAL * 2 && elapsed < INTERVAL * 2 + Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_sleep_returns_promptly() {
        let token = CancellationToken::new();
        let source = Arc::new(StaticSource::new(vec![product("A", "1")]));
        let scheduler = Scheduler::new(INTERVAL, COOLDOWN);

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            canceller.cancel();
        });

        let start = tokio::time::Instant::now();
        let stats = scheduler.run(&orchestrator(source), token).await;

        assert_eq!(stats.cycles, 1);
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_cycles_are_counted_and_loop_continues() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(INTERVAL * 2 + Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let scheduler = Scheduler::new(INTERVAL, COOLDOWN);
        let stats = scheduler
            .run(&orchestrator(Arc::new(FailingSource)), token)
            .await;

        assert_eq!(stats.cycles, 3);
        assert_eq!(stats.failures, 3);
        assert_eq!(stats.panics, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panic_is_contained_with_cooldown() {
        let token = CancellationToken::new();
        let inner = StaticSource::new(vec![product("A", "1")]).cancelling_after(1, token.clone());
        let source = Arc::new(PanicOnceSource::new(inner));
        let scheduler = Scheduler::new(INTERVAL, COOLDOWN);

        let start = tokio::time::Instant::now();
        let stats = scheduler.run(&orchestrator(source), token).await;

        assert_eq!(stats.cycles, 2);
        assert_eq!(stats.panics, 1);
        let elapsed = start.elapsed();
        assert!(elapsed >= COOLDOWN + INTERVAL && elapsed < COOLDOWN + INTERVAL + Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_runs_nothing() {
        let token = CancellationToken::new();
        token.cancel();
        let source = Arc::new(StaticSource::new(vec![product("A", "1")]));

        let stats = Scheduler::new(INTERVAL, COOLDOWN)
            .run(&orchestrator(source.clone()), token)
            .await;

        assert_eq!(stats, SchedulerStats::default());
        assert_eq!(source.calls(), 0);
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
