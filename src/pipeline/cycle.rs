//! One watch cycle: load → acquire → compare → notify → save.
//!
//! ```text
//! START → LOAD → ACQUIRE ─┬─ empty / guard tripped ──────────→ ABORTED
//!                         ├─ first run ─────────────→ SAVE ──→ DONE
//!                         └─ COMPARE → NOTIFY ──────→ SAVE ──→ DONE
//! any stage error ───────────────────────────────────────────→ FAILED
//! ```
//!
//! Errors never escape [`CycleOrchestrator::run_cycle`]; they come back as
//! [`CycleOutcome::Failed`] after a best-effort error notification.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;

use crate::error::{AppError, Result};
use crate::models::{Product, SiteConfig};
use crate::pipeline::diff::{ChangeDetector, ChangeReport, is_first_run};
use crate::pipeline::guard::{GuardVerdict, SnapshotGuard};
use crate::services::{Delivery, Notifier, ProductSource};
use crate::storage::SnapshotStore;

/// Stage of a watch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    Load,
    Acquire,
    Compare,
    Notify,
    Save,
}

impl fmt::Display for CycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CycleStage::Load => "load",
            CycleStage::Acquire => "acquire",
            CycleStage::Compare => "compare",
            CycleStage::Notify => "notify",
            CycleStage::Save => "save",
        };
        f.write_str(name)
    }
}

/// How a cycle ended.
#[derive(Debug)]
pub enum CycleOutcome {
    /// First run: snapshot written, nothing announced
    Baseline { saved: usize },
    /// Compared, announced (if anything changed), and saved
    Completed {
        report: ChangeReport,
        delivery: Delivery,
        saved: usize,
    },
    /// Scrape rejected by the guard; snapshot untouched
    Aborted { verdict: GuardVerdict },
    /// A stage failed
    Failed { stage: CycleStage, error: AppError },
}

impl CycleOutcome {
    /// Whether the snapshot advanced.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Baseline { .. } | Self::Completed { .. })
    }

    /// Whether changes were found but no notification got through.
    pub fn delivery_failed(&self) -> bool {
        match self {
            Self::Completed { delivery, .. } => delivery.all_failed(),
            _ => false,
        }
    }
}

type StageResult<T> = std::result::Result<T, (CycleStage, AppError)>;

trait AtStage<T> {
    fn at(self, stage: CycleStage) -> StageResult<T>;
}

impl<T> AtStage<T> for Result<T> {
    fn at(self, stage: CycleStage) -> StageResult<T> {
        self.map_err(|e| (stage, e))
    }
}

/// Sequences a single watch cycle.
pub struct CycleOrchestrator {
    site: Arc<SiteConfig>,
    source: Arc<dyn ProductSource>,
    store: Arc<dyn SnapshotStore>,
    notifier: Arc<dyn Notifier>,
    detector: ChangeDetector,
    guard: SnapshotGuard,
}

impl CycleOrchestrator {
    pub fn new(
        site: Arc<SiteConfig>,
        source: Arc<dyn ProductSource>,
        store: Arc<dyn SnapshotStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            site,
            source,
            store,
            notifier,
            detector: ChangeDetector::new(),
            guard: SnapshotGuard::new(),
        }
    }

    /// Replace the default (empty-only) guard.
    pub fn with_guard(mut self, guard: SnapshotGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn site(&self) -> &SiteConfig {
        &self.site
    }

    /// Run one cycle to completion. Never returns an error.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let started = Utc::now();
        log::info!(
            "Starting cycle for {} at {}",
            self.site.name,
            started.format("%Y-%m-%d %H:%M:%S")
        );

        let outcome = match self.execute().await {
            Ok(outcome) => outcome,
            Err((stage, error)) => {
                log::error!("Cycle failed during {stage}: {error}");
                self.report_failure(stage, &error).await;
                CycleOutcome::Failed { stage, error }
            }
        };

        let elapsed = Utc::now() - started;
        match &outcome {
            CycleOutcome::Baseline { saved } => {
                log::info!("Baseline of {saved} products established")
            }
            CycleOutcome::Completed { report, .. } => {
                log::info!("Cycle completed: {}", report.summary())
            }
            CycleOutcome::Aborted { .. } => {
                log::warn!("Cycle aborted; snapshot left unchanged")
            }
            CycleOutcome::Failed { .. } => {}
        }
        log::debug!("Cycle took {} ms", elapsed.num_milliseconds());

        outcome
    }

    async fn execute(&self) -> StageResult<CycleOutcome> {
        self.enter(CycleStage::Load);
        let previous = self.store.load().await.at(CycleStage::Load)?;

        self.enter(CycleStage::Acquire);
        let current = self
            .source
            .scrape(&self.site)
            .await
            .at(CycleStage::Acquire)?;
        log::info!("Found {} products", current.len());

        let verdict = self.guard.inspect(&current, &previous);
        if !verdict.proceeds() {
            return Ok(CycleOutcome::Aborted { verdict });
        }

        if is_first_run(&previous) {
            log::info!("First run detected - establishing baseline, no notifications sent");
            let saved = self.save(&current).await?;
            return Ok(CycleOutcome::Baseline { saved });
        }

        self.enter(CycleStage::Compare);
        let report = self.detector.compare(&previous, &current);

        self.enter(CycleStage::Notify);
        let delivery = if report.has_changes() {
            log::info!("Changes detected: {}", report.summary());
            let delivery = self.notifier.notify(&report, &self.site.name).await;
            if delivery.failed > 0 {
                log::warn!(
                    "{} of {} notifications failed",
                    delivery.failed,
                    delivery.sent + delivery.failed
                );
            }
            delivery
        } else {
            log::info!("No changes detected");
            Delivery::default()
        };

        let saved = self.save(&current).await?;
        Ok(CycleOutcome::Completed {
            report,
            delivery,
            saved,
        })
    }

    async fn save(&self, products: &[Product]) -> StageResult<usize> {
        self.enter(CycleStage::Save);
        self.store.save(products).await.at(CycleStage::Save)?;
        Ok(products.len())
    }

    fn enter(&self, stage: CycleStage) {
        log::debug!("[{}] entering {stage}", self.site.name);
    }

    async fn report_failure(&self, stage: CycleStage, error: &AppError) {
        let message = format!("{} {stage} failed: {error}", self.site.name);
        if !self.notifier.notify_error(&message).await {
            log::error!("Could not send error notification");
        }
    }
}
