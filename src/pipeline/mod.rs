//! Watch pipeline.
//!
//! - `diff`: classify changes between two snapshots
//! - `guard`: reject scrapes that must not replace the snapshot
//! - `cycle`: one load → acquire → compare → notify → save pass
//! - `scheduler`: run cycles on a fixed interval until shutdown

pub mod cycle;
pub mod diff;
pub mod guard;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

pub use cycle::{CycleOrchestrator, CycleOutcome, CycleStage};
pub use diff::{ChangeDetector, ChangeReport, PriceChange, compare, is_first_run};
pub use guard::{GuardConfig, GuardVerdict, SnapshotGuard};
pub use scheduler::{Scheduler, SchedulerStats, wait_for_shutdown};
