//! Snapshot guard.
//!
//! Decides whether a freshly scraped product list may replace the stored
//! snapshot. An empty scrape is never trusted: a page that failed to render
//! would otherwise be read as "every product removed". A configurable drop
//! threshold can additionally reject suspiciously short lists.

use crate::models::Product;

/// Guard configuration.
#[derive(Debug, Clone, Default)]
pub struct GuardConfig {
    /// Maximum allowed drop percentage (1-100). `None` disables the check.
    pub max_drop_percent: Option<u8>,
}

/// Verdict of a guard check.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardVerdict {
    /// Safe to proceed with comparison and save
    Safe {
        current_count: usize,
        previous_count: usize,
    },
    /// No previous snapshot; the current list becomes the baseline
    FirstRun { current_count: usize },
    /// Drop exceeded the configured threshold
    Triggered {
        current_count: usize,
        previous_count: usize,
        drop_percent: f64,
    },
    /// Nothing was scraped
    Empty,
}

impl GuardVerdict {
    /// Whether the cycle may continue past acquisition.
    pub fn proceeds(&self) -> bool {
        matches!(self, Self::Safe { .. } | Self::FirstRun { .. })
    }
}

/// Guard against replacing a good snapshot with a bad scrape.
#[derive(Debug, Clone, Default)]
pub struct SnapshotGuard {
    config: GuardConfig,
}

impl SnapshotGuard {
    /// Create a guard that only rejects empty scrapes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a guard with custom configuration.
    pub fn with_config(config: GuardConfig) -> Self {
        Self { config }
    }

    /// Check the current scrape against the previous snapshot.
    pub fn check(&self, current: &[Product], previous: &[Product]) -> GuardVerdict {
        let current_count = current.len();
        let previous_count = previous.len();

        if current_count == 0 {
            return GuardVerdict::Empty;
        }

        if previous_count == 0 {
            return GuardVerdict::FirstRun { current_count };
        }

        if let Some(max_drop) = self.config.max_drop_percent {
            if current_count < previous_count {
                let drop = previous_count - current_count;
                let drop_percent = (drop as f64 / previous_count as f64) * 100.0;

                if drop_percent > f64::from(max_drop) {
                    return GuardVerdict::Triggered {
                        current_count,
                        previous_count,
                        drop_percent,
                    };
                }
            }
        }

        GuardVerdict::Safe {
            current_count,
            previous_count,
        }
    }

    /// Check and log the verdict.
    pub fn inspect(&self, current: &[Product], previous: &[Product]) -> GuardVerdict {
        let verdict = self.check(current, previous);
        match &verdict {
            GuardVerdict::Safe {
                current_count,
                previous_count,
            } => {
                log::debug!(
                    "Guard: SAFE ({} products, was {})",
                    current_count,
                    previous_count
                );
            }
            GuardVerdict::FirstRun { current_count } => {
                log::info!("Guard: FIRST RUN ({} products, no snapshot yet)", current_count);
            }
            GuardVerdict::Triggered {
                current_count,
                previous_count,
                drop_percent,
            } => {
                log::error!(
                    "Guard: TRIGGERED! {} → {} products ({:.1}% drop > {}% threshold)",
                    previous_count,
                    current_count,
                    drop_percent,
                    self.config.max_drop_percent.unwrap_or_default()
                );
            }
            GuardVerdict::Empty => {
                log::warn!("Guard: EMPTY RESULT - no products found in current scrape");
            }
        }
        verdict
    }
}
