//! External collaborators of the watch cycle.
//!
//! - Product acquisition (`ProductSource`, implemented by `ProductScraper`)
//! - Change notification (`Notifier`, implemented by `TelegramNotifier`)

mod scraper;
mod telegram;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Product, SiteConfig};
use crate::pipeline::ChangeReport;

pub use self::scraper::ProductScraper;
pub use self::telegram::TelegramNotifier;

/// Source of the current product listing.
#[async_trait]
pub trait ProductSource: Send + Sync {
    /// Fetch every product currently listed on `site`.
    ///
    /// Fails with `AppError::Acquisition` on timeouts, HTTP failures, or
    /// missing expected content.
    async fn scrape(&self, site: &SiteConfig) -> Result<Vec<Product>>;
}

/// Tally of individual notification sends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub sent: usize,
    pub failed: usize,
}

impl Delivery {
    pub fn record(&mut self, ok: bool) {
        if ok {
            self.sent += 1;
        } else {
            self.failed += 1;
        }
    }

    /// True when something was attempted and nothing got through.
    pub fn all_failed(&self) -> bool {
        self.sent == 0 && self.failed > 0
    }
}

/// Best-effort change and error notifications.
///
/// Implementations log and swallow individual send failures; nothing here
/// returns an error.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Announce every change in `report`.
    async fn notify(&self, report: &ChangeReport, site_label: &str) -> Delivery;

    /// Announce a failed cycle. Returns whether the message was delivered.
    async fn notify_error(&self, message: &str) -> bool;

    /// Send a test message to verify the delivery channel.
    async fn test_connectivity(&self) -> bool;
}
