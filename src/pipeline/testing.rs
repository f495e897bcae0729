//! In-memory collaborators for cycle and scheduler tests.

use std::str::FromStr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::{Product, ProductSelectors, SiteConfig};
use crate::pipeline::ChangeReport;
use crate::services::{Delivery, Notifier, ProductSource};
use crate::storage::SnapshotStore;

pub fn product(sku: &str, price: &str) -> Product {
    Product::new(
        sku,
        format!("Product {sku}"),
        Decimal::from_str(price).unwrap(),
        format!("https://shop.example.com/p/{sku}"),
    )
}

pub fn site() -> SiteConfig {
    SiteConfig {
        name: "Test Shop".into(),
        url: "https://shop.example.com/sale".into(),
        wait_for_selector: "div.product".into(),
        wait_timeout: 5_000,
        selectors: ProductSelectors {
            product_container: "div.product".into(),
            url: "a".into(),
            title: "h3".into(),
            price: "span.price".into(),
            price_fallbacks: Vec::new(),
            original_price: None,
            image: None,
            discount: None,
            sku_attribute: "data-objectid".into(),
        },
    }
}

/// Returns the same products on every scrape.
pub struct StaticSource {
    products: Vec<Product>,
    calls: AtomicUsize,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl StaticSource {
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            products,
            calls: AtomicUsize::new(0),
            cancel_after: None,
        }
    }

    /// Cancel `token` during the `n`th scrape.
    pub fn cancelling_after(mut self, n: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((n, token));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProductSource for StaticSource {
    async fn scrape(&self, _site: &SiteConfig) -> Result<Vec<Product>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((n, token)) = &self.cancel_after {
            if call >= *n {
                token.cancel();
            }
        }
        Ok(self.products.clone())
    }
}

/// Always fails to acquire.
pub struct FailingSource;

#[async_trait]
impl ProductSource for FailingSource {
    async fn scrape(&self, site: &SiteConfig) -> Result<Vec<Product>> {
        Err(AppError::acquisition(&site.name, "navigation timed out"))
    }
}

/// Panics on the first scrape, then behaves like the wrapped source.
pub struct PanicOnceSource {
    inner: StaticSource,
    panicked: AtomicUsize,
}

impl PanicOnceSource {
    pub fn new(inner: StaticSource) -> Self {
        Self {
            inner,
            panicked: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ProductSource for PanicOnceSource {
    async fn scrape(&self, site: &SiteConfig) -> Result<Vec<Product>> {
        if self.panicked.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("selector engine blew up");
        }
        self.inner.scrape(site).await
    }
}

/// Snapshot kept in memory.
#[derive(Default)]
pub struct MemoryStore {
    products: Mutex<Vec<Product>>,
    saves: AtomicUsize,
    fail_saves: bool,
}

impl MemoryStore {
    pub fn with(products: Vec<Product>) -> Self {
        Self {
            products: Mutex::new(products),
            ..Self::default()
        }
    }

    pub fn failing_saves(mut self) -> Self {
        self.fail_saves = true;
        self
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> Vec<Product> {
        self.products.lock().unwrap().clone()
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn load(&self) -> Result<Vec<Product>> {
        Ok(self.snapshot())
    }

    async fn save(&self, products: &[Product]) -> Result<()> {
        if self.fail_saves {
            return Err(AppError::Io(std::io::Error::other("disk full")));
        }
        *self.products.lock().unwrap() = products.to_vec();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

/// Records what would have been sent.
#[derive(Default)]
pub struct RecordingNotifier {
    reports: Mutex<Vec<(String, ChangeReport)>>,
    errors: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingNotifier {
    /// A notifier whose every send fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn reports(&self) -> Vec<(String, ChangeReport)> {
        self.reports.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, report: &ChangeReport, site_label: &str) -> Delivery {
        self.reports
            .lock()
            .unwrap()
            .push((site_label.to_string(), report.clone()));
        let count = report.change_count();
        if self.fail {
            Delivery {
                sent: 0,
                failed: count,
            }
        } else {
            Delivery {
                sent: count,
                failed: 0,
            }
        }
    }

    async fn notify_error(&self, message: &str) -> bool {
        self.errors.lock().unwrap().push(message.to_string());
        !self.fail
    }

    async fn test_connectivity(&self) -> bool {
        !self.fail
    }
}
