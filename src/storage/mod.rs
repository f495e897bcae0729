//! Snapshot persistence.
//!
//! The snapshot is the watcher's entire durable state: the product list seen
//! by the last completed cycle. It is read once per cycle and replaced in
//! full at the end of it.
//!
//! ## File Layout
//!
//! ```text
//! {storage_dir}/
//! ├── config.toml            # Watcher configuration
//! ├── sites/
//! │   └── digidirect.json    # Site definition
//! └── products_state.json    # Snapshot
//! ```

pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::Product;

// Re-export for convenience
pub use local::LocalSnapshotStore;

/// On-disk snapshot document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotData {
    /// When the snapshot was written
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Product count at write time
    #[serde(default)]
    pub count: usize,
    /// The products array
    pub products: Vec<Product>,
}

impl SnapshotData {
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            updated_at: Some(Utc::now()),
            count: products.len(),
            products,
        }
    }

    /// Parse a snapshot file. Older state files are a bare array of
    /// products; anything else must be the full document.
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        if value.is_array() {
            let products: Vec<Product> = serde_json::from_value(value)?;
            return Ok(Self {
                updated_at: None,
                count: products.len(),
                products,
            });
        }
        serde_json::from_value(value)
    }
}

/// Trait for snapshot storage backends.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the previous snapshot.
    ///
    /// An absent snapshot is an empty list (first run). A snapshot that
    /// exists but cannot be parsed is `AppError::CorruptState`.
    async fn load(&self) -> Result<Vec<Product>>;

    /// Replace the snapshot with `products`.
    async fn save(&self, products: &[Product]) -> Result<()>;

    /// Human-readable location, for logs.
    fn location(&self) -> String;
}
