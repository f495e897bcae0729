//! Local filesystem snapshot store.
//!
//! Writes go to a sibling temp file which is flushed, synced, and renamed over
//! the snapshot, so a crash mid-write leaves either the old snapshot or the
//! new one, never a truncated file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::Product;
use crate::storage::{SnapshotData, SnapshotStore};

/// Snapshot stored as a single JSON file.
#[derive(Debug, Clone)]
pub struct LocalSnapshotStore {
    path: PathBuf,
}

impl LocalSnapshotStore {
    /// Create a store backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        self.ensure_dir().await?;

        let tmp = self.tmp_path();
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read the full snapshot document, if any.
    pub async fn read_snapshot(&self) -> Result<Option<SnapshotData>> {
        let Some(bytes) = self.read_bytes().await? else {
            return Ok(None);
        };
        let data = SnapshotData::from_slice(&bytes)
            .map_err(|e| AppError::corrupt_state(self.location(), e))?;
        Ok(Some(data))
    }
}

#[async_trait]
impl SnapshotStore for LocalSnapshotStore {
    async fn load(&self) -> Result<Vec<Product>> {
        match self.read_snapshot().await? {
            Some(data) => {
                log::debug!(
                    "Loaded {} products from {}",
                    data.products.len(),
                    self.location()
                );
                Ok(data.products)
            }
            None => {
                log::info!("No snapshot at {}", self.location());
                Ok(Vec::new())
            }
        }
    }

    async fn save(&self, products: &[Product]) -> Result<()> {
        let data = SnapshotData::new(products.to_vec());
        let bytes = serde_json::to_vec_pretty(&data)?;
        self.write_bytes(&bytes).await?;
        log::info!("Saved {} products to {}", data.count, self.location());
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
