// src/config.rs

//! Configuration loading utilities.
//!
//! Loads `config.toml` from the storage directory, applies environment
//! overrides, and loads the site definition it points at.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::models::{Config, SiteConfig};

/// Resolve a configured path relative to the storage directory.
pub fn resolve_path(storage_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        storage_dir.join(path)
    }
}

/// Load configuration from `{storage_dir}/config.toml` with environment
/// overrides applied. Relative paths in `[monitor]` are resolved against
/// `storage_dir`.
pub fn load_config(storage_dir: &Path) -> Result<Config> {
    let mut config = Config::load_or_default(storage_dir.join("config.toml"))?;
    config.apply_env()?;

    config.monitor.state_file = resolve_path(storage_dir, &config.monitor.state_file);
    config.monitor.site_config = resolve_path(storage_dir, &config.monitor.site_config);
    Ok(config)
}

/// Load and validate both config and site definition.
pub fn load_all(storage_dir: &Path) -> Result<(Config, SiteConfig)> {
    let config = load_config(storage_dir)?;
    config.validate()?;

    let site = SiteConfig::load(&config.monitor.site_config)?;
    log::debug!(
        "Loaded site '{}' from {}",
        site.name,
        config.monitor.site_config.display()
    );

    Ok((config, site))
}
