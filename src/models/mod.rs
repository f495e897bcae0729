// src/models/mod.rs

//! Domain models for the watcher.

mod config;
mod product;
mod site;

// Re-export all public types
pub use config::{Config, MonitorConfig, ScraperConfig, TelegramConfig};
pub use product::Product;
pub use site::{ProductSelectors, SiteConfig};
