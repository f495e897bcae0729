// src/models/site.rs

//! Monitored site definition.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Everything the scraper needs to know about one listing page.
///
/// The watch cycle never looks inside this; it is passed through to the
/// product source untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Label used in logs and notifications
    pub name: String,

    /// Listing page URL
    pub url: String,

    /// Selector that must be present before the page counts as loaded
    pub wait_for_selector: String,

    /// Page load timeout in milliseconds
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout: u64,

    /// Per-field selectors
    pub selectors: ProductSelectors,
}

/// CSS selectors for extracting a product from its container element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSelectors {
    /// Selector for each product card
    pub product_container: String,

    /// Selector for the link element within a card
    pub url: String,

    /// Selector for the title element within a card
    pub title: String,

    /// Selector for the selling price within a card
    pub price: String,

    /// Selectors tried in order when `price` matches nothing parseable
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub price_fallbacks: Vec<String>,

    /// Selector for the pre-discount price within a card
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_price: Option<String>,

    /// Selector for the image element within a card
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Selector for the discount label within a card
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<String>,

    /// Attribute on the link element holding the sku
    #[serde(default = "default_sku_attribute")]
    pub sku_attribute: String,
}

fn default_wait_timeout() -> u64 {
    30_000
}

fn default_sku_attribute() -> String {
    "data-objectid".to_string()
}

impl SiteConfig {
    /// Load a site definition from a JSON file.
    ///
    /// Any failure here is a configuration error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            AppError::config(format!("Site config not found at {}: {e}", path.display()))
        })?;
        let site: SiteConfig = serde_json::from_str(&content).map_err(|e| {
            AppError::config(format!("Site config {} is invalid: {e}", path.display()))
        })?;
        site.validate()?;
        Ok(site)
    }

    /// Validate required fields.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::config("site.name is empty"));
        }
        url::Url::parse(&self.url)
            .map_err(|e| AppError::config(format!("site.url '{}' is invalid: {e}", self.url)))?;
        if self.selectors.product_container.trim().is_empty() {
            return Err(AppError::config("site.selectors.product_container is empty"));
        }
        if self.wait_timeout == 0 {
            return Err(AppError::config("site.wait_timeout must be > 0"));
        }
        Ok(())
    }
}
