//! Product record scraped from a listing page.

use std::hash::{Hash, Hasher};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A product as it appeared on the listing page.
///
/// Identity is the `sku` alone: two records with the same sku compare equal
/// and hash identically even when their prices or titles differ. Compare
/// `price` explicitly when the value matters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Stable unique identifier
    pub sku: String,

    /// Display title
    pub title: String,

    /// Current selling price
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,

    /// Pre-discount price, present when a discount applies
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub original_price: Option<Decimal>,

    /// Absolute link to the product page
    pub url: String,

    /// Image URL (empty string if none)
    #[serde(default)]
    pub image: String,

    /// Free-form discount label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<String>,
}

impl Product {
    /// Create a product with only the required fields set.
    pub fn new(
        sku: impl Into<String>,
        title: impl Into<String>,
        price: Decimal,
        url: impl Into<String>,
    ) -> Self {
        Self {
            sku: sku.into(),
            title: title.into(),
            price,
            original_price: None,
            url: url.into(),
            image: String::new(),
            discount: None,
        }
    }

    /// Whether the original price shows a real markdown.
    pub fn is_discounted(&self) -> bool {
        self.original_price.is_some_and(|original| original > self.price)
    }
}

impl PartialEq for Product {
    fn eq(&self, other: &Self) -> bool {
        self.sku == other.sku
    }
}

impl Eq for Product {}

impl Hash for Product {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sku.hash(state);
    }
}
