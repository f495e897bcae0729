//! Change detection between two product snapshots.
//!
//! Products are matched by sku only. A product present on both sides is a
//! price change when its price differs exactly; title, image, and discount
//! edits are not reported.
//!
//! Every list in a [`ChangeReport`] is sorted by sku.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::Product;

/// A product whose price moved between snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct PriceChange {
    /// The product as currently listed
    pub product: Product,
    pub old_price: Decimal,
    pub new_price: Decimal,
    /// `new_price - old_price`; negative for a markdown
    pub delta: Decimal,
}

impl PriceChange {
    pub fn is_increase(&self) -> bool {
        self.delta.is_sign_positive() && !self.delta.is_zero()
    }
}

/// Classification of what changed between two snapshots.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChangeReport {
    /// Present now, absent before
    pub new: Vec<Product>,
    /// Present before, absent now
    pub removed: Vec<Product>,
    /// Present on both sides with a different price
    pub price_changes: Vec<PriceChange>,
}

impl ChangeReport {
    /// Check if there are any changes.
    pub fn has_changes(&self) -> bool {
        !self.new.is_empty() || !self.removed.is_empty() || !self.price_changes.is_empty()
    }

    /// Get the total number of changes.
    pub fn change_count(&self) -> usize {
        self.new.len() + self.removed.len() + self.price_changes.len()
    }

    /// Short count summary for logs, e.g. `"3 new, 1 removed, 2 price changes"`.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if !self.new.is_empty() {
            parts.push(format!("{} new", self.new.len()));
        }
        if !self.removed.is_empty() {
            parts.push(format!("{} removed", self.removed.len()));
        }
        if !self.price_changes.is_empty() {
            parts.push(format!("{} price changes", self.price_changes.len()));
        }

        if parts.is_empty() {
            "No changes".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// True when there is no previous snapshot to compare against.
pub fn is_first_run(previous: &[Product]) -> bool {
    previous.is_empty()
}

/// Calculator for computing changes between snapshots.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeDetector;

impl ChangeDetector {
    pub fn new() -> Self {
        Self
    }

    /// Compare the previous snapshot with the current listing.
    pub fn compare(&self, previous: &[Product], current: &[Product]) -> ChangeReport {
        // Later duplicates overwrite earlier ones.
        let prev_map: BTreeMap<&str, &Product> =
            previous.iter().map(|p| (p.sku.as_str(), p)).collect();
        let curr_map: BTreeMap<&str, &Product> =
            current.iter().map(|p| (p.sku.as_str(), p)).collect();

        let prev_skus: BTreeSet<&str> = prev_map.keys().copied().collect();
        let curr_skus: BTreeSet<&str> = curr_map.keys().copied().collect();

        let new: Vec<Product> = curr_skus
            .difference(&prev_skus)
            .map(|sku| curr_map[sku].clone())
            .collect();

        let removed: Vec<Product> = prev_skus
            .difference(&curr_skus)
            .map(|sku| prev_map[sku].clone())
            .collect();

        let price_changes: Vec<PriceChange> = curr_skus
            .intersection(&prev_skus)
            .filter_map(|sku| {
                let prev = prev_map[sku];
                let curr = curr_map[sku];
                (prev.price != curr.price).then(|| PriceChange {
                    product: curr.clone(),
                    old_price: prev.price,
                    new_price: curr.price,
                    delta: curr.price - prev.price,
                })
            })
            .collect();

        let report = ChangeReport {
            new,
            removed,
            price_changes,
        };
        log::info!("Diff results: {}", report.summary());
        report
    }
}

/// Convenience function to compare two snapshots.
pub fn compare(previous: &[Product], current: &[Product]) -> ChangeReport {
    ChangeDetector::new().compare(previous, current)
}
