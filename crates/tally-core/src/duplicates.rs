//! Likely-duplicate receipt detection
//!
//! Two receipts are the same purchase when their store names match after
//! trimming, whitespace collapsing and case folding, their purchase dates
//! are the same calendar day, their totals are within half a cent, and
//! their item counts are equal.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{NewReceipt, Receipt};

/// Totals closer than this are treated as equal
pub const TOTAL_TOLERANCE: f64 = 0.005;

/// The fields compared when looking for an existing copy of a receipt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateCandidate {
    pub store_name: String,
    pub purchase_date: NaiveDate,
    pub total: f64,
    pub item_count: i64,
}

impl From<&NewReceipt> for DuplicateCandidate {
    fn from(receipt: &NewReceipt) -> Self {
        Self {
            store_name: receipt.store_name.clone(),
            purchase_date: receipt.purchase_date,
            total: receipt.total,
            item_count: receipt.item_count,
        }
    }
}

impl DuplicateCandidate {
    /// Whether a stored receipt looks like the same purchase
    pub fn matches(&self, existing: &Receipt) -> bool {
        self.purchase_date == existing.purchase_date
            && self.item_count == existing.item_count
            && (self.total - existing.total).abs() < TOTAL_TOLERANCE
            && normalize_store_name(&self.store_name) == normalize_store_name(&existing.store_name)
    }
}

/// Lowercase, trim and collapse internal whitespace
pub fn normalize_store_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
