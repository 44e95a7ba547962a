//! Spending aggregation
//!
//! Pure computations over in-memory spending records. Nothing here touches
//! the database; `db::dashboard` loads the records and hands them over.
//!
//! - `categories` - category totals and percentage of grand total
//! - `recurring` - recurring purchase detection with monthly estimates
//! - `price_changes` - first vs latest price per product
//! - `period` - time range windows and period-over-period comparison
//! - `items` - top products by spend
//! - `format` - display helpers shared by the CLI and API clients
//!
//! Grouping goes through [`GroupIndex`]: a key → slot map over a vector of
//! groups, so groups come out in first-seen order before any sorting.

use std::collections::HashMap;
use std::hash::Hash;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

mod categories;
pub mod format;
mod items;
mod period;
mod price_changes;
mod recurring;

pub use categories::category_breakdown;
pub use items::top_items;
pub use period::{period_comparison, resolve_windows, DateWindow, PeriodWindows};
pub use price_changes::price_changes;
pub use recurring::recurring_items;

/// Group name for line items without a normalized name
pub const UNKNOWN_ITEM: &str = "Unknown";

/// Group name for line items without a category
pub const OTHER_CATEGORY: &str = "Other";

/// One line item flattened with its receipt's purchase date
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpendingRecord {
    pub date: NaiveDate,
    pub name: Option<String>,
    pub description: String,
    pub category: Option<String>,
    pub price: f64,
}

impl SpendingRecord {
    /// Normalized name, or "Unknown"
    pub fn item_name(&self) -> &str {
        non_empty(self.name.as_deref()).unwrap_or(UNKNOWN_ITEM)
    }

    /// Category, or "Other"
    pub fn category_name(&self) -> &str {
        non_empty(self.category.as_deref()).unwrap_or(OTHER_CATEGORY)
    }

    /// Normalized name, falling back to the description printed on the receipt
    pub fn display_name(&self) -> &str {
        non_empty(self.name.as_deref()).unwrap_or(&self.description)
    }

    /// Discounts and zero-price lines never count as spending
    pub fn is_purchase(&self) -> bool {
        self.price > 0.0
    }
}

/// Receipt-level totals used by the period comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptTotal {
    pub date: NaiveDate,
    pub total: f64,
    pub item_count: i64,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Insertion-ordered group-by table
pub(crate) struct GroupIndex<K, V> {
    slots: HashMap<K, usize>,
    groups: Vec<(K, V)>,
}

impl<K, V> GroupIndex<K, V>
where
    K: Eq + Hash + Clone,
{
    pub(crate) fn new() -> Self {
        Self {
            slots: HashMap::new(),
            groups: Vec::new(),
        }
    }

    /// Group for `key`, created with `init` on first sight
    pub(crate) fn group_mut(&mut self, key: K, init: impl FnOnce() -> V) -> &mut V {
        let slot = match self.slots.get(&key) {
            Some(&slot) => slot,
            None => {
                let slot = self.groups.len();
                self.slots.insert(key.clone(), slot);
                self.groups.push((key, init()));
                slot
            }
        };
        &mut self.groups[slot].1
    }

    pub(crate) fn into_groups(self) -> Vec<(K, V)> {
        self.groups
    }
}

/// Chronologically ordered purchases of one product
pub(crate) struct PurchaseHistory {
    pub(crate) category: String,
    pub(crate) purchases: Vec<(NaiveDate, f64)>,
}

/// Group positive-price records by normalized name
///
/// The category of a group is taken from its first record.
pub(crate) fn purchase_histories<'a>(
    records: impl IntoIterator<Item = &'a SpendingRecord>,
) -> Vec<(String, PurchaseHistory)> {
    let mut index: GroupIndex<&'a str, PurchaseHistory> = GroupIndex::new();

    for record in records {
        if !record.is_purchase() {
            continue;
        }
        index
            .group_mut(record.item_name(), || PurchaseHistory {
                category: record.category_name().to_string(),
                purchases: Vec::new(),
            })
            .purchases
            .push((record.date, record.price));
    }

    index
        .into_groups()
        .into_iter()
        .map(|(name, mut history)| {
            // Stable sort keeps same-day purchases in input order
            history.purchases.sort_by_key(|(date, _)| *date);
            (name.to_string(), history)
        })
        .collect()
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_record_fallback_names() {
        let r = SpendingRecord {
            date: date("2024-03-01"),
            name: Some("  ".to_string()),
            description: "KS TOWEL".to_string(),
            category: None,
            price: 19.99,
        };
        assert_eq!(r.item_name(), UNKNOWN_ITEM);
        assert_eq!(r.category_name(), OTHER_CATEGORY);
        assert_eq!(r.display_name(), "KS TOWEL");
    }

    #[test]
    fn test_group_index_keeps_first_seen_order() {
        let mut index: GroupIndex<&str, i32> = GroupIndex::new();
        *index.group_mut("b", || 0) += 1;
        *index.group_mut("a", || 0) += 1;
        *index.group_mut("b", || 0) += 1;

        let groups = index.into_groups();
        assert_eq!(groups, vec![("b", 2), ("a", 1)]);
    }

    #[test]
    fn test_purchase_histories_skip_discounts_and_sort() {
        let records = vec![
            record("Milk", "Grocery", 4.29, "2024-03-10"),
            record("Milk", "Dairy", 3.99, "2024-03-01"),
            record("Milk", "Grocery", -1.00, "2024-03-05"),
        ];

        let histories = purchase_histories(&records);
        assert_eq!(histories.len(), 1);

        let (name, history) = &histories[0];
        assert_eq!(name, "Milk");
        // Category from the first record seen, not the earliest date
        assert_eq!(history.category, "Grocery");
        assert_eq!(
            history.purchases,
            vec![(date("2024-03-01"), 3.99), (date("2024-03-10"), 4.29)]
        );
    }
}
