//! Top products by spend

use super::{GroupIndex, SpendingRecord};
use crate::models::TopItem;

/// Products with the highest total spend
///
/// Products are keyed by normalized name, falling back to the raw receipt
/// description. Every line counts toward the total, discounts included, so
/// a product's total is what was actually paid for it.
pub fn top_items<'a>(
    records: impl IntoIterator<Item = &'a SpendingRecord>,
    limit: usize,
) -> Vec<TopItem> {
    let mut index: GroupIndex<&'a str, TopItem> = GroupIndex::new();

    for record in records {
        let item = index.group_mut(record.display_name(), || TopItem {
            name: record.display_name().to_string(),
            category: record.category.clone(),
            total_spent: 0.0,
            purchase_count: 0,
        });
        item.total_spent += record.price;
        item.purchase_count += 1;
    }

    let mut items: Vec<TopItem> = index
        .into_groups()
        .into_iter()
        .map(|(_, item)| item)
        .collect();
    items.sort_by(|a, b| b.total_spent.total_cmp(&a.total_spent));
    items.truncate(limit);
    items
}
