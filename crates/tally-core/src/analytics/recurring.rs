//! Recurring purchase detection

use super::{purchase_histories, SpendingRecord};
use crate::models::RecurringItem;

/// Days in the month used for monthly estimates
pub(crate) const DAYS_PER_MONTH: f64 = 30.0;

/// Products bought at least twice, with a monthly cost estimate
///
/// The estimate is `avg_price × 30 / avg_days_between`. Products whose
/// purchases all fall on the same day have no usable interval and are
/// left out. Sorted by monthly estimate, largest first.
pub fn recurring_items<'a>(
    records: impl IntoIterator<Item = &'a SpendingRecord>,
) -> Vec<RecurringItem> {
    let mut items = Vec::new();

    for (name, history) in purchase_histories(records) {
        let purchases = &history.purchases;
        if purchases.len() < 2 {
            continue;
        }

        let total_spent: f64 = purchases.iter().map(|(_, price)| price).sum();
        let avg_price = total_spent / purchases.len() as f64;

        let total_days: i64 = purchases
            .windows(2)
            .map(|pair| (pair[1].0 - pair[0].0).num_days())
            .sum();
        let avg_days_between = total_days as f64 / (purchases.len() - 1) as f64;

        if avg_days_between <= 0.0 {
            continue;
        }

        let Some(&(last_purchased, _)) = purchases.last() else {
            continue;
        };

        items.push(RecurringItem {
            name,
            category: history.category,
            purchase_count: purchases.len() as i64,
            total_spent,
            avg_price,
            avg_days_between,
            monthly_estimate: avg_price * (DAYS_PER_MONTH / avg_days_between),
            last_purchased,
        });
    }

    items.sort_by(|a, b| b.monthly_estimate.total_cmp(&a.monthly_estimate));
    items
}
