//! Price change detection

use super::{purchase_histories, SpendingRecord};
use crate::models::PriceChange;

/// Prices closer than half a cent are the same price
const PRICE_EPSILON: f64 = 0.005;

/// Compare each product's earliest and latest price across all history
///
/// Needs at least two positive-price purchases. Products whose price did
/// not move are omitted. Sorted by absolute percent change, largest first.
pub fn price_changes<'a>(records: impl IntoIterator<Item = &'a SpendingRecord>) -> Vec<PriceChange> {
    let mut changes = Vec::new();

    for (name, history) in purchase_histories(records) {
        let (Some(&(first_date, old_price)), Some(&(last_date, new_price))) =
            (history.purchases.first(), history.purchases.last())
        else {
            continue;
        };
        if history.purchases.len() < 2 || (new_price - old_price).abs() < PRICE_EPSILON {
            continue;
        }

        changes.push(PriceChange {
            name,
            category: history.category,
            old_price,
            new_price,
            change_percent: (new_price - old_price) / old_price * 100.0,
            first_date,
            last_date,
        });
    }

    changes.sort_by(|a, b| b.change_percent.abs().total_cmp(&a.change_percent.abs()));
    changes
}
