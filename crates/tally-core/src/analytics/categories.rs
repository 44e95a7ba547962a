//! Category totals

use super::{GroupIndex, SpendingRecord};
use crate::models::CategorySpending;

/// Sum positive-price spending per category
///
/// Percentages are relative to the grand total of positive-price items and
/// are 0 when that total is 0. Sorted by total, largest first.
pub fn category_breakdown<'a>(
    records: impl IntoIterator<Item = &'a SpendingRecord>,
) -> Vec<CategorySpending> {
    let mut index: GroupIndex<&'a str, (f64, i64)> = GroupIndex::new();
    let mut grand_total = 0.0;

    for record in records {
        if !record.is_purchase() {
            continue;
        }
        grand_total += record.price;
        let (total, count) = index.group_mut(record.category_name(), || (0.0, 0));
        *total += record.price;
        *count += 1;
    }

    let mut categories: Vec<CategorySpending> = index
        .into_groups()
        .into_iter()
        .map(|(category, (total, item_count))| CategorySpending {
            category: category.to_string(),
            total,
            percentage: if grand_total > 0.0 {
                (total / grand_total) * 100.0
            } else {
                0.0
            },
            item_count,
        })
        .collect();

    categories.sort_by(|a, b| b.total.total_cmp(&a.total));
    categories
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn test_percentages_of_grand_total() {
        let records = vec![
            record("Bananas", "Grocery", 60.0, "2024-03-01"),
            record("Paper Towels", "Household", 50.0, "2024-03-01"),
            record("Chicken", "Grocery", 40.0, "2024-03-02"),
        ];

        let categories = category_breakdown(&records);
        assert_eq!(categories.len(), 2);

        assert_eq!(categories[0].category, "Grocery");
        assert_eq!(categories[0].total, 100.0);
        assert_eq!(categories[0].item_count, 2);
        assert!((categories[0].percentage - 66.666).abs() < 0.01);

        assert_eq!(categories[1].category, "Household");
        assert!((categories[1].percentage - 33.333).abs() < 0.01);
    }

    #[test]
    fn test_discounts_excluded() {
        let records = vec![
            record("Cheese", "Grocery", 12.0, "2024-03-01"),
            record("Cheese Coupon", "Grocery", -3.0, "2024-03-01"),
            record("Free Sample", "Grocery", 0.0, "2024-03-01"),
        ];

        let categories = category_breakdown(&records);
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].total, 12.0);
        assert_eq!(categories[0].item_count, 1);
        assert_eq!(categories[0].percentage, 100.0);
    }

    #[test]
    fn test_missing_category_grouped_as_other() {
        let mut uncategorized = record("Mystery", "", 5.0, "2024-03-01");
        uncategorized.category = None;
        let records = vec![uncategorized, record("Batteries", "", 7.0, "2024-03-01")];

        let categories = category_breakdown(&records);
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].category, "Other");
        assert_eq!(categories[0].item_count, 2);
    }

    #[test]
    fn test_empty_and_all_discount_inputs() {
        assert!(category_breakdown(&Vec::<SpendingRecord>::new()).is_empty());

        let only_discounts = vec![record("Coupon", "Grocery", -5.0, "2024-03-01")];
        assert!(category_breakdown(&only_discounts).is_empty());
    }

    #[test]
    fn test_percentages_sum_to_100() {
        let records: Vec<_> = [
            ("Grocery", 13.37),
            ("Household", 7.01),
            ("Pet", 44.44),
            ("Baby", 0.99),
            ("Grocery", 2.5),
            ("Electronics", 199.0),
        ]
        .iter()
        .map(|(cat, price)| record("Thing", cat, *price, "2024-03-01"))
        .collect();

        let sum: f64 = category_breakdown(&records)
            .iter()
            .map(|c| c.percentage)
            .sum();
        assert!((sum - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_sorted_descending() {
        let records = vec![
            record("A", "Pet", 5.0, "2024-03-01"),
            record("B", "Electronics", 500.0, "2024-03-01"),
            record("C", "Grocery", 50.0, "2024-03-01"),
        ];
        let order: Vec<_> = category_breakdown(&records)
            .into_iter()
            .map(|c| c.category)
            .collect();
        assert_eq!(order, vec!["Electronics", "Grocery", "Pet"]);
    }
}
