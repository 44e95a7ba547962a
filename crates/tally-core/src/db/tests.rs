//! Database tests

use super::*;
use crate::duplicates::DuplicateCandidate;
use crate::models::*;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;

    const USER: &str = "shopper@example.com";

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn item(name: &str, category: &str, price: f64) -> NewLineItem {
        NewLineItem {
            item_code: Some("57554".to_string()),
            raw_description: name.to_uppercase(),
            normalized_name: Some(name.to_string()),
            category: Some(category.to_string()),
            subcategory: None,
            quantity: 1.0,
            total_price: price,
            is_taxable: false,
            is_discount: price < 0.0,
        }
    }

    fn receipt(store: &str, on: &str, items: Vec<NewLineItem>) -> NewReceipt {
        let total: f64 = items.iter().map(|i| i.total_price).sum();
        NewReceipt {
            store_name: store.to_string(),
            store_location: Some("Seattle, WA".to_string()),
            purchase_date: date(on),
            subtotal: total,
            tax: 0.0,
            total,
            item_count: items.len() as i64,
            file_path: None,
            raw_json: Some("{}".to_string()),
            line_items: items,
        }
    }

    #[test]
    fn test_in_memory_db() {
        let db = Database::in_memory().unwrap();
        let receipts = db.list_receipts(USER, 50).unwrap();
        assert!(receipts.is_empty());
    }

    #[test]
    fn test_schema_tables_exist() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn().unwrap();

        for table in ["receipts", "line_items", "line_item_edits", "audit_log"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
                    params![table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {}", table);
        }
    }

    #[test]
    fn test_receipt_round_trip() {
        let db = Database::in_memory().unwrap();
        let id = db
            .create_receipt(
                USER,
                &receipt(
                    "Costco",
                    "2024-03-01",
                    vec![item("Milk", "Grocery", 4.0), item("Coupon", "Grocery", -1.0)],
                ),
            )
            .unwrap();

        let saved = db.get_receipt(USER, id).unwrap().unwrap();
        assert_eq!(saved.store_name, "Costco");
        assert_eq!(saved.user_id, USER);
        assert_eq!(saved.purchase_date, date("2024-03-01"));
        assert_eq!(saved.total, 3.0);
        assert_eq!(saved.item_count, 2);
        assert_eq!(saved.raw_json.as_deref(), Some("{}"));
        assert_eq!(saved.line_items.len(), 2);
        assert_eq!(saved.line_items[0].normalized_name.as_deref(), Some("Milk"));
        assert!(saved.line_items[1].is_discount);
        assert_eq!(saved.line_items[1].total_price, -1.0);
    }

    #[test]
    fn test_create_requires_user() {
        let db = Database::in_memory().unwrap();
        let result = db.create_receipt("  ", &receipt("Costco", "2024-03-01", vec![]));
        assert!(matches!(result, Err(Error::Unauthenticated)));

        let count: i64 = db
            .conn()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM receipts", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_receipts_scoped_to_user() {
        let db = Database::in_memory().unwrap();
        let id = db
            .create_receipt(USER, &receipt("Costco", "2024-03-01", vec![]))
            .unwrap();

        assert!(db.get_receipt("other@example.com", id).unwrap().is_none());
        assert!(db.list_receipts("other@example.com", 50).unwrap().is_empty());
        assert!(db.delete_receipt("other@example.com", id).unwrap().is_none());
        assert!(db.get_receipt(USER, id).unwrap().is_some());
    }

    #[test]
    fn test_list_newest_purchase_first_with_limit() {
        let db = Database::in_memory().unwrap();
        db.create_receipt(USER, &receipt("A", "2024-01-05", vec![]))
            .unwrap();
        db.create_receipt(USER, &receipt("B", "2024-03-05", vec![]))
            .unwrap();
        db.create_receipt(USER, &receipt("C", "2024-02-05", vec![]))
            .unwrap();

        let stores: Vec<_> = db
            .list_receipts(USER, 2)
            .unwrap()
            .into_iter()
            .map(|r| r.store_name)
            .collect();
        assert_eq!(stores, vec!["B", "C"]);
    }

    #[test]
    fn test_delete_removes_receipt_and_items() {
        let db = Database::in_memory().unwrap();
        let id = db
            .create_receipt(
                USER,
                &receipt("Costco", "2024-03-01", vec![item("Milk", "Grocery", 4.0)]),
            )
            .unwrap();

        let deleted = db.delete_receipt(USER, id).unwrap().unwrap();
        assert_eq!(deleted.id, id);
        assert_eq!(deleted.line_items.len(), 1);

        assert!(db.get_receipt(USER, id).unwrap().is_none());
        let items: i64 = db
            .conn()
            .unwrap()
            .query_row(
                "SELECT COUNT(*) FROM line_items WHERE receipt_id = ?",
                params![id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(items, 0);

        // Second delete is a no-op
        assert!(db.delete_receipt(USER, id).unwrap().is_none());
    }

    #[test]
    fn test_file_path_in_use() {
        let db = Database::in_memory().unwrap();
        let mut new = receipt("Costco", "2024-03-01", vec![item("Milk", "Grocery", 4.99)]);
        new.file_path = Some("shopper-example-com/20240301_120000_abc.pdf".to_string());
        let id = db.create_receipt(USER, &new).unwrap();

        let path = "shopper-example-com/20240301_120000_abc.pdf";
        assert!(db.file_path_in_use(USER, path).unwrap());
        assert!(!db.file_path_in_use("other@example.com", path).unwrap());

        db.delete_receipt(USER, id).unwrap();
        assert!(!db.file_path_in_use(USER, path).unwrap());
    }

    #[test]
    fn test_find_duplicate() {
        let db = Database::in_memory().unwrap();
        let id = db
            .create_receipt(
                USER,
                &receipt("Costco Wholesale", "2024-03-01", vec![item("Milk", "Grocery", 4.0)]),
            )
            .unwrap();

        let mut candidate = DuplicateCandidate {
            store_name: "COSTCO  WHOLESALE".to_string(),
            purchase_date: date("2024-03-01"),
            total: 4.001,
            item_count: 1,
        };
        let check = db.find_duplicate(USER, &candidate).unwrap();
        assert!(check.is_duplicate);
        assert_eq!(check.existing_id, Some(id));

        // Another user's receipts never count
        let check = db.find_duplicate("other@example.com", &candidate).unwrap();
        assert!(!check.is_duplicate);

        candidate.total = 4.50;
        let check = db.find_duplicate(USER, &candidate).unwrap();
        assert_eq!(check, DuplicateCheck::default());
    }

    #[test]
    fn test_update_line_item_records_edit() {
        let db = Database::in_memory().unwrap();
        let id = db
            .create_receipt(
                USER,
                &receipt("Costco", "2024-03-01", vec![item("KS Towel", "Other", 19.99)]),
            )
            .unwrap();
        let item_id = db.get_receipt(USER, id).unwrap().unwrap().line_items[0].id;

        let updated = db
            .update_line_item(USER, item_id, EditableField::Category, Some("Household"), USER)
            .unwrap();
        assert_eq!(updated.category.as_deref(), Some("Household"));

        let edits = db.list_line_item_edits(USER, item_id).unwrap();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].field, EditableField::Category);
        assert_eq!(edits[0].old_value.as_deref(), Some("Other"));
        assert_eq!(edits[0].new_value.as_deref(), Some("Household"));
        assert_eq!(edits[0].edited_by, USER);

        let receipt_edits = db.list_receipt_edits(USER, id).unwrap();
        assert_eq!(receipt_edits.len(), 1);
    }

    #[test]
    fn test_update_line_item_unchanged_value_is_noop() {
        let db = Database::in_memory().unwrap();
        let id = db
            .create_receipt(
                USER,
                &receipt("Costco", "2024-03-01", vec![item("Milk", "Grocery", 4.0)]),
            )
            .unwrap();
        let item_id = db.get_receipt(USER, id).unwrap().unwrap().line_items[0].id;

        db.update_line_item(USER, item_id, EditableField::NormalizedName, Some(" Milk "), USER)
            .unwrap();
        assert!(db.list_line_item_edits(USER, item_id).unwrap().is_empty());

        // Blank clears the field
        let cleared = db
            .update_line_item(USER, item_id, EditableField::Subcategory, Some("Dairy"), USER)
            .and_then(|_| {
                db.update_line_item(USER, item_id, EditableField::Subcategory, Some(""), USER)
            })
            .unwrap();
        assert!(cleared.subcategory.is_none());
        assert_eq!(db.list_line_item_edits(USER, item_id).unwrap().len(), 2);
    }

    #[test]
    fn test_update_missing_line_item() {
        let db = Database::in_memory().unwrap();
        let result = db.update_line_item(USER, 999, EditableField::Category, Some("Pet"), USER);
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_line_item_edits_are_append_only() {
        let db = Database::in_memory().unwrap();
        let id = db
            .create_receipt(
                USER,
                &receipt("Costco", "2024-03-01", vec![item("Milk", "Grocery", 4.0)]),
            )
            .unwrap();
        let item_id = db.get_receipt(USER, id).unwrap().unwrap().line_items[0].id;
        db.update_line_item(USER, item_id, EditableField::Category, Some("Dairy"), USER)
            .unwrap();

        let conn = db.conn().unwrap();
        assert!(conn
            .execute("UPDATE line_item_edits SET new_value = 'x'", [])
            .is_err());
        assert!(conn.execute("DELETE FROM line_item_edits", []).is_err());
        drop(conn);

        // History outlives the line item
        db.delete_receipt(USER, id).unwrap();
        let edits = db.list_line_item_edits(USER, item_id).unwrap();
        assert_eq!(edits.len(), 1);
    }

    #[test]
    fn test_dashboard_views() {
        let db = Database::in_memory().unwrap();
        db.create_receipt(
            USER,
            &receipt(
                "Costco",
                "2024-03-01",
                vec![item("Milk", "Grocery", 4.0), item("Towels", "Household", 20.0)],
            ),
        )
        .unwrap();
        db.create_receipt(
            USER,
            &receipt("Costco", "2024-03-08", vec![item("Milk", "Grocery", 4.5)]),
        )
        .unwrap();
        db.create_receipt(
            USER,
            &receipt("Costco", "2024-02-10", vec![item("Bread", "Grocery", 10.0)]),
        )
        .unwrap();

        let today = date("2024-03-15");

        let categories = db
            .category_breakdown(USER, TimeRange::ThisMonth, today)
            .unwrap();
        assert_eq!(categories[0].category, "Household");
        assert_eq!(categories[1].category, "Grocery");
        assert_eq!(categories[1].total, 8.5);

        let recurring = db
            .recurring_items(USER, TimeRange::ThisMonth, today)
            .unwrap();
        assert_eq!(recurring.len(), 1);
        assert_eq!(recurring[0].name, "Milk");

        let changes = db.price_changes(USER).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].old_price, 4.0);
        assert_eq!(changes[0].new_price, 4.5);

        let summary = db
            .monthly_spending(USER, TimeRange::ThisMonth, today)
            .unwrap();
        assert_eq!(summary.total_spent, 28.5);
        assert_eq!(summary.receipt_count, 2);
        assert_eq!(summary.previous_period_total, 10.0);
        assert!((summary.period_over_period_change.unwrap() - 185.0).abs() < 1e-9);

        let top = db.top_items(USER, 2).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].name, "Towels");
        assert_eq!(top[1].name, "Bread");

        assert!(db.top_items("other@example.com", 10).unwrap().is_empty());
    }

    #[test]
    fn test_audit_log() {
        let db = Database::in_memory().unwrap();
        db.log_audit(USER, "list_receipts", Some("receipt"), None, None)
            .unwrap();
        db.log_audit(USER, "delete_receipt", Some("receipt"), Some(3), Some("Costco"))
            .unwrap();

        let entries = db.list_audit_log(10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "delete_receipt");
        assert_eq!(entries[0].entity_id, Some(3));
        assert_eq!(entries[1].action, "list_receipts");

        assert_eq!(db.list_audit_log(1).unwrap().len(), 1);
    }
}
