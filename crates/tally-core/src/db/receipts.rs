//! Receipt operations

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use super::{parse_date, parse_datetime, require_user, Database};
use crate::duplicates::DuplicateCandidate;
use crate::error::Result;
use crate::models::*;

const RECEIPT_COLUMNS: &str = "id, user_id, store_name, store_location, purchase_date, subtotal, \
     tax, total, item_count, file_path, raw_json, created_at";

pub(super) const LINE_ITEM_COLUMNS: &str = "id, receipt_id, item_code, raw_description, \
     normalized_name, category, subcategory, quantity, total_price, is_taxable, is_discount";

impl Database {
    /// Save a receipt and all of its line items in one transaction
    pub fn create_receipt(&self, user_id: &str, receipt: &NewReceipt) -> Result<i64> {
        require_user(user_id)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO receipts (user_id, store_name, store_location, purchase_date, subtotal,
             tax, total, item_count, file_path, raw_json)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                user_id,
                receipt.store_name,
                receipt.store_location,
                receipt.purchase_date.to_string(),
                receipt.subtotal,
                receipt.tax,
                receipt.total,
                receipt.item_count,
                receipt.file_path,
                receipt.raw_json,
            ],
        )?;
        let receipt_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO line_items (receipt_id, user_id, item_code, raw_description,
                 normalized_name, category, subcategory, quantity, total_price, is_taxable,
                 is_discount)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )?;
            for item in &receipt.line_items {
                stmt.execute(params![
                    receipt_id,
                    user_id,
                    item.item_code,
                    item.raw_description,
                    item.normalized_name,
                    item.category,
                    item.subcategory,
                    item.quantity,
                    item.total_price,
                    item.is_taxable,
                    item.is_discount,
                ])?;
            }
        }

        tx.commit()?;

        info!(
            receipt_id,
            store = %receipt.store_name,
            items = receipt.line_items.len(),
            "Saved receipt"
        );
        Ok(receipt_id)
    }

    /// List a user's receipts, newest purchase first, with line items
    pub fn list_receipts(&self, user_id: &str, limit: i64) -> Result<Vec<Receipt>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM receipts WHERE user_id = ?
             ORDER BY purchase_date DESC, id DESC LIMIT ?",
            RECEIPT_COLUMNS
        ))?;

        let mut receipts = stmt
            .query_map(params![user_id, limit], row_to_receipt)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for receipt in &mut receipts {
            receipt.line_items = load_line_items(&conn, receipt.id)?;
        }

        Ok(receipts)
    }

    /// Get one of a user's receipts with its line items
    pub fn get_receipt(&self, user_id: &str, id: i64) -> Result<Option<Receipt>> {
        let conn = self.conn()?;
        Ok(fetch_receipt(&conn, user_id, id)?)
    }

    /// Delete a receipt and its line items in one transaction
    ///
    /// Returns the deleted receipt, or None if the user has no receipt
    /// with that id. Stored documents are left to the caller.
    pub fn delete_receipt(&self, user_id: &str, id: i64) -> Result<Option<Receipt>> {
        require_user(user_id)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let Some(receipt) = fetch_receipt(&tx, user_id, id)? else {
            return Ok(None);
        };

        let items = tx.execute(
            "DELETE FROM line_items WHERE receipt_id = ? AND user_id = ?",
            params![id, user_id],
        )?;
        tx.execute(
            "DELETE FROM receipts WHERE id = ? AND user_id = ?",
            params![id, user_id],
        )?;
        tx.commit()?;

        info!(receipt_id = id, items, "Deleted receipt");
        Ok(Some(receipt))
    }

    /// Whether any of the user's receipts still points at a stored document
    pub fn file_path_in_use(&self, user_id: &str, file_path: &str) -> Result<bool> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM receipts WHERE user_id = ? AND file_path = ?",
            params![user_id, file_path],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Look for a stored receipt that is likely the same purchase
    pub fn find_duplicate(
        &self,
        user_id: &str,
        candidate: &DuplicateCandidate,
    ) -> Result<DuplicateCheck> {
        let conn = self.conn()?;
        // Date and item count are exact, so let SQLite narrow the candidates
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM receipts
             WHERE user_id = ? AND purchase_date = ? AND item_count = ?
             ORDER BY id ASC",
            RECEIPT_COLUMNS
        ))?;

        let existing = stmt
            .query_map(
                params![
                    user_id,
                    candidate.purchase_date.to_string(),
                    candidate.item_count
                ],
                row_to_receipt,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?
            .into_iter()
            .find(|receipt| candidate.matches(receipt));

        if let Some(receipt) = &existing {
            debug!(existing_id = receipt.id, store = %candidate.store_name, "Duplicate receipt found");
        }

        Ok(DuplicateCheck {
            is_duplicate: existing.is_some(),
            existing_id: existing.map(|r| r.id),
        })
    }

    /// Get one of a user's line items
    pub fn get_line_item(&self, user_id: &str, item_id: i64) -> Result<Option<LineItem>> {
        let conn = self.conn()?;
        Ok(fetch_line_item(&conn, user_id, item_id)?)
    }
}

fn fetch_receipt(conn: &Connection, user_id: &str, id: i64) -> rusqlite::Result<Option<Receipt>> {
    let receipt = conn
        .query_row(
            &format!(
                "SELECT {} FROM receipts WHERE id = ? AND user_id = ?",
                RECEIPT_COLUMNS
            ),
            params![id, user_id],
            row_to_receipt,
        )
        .optional()?;

    match receipt {
        Some(mut receipt) => {
            receipt.line_items = load_line_items(conn, receipt.id)?;
            Ok(Some(receipt))
        }
        None => Ok(None),
    }
}

pub(super) fn fetch_line_item(
    conn: &Connection,
    user_id: &str,
    item_id: i64,
) -> rusqlite::Result<Option<LineItem>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM line_items WHERE id = ? AND user_id = ?",
            LINE_ITEM_COLUMNS
        ),
        params![item_id, user_id],
        row_to_line_item,
    )
    .optional()
}

fn load_line_items(conn: &Connection, receipt_id: i64) -> rusqlite::Result<Vec<LineItem>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM line_items WHERE receipt_id = ? ORDER BY id ASC",
        LINE_ITEM_COLUMNS
    ))?;
    let items = stmt
        .query_map(params![receipt_id], row_to_line_item)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(items)
}

/// Helper to convert a row to Receipt (line items are loaded separately)
fn row_to_receipt(row: &rusqlite::Row) -> rusqlite::Result<Receipt> {
    let purchase_date_str: String = row.get(4)?;
    let created_at_str: String = row.get(11)?;

    Ok(Receipt {
        id: row.get(0)?,
        user_id: row.get(1)?,
        store_name: row.get(2)?,
        store_location: row.get(3)?,
        purchase_date: parse_date(4, &purchase_date_str)?,
        subtotal: row.get(5)?,
        tax: row.get(6)?,
        total: row.get(7)?,
        item_count: row.get(8)?,
        file_path: row.get(9)?,
        raw_json: row.get(10)?,
        created_at: parse_datetime(&created_at_str),
        line_items: Vec::new(),
    })
}

pub(super) fn row_to_line_item(row: &rusqlite::Row) -> rusqlite::Result<LineItem> {
    Ok(LineItem {
        id: row.get(0)?,
        receipt_id: row.get(1)?,
        item_code: row.get(2)?,
        raw_description: row.get(3)?,
        normalized_name: row.get(4)?,
        category: row.get(5)?,
        subcategory: row.get(6)?,
        quantity: row.get(7)?,
        total_price: row.get(8)?,
        is_taxable: row.get(9)?,
        is_discount: row.get(10)?,
    })
}
