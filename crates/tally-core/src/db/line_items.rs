//! Line item edits and edit history

use rusqlite::params;
use tracing::info;

use super::receipts::{fetch_line_item, row_to_line_item, LINE_ITEM_COLUMNS};
use super::{parse_datetime, require_user, Database};
use crate::error::{Error, Result};
use crate::models::*;

const EDIT_COLUMNS: &str =
    "id, line_item_id, field, old_value, new_value, edited_by, edited_at";

impl Database {
    /// Change an editable field on a line item and record the edit
    ///
    /// The update and the history row are written in one transaction. Blank
    /// values clear the field. Setting a field to its current value changes
    /// nothing and records no edit.
    pub fn update_line_item(
        &self,
        user_id: &str,
        item_id: i64,
        field: EditableField,
        value: Option<&str>,
        edited_by: &str,
    ) -> Result<LineItem> {
        require_user(user_id)?;

        let new_value = value.map(str::trim).filter(|v| !v.is_empty());

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let item = fetch_line_item(&tx, user_id, item_id)?
            .ok_or_else(|| Error::NotFound(format!("line item {}", item_id)))?;

        let old_value = item.field_value(field).map(str::to_string);
        if old_value.as_deref() == new_value {
            return Ok(item);
        }

        // Column name comes from a fixed enum, never from input
        tx.execute(
            &format!(
                "UPDATE line_items SET {} = ? WHERE id = ? AND user_id = ?",
                field.as_str()
            ),
            params![new_value, item_id, user_id],
        )?;
        tx.execute(
            "INSERT INTO line_item_edits (line_item_id, user_id, field, old_value, new_value, edited_by)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![item_id, user_id, field.as_str(), old_value, new_value, edited_by],
        )?;

        let updated = tx.query_row(
            &format!("SELECT {} FROM line_items WHERE id = ?", LINE_ITEM_COLUMNS),
            params![item_id],
            row_to_line_item,
        )?;
        tx.commit()?;

        info!(item_id, field = field.as_str(), edited_by, "Edited line item");
        Ok(updated)
    }

    /// Edit history of one line item, oldest first
    pub fn list_line_item_edits(&self, user_id: &str, item_id: i64) -> Result<Vec<LineItemEdit>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM line_item_edits WHERE line_item_id = ? AND user_id = ?
             ORDER BY edited_at ASC, id ASC",
            EDIT_COLUMNS
        ))?;

        let edits = stmt
            .query_map(params![item_id, user_id], row_to_edit)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(edits)
    }

    /// Edit history of every line item on a receipt, oldest first
    pub fn list_receipt_edits(&self, user_id: &str, receipt_id: i64) -> Result<Vec<LineItemEdit>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT e.id, e.line_item_id, e.field, e.old_value, e.new_value, e.edited_by, e.edited_at
             FROM line_item_edits e
             JOIN line_items li ON li.id = e.line_item_id
             WHERE li.receipt_id = ? AND e.user_id = ?
             ORDER BY e.edited_at ASC, e.id ASC",
        )?;

        let edits = stmt
            .query_map(params![receipt_id, user_id], row_to_edit)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(edits)
    }
}

fn row_to_edit(row: &rusqlite::Row) -> rusqlite::Result<LineItemEdit> {
    let field_str: String = row.get(2)?;
    let edited_at_str: String = row.get(6)?;

    Ok(LineItemEdit {
        id: row.get(0)?,
        line_item_id: row.get(1)?,
        field: field_str.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                e.into(),
            )
        })?,
        old_value: row.get(3)?,
        new_value: row.get(4)?,
        edited_by: row.get(5)?,
        edited_at: parse_datetime(&edited_at_str),
    })
}
