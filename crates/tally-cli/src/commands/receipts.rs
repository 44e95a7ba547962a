//! Receipt management CLI commands

use std::io::{self, BufRead, Write};

use anyhow::{anyhow, Context, Result};
use tally_core::analytics::format::format_money;
use tally_core::models::{EditableField, Receipt};
use tally_core::{Database, DocumentStore};
use tracing::warn;

use super::truncate;

/// List receipts, newest purchase first
pub fn cmd_receipts_list(db: &Database, user: &str, limit: i64) -> Result<()> {
    let receipts = db.list_receipts(user, limit.max(1))?;

    if receipts.is_empty() {
        println!("No receipts yet. Upload some with:");
        println!("  tally upload receipt.pdf");
        return Ok(());
    }

    println!();
    println!("🧾 Receipts ({})", receipts.len());
    println!("{}", "─".repeat(70));

    for receipt in &receipts {
        println!(
            "  #{:<5} {}  {:<30} {:>10}  {} items",
            receipt.id,
            receipt.purchase_date,
            truncate(&receipt.store_name, 30),
            format_money(receipt.total),
            receipt.item_count
        );
    }

    println!();
    Ok(())
}

fn find_receipt(db: &Database, user: &str, id: i64) -> Result<Receipt> {
    db.get_receipt(user, id)?
        .ok_or_else(|| anyhow!("Receipt #{} not found", id))
}

/// Show one receipt with its line items
pub fn cmd_receipts_show(db: &Database, user: &str, id: i64, json: bool) -> Result<()> {
    let receipt = find_receipt(db, user, id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&receipt)?);
        return Ok(());
    }

    println!();
    println!("🧾 Receipt #{}: {}", receipt.id, receipt.store_name);
    if let Some(location) = &receipt.store_location {
        println!("   📍 {}", location);
    }
    println!("   📅 {}", receipt.purchase_date);
    if let Some(path) = &receipt.file_path {
        println!("   📄 {}", path);
    }
    println!("{}", "─".repeat(70));

    for item in &receipt.line_items {
        let name = item
            .normalized_name
            .as_deref()
            .unwrap_or(&item.raw_description);
        let category = match (&item.category, &item.subcategory) {
            (Some(c), Some(s)) => format!("{} / {}", c, s),
            (Some(c), None) => c.clone(),
            _ => "-".to_string(),
        };
        let marker = if item.is_discount { "🏷️ " } else { "  " };
        println!(
            "  {}[{:<4}] {:<32} {:<22} {:>10}",
            marker,
            item.id,
            truncate(name, 32),
            truncate(&category, 22),
            format_money(item.total_price)
        );
    }

    println!("{}", "─".repeat(70));
    println!("  {:<60} {:>10}", "Subtotal", format_money(receipt.subtotal));
    println!("  {:<60} {:>10}", "Tax", format_money(receipt.tax));
    println!("  {:<60} {:>10}", "Total", format_money(receipt.total));
    println!();

    Ok(())
}

/// Ask for a yes/no answer on stdin
fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read confirmation")?;

    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Delete a receipt, its line items and its stored document
pub fn cmd_receipts_delete(
    db: &Database,
    store: &DocumentStore,
    user: &str,
    id: i64,
    yes: bool,
) -> Result<()> {
    let receipt = find_receipt(db, user, id)?;

    if !yes
        && !confirm(&format!(
            "Delete receipt #{} ({} {}, {} items)?",
            receipt.id,
            receipt.store_name,
            format_money(receipt.total),
            receipt.line_items.len()
        ))?
    {
        println!("Cancelled");
        return Ok(());
    }

    let deleted = db
        .delete_receipt(user, id)?
        .ok_or_else(|| anyhow!("Receipt #{} not found", id))?;

    // Another receipt may have been saved from the same stored file
    if let Some(path) = &deleted.file_path {
        if !db.file_path_in_use(user, path)? {
            if let Err(e) = store.delete(path) {
                warn!(path = %path, error = %e, "Failed to remove stored document");
                println!("   ⚠️  Could not remove stored file {}: {}", path, e);
            }
        }
    }

    db.log_audit(
        user,
        "delete",
        Some("receipt"),
        Some(id),
        Some(&format!("store={}", deleted.store_name)),
    )?;

    println!(
        "🗑️  Deleted receipt #{} and {} line item(s)",
        id,
        deleted.line_items.len()
    );
    Ok(())
}

/// Correct a line item field, recording the edit
pub fn cmd_receipts_edit(
    db: &Database,
    user: &str,
    item_id: i64,
    field: &str,
    value: Option<&str>,
) -> Result<()> {
    let field: EditableField = field.parse().map_err(|e: String| anyhow!(e))?;

    let before = db
        .get_line_item(user, item_id)?
        .ok_or_else(|| anyhow!("Line item #{} not found", item_id))?;
    let old_value = before.field_value(field).map(str::to_string);

    let item = db.update_line_item(user, item_id, field, value, user)?;
    let new_value = item.field_value(field);

    if old_value.as_deref() == new_value {
        println!("No change: {} is already {:?}", field.as_str(), new_value.unwrap_or("-"));
        return Ok(());
    }

    db.log_audit(
        user,
        "update",
        Some("line_item"),
        Some(item_id),
        Some(&format!("field={}", field.as_str())),
    )?;

    println!(
        "✏️  #{} {}: {} → {}",
        item_id,
        field.as_str(),
        old_value.as_deref().unwrap_or("-"),
        new_value.unwrap_or("-")
    );
    Ok(())
}

/// Show the edit history of every line item on a receipt
pub fn cmd_receipts_history(db: &Database, user: &str, id: i64) -> Result<()> {
    let receipt = find_receipt(db, user, id)?;
    let edits = db.list_receipt_edits(user, id)?;

    if edits.is_empty() {
        println!("No edits recorded for receipt #{}", receipt.id);
        return Ok(());
    }

    println!();
    println!("📝 Edit history for receipt #{} ({})", receipt.id, receipt.store_name);
    println!("{}", "─".repeat(70));

    for edit in &edits {
        let item = receipt
            .line_items
            .iter()
            .find(|i| i.id == edit.line_item_id)
            .map(|i| i.raw_description.as_str())
            .unwrap_or("(deleted item)");
        println!(
            "  {}  {:<20} {}: {} → {}  ({})",
            edit.edited_at.format("%Y-%m-%d %H:%M"),
            truncate(item, 20),
            edit.field.as_str(),
            edit.old_value.as_deref().unwrap_or("-"),
            edit.new_value.as_deref().unwrap_or("-"),
            edit.edited_by
        );
    }

    println!();
    Ok(())
}
