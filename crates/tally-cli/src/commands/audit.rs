//! Audit log command

use anyhow::Result;
use tally_core::Database;

use super::truncate;

pub fn cmd_audit(db: &Database, limit: i64) -> Result<()> {
    let entries = db.list_audit_log(limit.max(1))?;

    if entries.is_empty() {
        println!("Audit log is empty.");
        return Ok(());
    }

    println!();
    println!("📜 Audit Log (latest {})", entries.len());
    println!("{}", "─".repeat(90));

    for entry in &entries {
        let target = match (&entry.entity_type, entry.entity_id) {
            (Some(kind), Some(id)) => format!("{} #{}", kind, id),
            (Some(kind), None) => kind.clone(),
            _ => "-".to_string(),
        };
        println!(
            "  {}  {:<24} {:<16} {:<24} {}",
            entry.timestamp,
            truncate(&entry.user_email, 24),
            entry.action,
            truncate(&target, 24),
            entry.details.as_deref().unwrap_or("")
        );
    }

    println!();
    Ok(())
}
