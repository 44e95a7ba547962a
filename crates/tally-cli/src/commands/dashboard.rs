//! Dashboard and top-items commands

use std::io::IsTerminal;

use anyhow::Result;
use chrono::NaiveDate;
use tally_core::analytics::format::{
    category_color_index, format_interval, format_money, monthly_average,
};
use tally_core::analytics::resolve_windows;
use tally_core::models::TimeRange;
use tally_core::Database;

use super::truncate;

/// Width of the category bar chart
const BAR_WIDTH: usize = 24;

/// Rows shown for recurring items and price changes
const LIST_LIMIT: usize = 10;

/// Category name colored by its badge slot when writing to a terminal
fn category_label(category: &str, width: usize) -> String {
    let padded = format!("{:<width$}", truncate(category, width), width = width);
    if !std::io::stdout().is_terminal() {
        return padded;
    }
    // Slots 1-7 map to the basic ANSI colors, slot 8 to gray
    let code = match category_color_index(category) {
        8 => 90,
        slot => 30 + slot,
    };
    format!("\x1b[{}m{}\x1b[0m", code, padded)
}

fn bar(percentage: f64) -> String {
    let filled = ((percentage / 100.0) * BAR_WIDTH as f64).round() as usize;
    "█".repeat(filled.min(BAR_WIDTH))
}

pub fn cmd_dashboard(db: &Database, user: &str, range: TimeRange, today: NaiveDate) -> Result<()> {
    let summary = db.monthly_spending(user, range, today)?;
    let window = resolve_windows(range, today).current;

    println!();
    println!("╭─────────────────────────────────────────╮");
    println!("│           🧾 Tally Dashboard            │");
    println!("╰─────────────────────────────────────────╯");
    println!("  {} ({} to {})", summary.period_label, window.start, window.end);
    println!();
    println!("  💰 Spent:     {}", format_money(summary.total_spent));
    println!("  🧾 Receipts:  {}", summary.receipt_count);
    println!("  🛒 Items:     {}", summary.item_count);
    match summary.period_over_period_change {
        Some(change) => {
            let arrow = if change >= 0.0 { "📈" } else { "📉" };
            println!(
                "  {} vs prior: {:+.1}% ({})",
                arrow,
                change,
                format_money(summary.previous_period_total)
            );
        }
        None if range != TimeRange::AllTime => {
            println!("  ➖ vs prior: no spending in the prior period");
        }
        None => {}
    }

    // All-time averages over the span actually covered by receipts
    let start = match (range, summary.earliest_date) {
        (TimeRange::AllTime, Some(earliest)) => earliest,
        _ => window.start,
    };
    println!(
        "  📆 Monthly average: {}",
        format_money(monthly_average(summary.total_spent, start, window.end))
    );

    let categories = db.category_breakdown(user, range, today)?;
    if !categories.is_empty() {
        println!();
        println!("  📊 Categories");
        println!("     ─────────────────────────────");
        for category in &categories {
            println!(
                "     {} {:>10} {:>5.1}% {}",
                category_label(&category.category, 18),
                format_money(category.total),
                category.percentage,
                bar(category.percentage)
            );
        }
    }

    let recurring = db.recurring_items(user, range, today)?;
    if !recurring.is_empty() {
        println!();
        println!("  🔁 Recurring Items");
        println!("     ─────────────────────────────");
        for item in recurring.iter().take(LIST_LIMIT) {
            println!(
                "     {:<28} {:<16} ~{}/mo  (last {})",
                truncate(&item.name, 28),
                format_interval(item.avg_days_between),
                format_money(item.monthly_estimate),
                item.last_purchased
            );
        }
    }

    let changes = db.price_changes(user)?;
    if !changes.is_empty() {
        println!();
        println!("  💲 Price Changes");
        println!("     ─────────────────────────────");
        for change in changes.iter().take(LIST_LIMIT) {
            let arrow = if change.change_percent > 0.0 { "↑" } else { "↓" };
            println!(
                "     {:<28} {} → {}  {} {:.1}%",
                truncate(&change.name, 28),
                format_money(change.old_price),
                format_money(change.new_price),
                arrow,
                change.change_percent.abs()
            );
        }
    }

    if summary.receipt_count == 0 {
        println!();
        println!("  No receipts in this period. Try --range all-time");
    }

    db.log_audit(
        user,
        "view",
        Some("dashboard"),
        None,
        Some(&format!("range={}", range.as_str())),
    )?;

    println!();
    Ok(())
}

pub fn cmd_top_items(db: &Database, user: &str, limit: usize) -> Result<()> {
    let items = db.top_items(user, limit.max(1))?;

    if items.is_empty() {
        println!("No purchases recorded yet.");
        return Ok(());
    }

    println!();
    println!("🏆 Top {} Items", items.len());
    println!("{}", "─".repeat(70));

    for (rank, item) in items.iter().enumerate() {
        println!(
            "  {:>2}. {:<32} {} {:>10}  ×{}",
            rank + 1,
            truncate(&item.name, 32),
            category_label(item.category.as_deref().unwrap_or("Other"), 16),
            format_money(item.total_spent),
            item.purchase_count
        );
    }

    println!();
    Ok(())
}
