//! Display helpers

use chrono::NaiveDate;

use super::recurring::DAYS_PER_MONTH;

/// Number of color slots used for category badges
pub const CATEGORY_COLOR_SLOTS: u8 = 8;

/// Format an amount as US dollars: `$1,234.56`, `-$3.00`
pub fn format_money(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let dollars = (cents / 100).to_string();

    let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3);
    for (i, ch) in dollars.chars().enumerate() {
        if i > 0 && (dollars.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}${}.{:02}", sign, grouped, cents % 100)
}

/// Describe an average purchase interval: "Every 4 days", "Every 2 weeks"
pub fn format_interval(days: f64) -> String {
    if days < 7.0 {
        format!("Every {} days", days.round())
    } else if days < 30.0 {
        let weeks = (days / 7.0).round();
        format!("Every {} week{}", weeks, if weeks == 1.0 { "" } else { "s" })
    } else {
        let months = (days / DAYS_PER_MONTH).round();
        format!("Every {} month{}", months, if months == 1.0 { "" } else { "s" })
    }
}

/// Average monthly spend over a date span, counting at least one month
pub fn monthly_average(total: f64, start: NaiveDate, end: NaiveDate) -> f64 {
    let days = (end - start).num_days().max(0) as f64;
    let months = (days / DAYS_PER_MONTH).max(1.0);
    total / months
}

/// Stable color slot (1-8) for a category badge
pub fn category_color_index(category: &str) -> u8 {
    match category {
        "Grocery" => 1,
        "Household" => 2,
        "Coffee & Drinks" => 3,
        "Snacks" => 4,
        "Health" => 5,
        "Personal Care" => 6,
        "Pet" => 7,
        "Other" => 8,
        _ => {
            let hash = category.encode_utf16().fold(0i32, |acc, unit| {
                i32::from(unit).wrapping_add(acc.wrapping_shl(5).wrapping_sub(acc))
            });
            (hash.unsigned_abs() % u32::from(CATEGORY_COLOR_SLOTS)) as u8 + 1
        }
    }
}
