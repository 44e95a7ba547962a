//! Time range windows and period-over-period comparison

use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;

use super::ReceiptTotal;
use crate::models::{MonthlySpending, TimeRange};

/// Inclusive date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Current and prior windows for a time range
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodWindows {
    pub range: TimeRange,
    pub current: DateWindow,
    /// None for all-time
    pub previous: Option<DateWindow>,
    pub label: String,
}

fn all_time_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// First day of the month `months_back` months before `today`'s month
fn month_start(today: NaiveDate, months_back: u32) -> NaiveDate {
    let first = today.with_day(1).unwrap_or(today);
    first
        .checked_sub_months(Months::new(months_back))
        .unwrap_or(first)
}

fn day_before(date: NaiveDate) -> NaiveDate {
    date.pred_opt().unwrap_or(date)
}

/// Resolve a time range relative to `today`
///
/// | range         | current                      | previous                          |
/// |---------------|------------------------------|-----------------------------------|
/// | this-month    | 1st of month → today         | previous calendar month           |
/// | last-month    | previous calendar month      | the month before that             |
/// | last-3-months | 1st of month-2 → today       | 1st of month-5 → end of month-3   |
/// | all-time      | 2000-01-01 → today           | none                              |
pub fn resolve_windows(range: TimeRange, today: NaiveDate) -> PeriodWindows {
    match range {
        TimeRange::ThisMonth => {
            let start = month_start(today, 0);
            PeriodWindows {
                range,
                current: DateWindow { start, end: today },
                previous: Some(DateWindow {
                    start: month_start(today, 1),
                    end: day_before(start),
                }),
                label: start.format("%B").to_string(),
            }
        }
        TimeRange::LastMonth => {
            let start = month_start(today, 1);
            PeriodWindows {
                range,
                current: DateWindow {
                    start,
                    end: day_before(month_start(today, 0)),
                },
                previous: Some(DateWindow {
                    start: month_start(today, 2),
                    end: day_before(start),
                }),
                label: start.format("%B").to_string(),
            }
        }
        TimeRange::LastThreeMonths => {
            let start = month_start(today, 2);
            PeriodWindows {
                range,
                current: DateWindow { start, end: today },
                previous: Some(DateWindow {
                    start: month_start(today, 5),
                    end: day_before(start),
                }),
                label: "Last 3 Months".to_string(),
            }
        }
        TimeRange::AllTime => PeriodWindows {
            range,
            current: DateWindow {
                start: all_time_start(),
                end: today,
            },
            previous: None,
            label: "All Time".to_string(),
        },
    }
}

/// Summarize receipt totals for a range and compare with the prior window
///
/// The change is `(current - previous) / previous × 100`, and is None for
/// all-time or when the prior window has no spending.
pub fn period_comparison(
    receipts: &[ReceiptTotal],
    range: TimeRange,
    today: NaiveDate,
) -> MonthlySpending {
    let windows = resolve_windows(range, today);

    let mut total_spent = 0.0;
    let mut receipt_count = 0;
    let mut item_count = 0;
    let mut earliest_date: Option<NaiveDate> = None;
    let mut latest_date: Option<NaiveDate> = None;

    for receipt in receipts.iter().filter(|r| windows.current.contains(r.date)) {
        total_spent += receipt.total;
        receipt_count += 1;
        item_count += receipt.item_count;
        earliest_date = Some(earliest_date.map_or(receipt.date, |d| d.min(receipt.date)));
        latest_date = Some(latest_date.map_or(receipt.date, |d| d.max(receipt.date)));
    }

    let previous_period_total: f64 = windows
        .previous
        .map(|window| {
            receipts
                .iter()
                .filter(|r| window.contains(r.date))
                .map(|r| r.total)
                .sum()
        })
        .unwrap_or(0.0);

    let period_over_period_change = if windows.previous.is_some() && previous_period_total > 0.0
    {
        Some((total_spent - previous_period_total) / previous_period_total * 100.0)
    } else {
        None
    };

    MonthlySpending {
        total_spent,
        receipt_count,
        item_count,
        earliest_date,
        latest_date,
        previous_period_total,
        period_over_period_change,
        period_label: windows.label,
    }
}
