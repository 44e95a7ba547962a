//! Dashboard queries
//!
//! Loads a user's spending as flat records and hands them to the pure
//! functions in `analytics`. Every view is recomputed on each call.

use chrono::NaiveDate;
use rusqlite::params;

use super::{parse_date, Database};
use crate::analytics::{self, ReceiptTotal, SpendingRecord};
use crate::error::Result;
use crate::models::*;

impl Database {
    /// Every line item of a user flattened with its purchase date
    pub fn spending_records(&self, user_id: &str) -> Result<Vec<SpendingRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT r.purchase_date, li.normalized_name, li.raw_description, li.category,
                    li.total_price
             FROM line_items li
             JOIN receipts r ON r.id = li.receipt_id
             WHERE r.user_id = ?
             ORDER BY r.purchase_date ASC, li.id ASC",
        )?;

        let records = stmt
            .query_map(params![user_id], |row| {
                let date_str: String = row.get(0)?;
                Ok(SpendingRecord {
                    date: parse_date(0, &date_str)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    category: row.get(3)?,
                    price: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Receipt-level totals of a user
    pub fn receipt_totals(&self, user_id: &str) -> Result<Vec<ReceiptTotal>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT purchase_date, total, item_count FROM receipts
             WHERE user_id = ? ORDER BY purchase_date ASC",
        )?;

        let totals = stmt
            .query_map(params![user_id], |row| {
                let date_str: String = row.get(0)?;
                Ok(ReceiptTotal {
                    date: parse_date(0, &date_str)?,
                    total: row.get(1)?,
                    item_count: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(totals)
    }

    /// Spending per category within a time range
    pub fn category_breakdown(
        &self,
        user_id: &str,
        range: TimeRange,
        today: NaiveDate,
    ) -> Result<Vec<CategorySpending>> {
        let records = self.spending_records(user_id)?;
        let window = analytics::resolve_windows(range, today).current;
        Ok(analytics::category_breakdown(
            records.iter().filter(|r| window.contains(r.date)),
        ))
    }

    /// Recurring purchases within a time range
    pub fn recurring_items(
        &self,
        user_id: &str,
        range: TimeRange,
        today: NaiveDate,
    ) -> Result<Vec<RecurringItem>> {
        let records = self.spending_records(user_id)?;
        let window = analytics::resolve_windows(range, today).current;
        Ok(analytics::recurring_items(
            records.iter().filter(|r| window.contains(r.date)),
        ))
    }

    /// Price movements across all history
    pub fn price_changes(&self, user_id: &str) -> Result<Vec<PriceChange>> {
        let records = self.spending_records(user_id)?;
        Ok(analytics::price_changes(&records))
    }

    /// Spending summary for a time range with period-over-period change
    pub fn monthly_spending(
        &self,
        user_id: &str,
        range: TimeRange,
        today: NaiveDate,
    ) -> Result<MonthlySpending> {
        let totals = self.receipt_totals(user_id)?;
        Ok(analytics::period_comparison(&totals, range, today))
    }

    /// Products with the highest total spend
    pub fn top_items(&self, user_id: &str, limit: usize) -> Result<Vec<TopItem>> {
        let records = self.spending_records(user_id)?;
        Ok(analytics::top_items(&records, limit))
    }
}
