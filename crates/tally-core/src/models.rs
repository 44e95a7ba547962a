//! Domain models for Tally

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A stored receipt with its line items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub id: i64,
    /// Owner of the receipt (authenticated user email)
    pub user_id: String,
    pub store_name: String,
    pub store_location: Option<String>,
    pub purchase_date: NaiveDate,
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
    pub item_count: i64,
    /// Document store path of the uploaded file
    pub file_path: Option<String>,
    /// Extracted receipt JSON, as received from the extraction backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_json: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
}

/// Receipt ready to be persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReceipt {
    pub store_name: String,
    pub store_location: Option<String>,
    pub purchase_date: NaiveDate,
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
    pub item_count: i64,
    pub file_path: Option<String>,
    pub raw_json: Option<String>,
    pub line_items: Vec<NewLineItem>,
}

/// One product entry on a receipt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub id: i64,
    pub receipt_id: i64,
    pub item_code: Option<String>,
    pub raw_description: String,
    pub normalized_name: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub quantity: f64,
    /// Negative for discounts
    pub total_price: f64,
    pub is_taxable: bool,
    pub is_discount: bool,
}

impl LineItem {
    /// Current value of an editable field
    pub fn field_value(&self, field: EditableField) -> Option<&str> {
        match field {
            EditableField::NormalizedName => self.normalized_name.as_deref(),
            EditableField::Category => self.category.as_deref(),
            EditableField::Subcategory => self.subcategory.as_deref(),
        }
    }
}

/// Line item ready to be persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLineItem {
    pub item_code: Option<String>,
    pub raw_description: String,
    pub normalized_name: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub quantity: f64,
    pub total_price: f64,
    pub is_taxable: bool,
    pub is_discount: bool,
}

/// Line item fields that can be corrected after extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditableField {
    NormalizedName,
    Category,
    Subcategory,
}

impl EditableField {
    /// Column name, also used as the recorded field name in the edit log
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NormalizedName => "normalized_name",
            Self::Category => "category",
            Self::Subcategory => "subcategory",
        }
    }

    pub fn all() -> &'static [EditableField] {
        &[Self::NormalizedName, Self::Category, Self::Subcategory]
    }
}

impl std::str::FromStr for EditableField {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "normalized_name" | "name" => Ok(Self::NormalizedName),
            "category" => Ok(Self::Category),
            "subcategory" => Ok(Self::Subcategory),
            _ => Err(format!(
                "Unknown field: {}. Editable: {}",
                s,
                Self::all()
                    .iter()
                    .map(|f| f.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
        }
    }
}

/// Append-only record of a line item correction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItemEdit {
    pub id: i64,
    pub line_item_id: i64,
    pub field: EditableField,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub edited_by: String,
    pub edited_at: DateTime<Utc>,
}

/// Dashboard time range selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TimeRange {
    ThisMonth,
    LastMonth,
    #[serde(rename = "last-3-months")]
    LastThreeMonths,
    #[default]
    AllTime,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ThisMonth => "this-month",
            Self::LastMonth => "last-month",
            Self::LastThreeMonths => "last-3-months",
            Self::AllTime => "all-time",
        }
    }

    pub fn all() -> &'static [TimeRange] {
        &[
            Self::ThisMonth,
            Self::LastMonth,
            Self::LastThreeMonths,
            Self::AllTime,
        ]
    }
}

impl std::str::FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "this-month" => Ok(Self::ThisMonth),
            "last-month" => Ok(Self::LastMonth),
            "last-3-months" => Ok(Self::LastThreeMonths),
            "all-time" | "all" => Ok(Self::AllTime),
            _ => Err(format!(
                "Unknown range: {}. Available: {}",
                s,
                Self::all()
                    .iter()
                    .map(|r| r.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
        }
    }
}

/// Spending in one category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySpending {
    pub category: String,
    pub total: f64,
    pub percentage: f64,
    pub item_count: i64,
}

/// A product bought repeatedly within a period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringItem {
    pub name: String,
    pub category: String,
    pub purchase_count: i64,
    pub total_spent: f64,
    pub avg_price: f64,
    pub avg_days_between: f64,
    pub monthly_estimate: f64,
    pub last_purchased: NaiveDate,
}

/// Price movement of a product between its first and latest purchase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceChange {
    pub name: String,
    pub category: String,
    pub old_price: f64,
    pub new_price: f64,
    pub change_percent: f64,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
}

/// Spending summary for a time range, compared against the prior window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlySpending {
    pub total_spent: f64,
    pub receipt_count: i64,
    pub item_count: i64,
    pub earliest_date: Option<NaiveDate>,
    pub latest_date: Option<NaiveDate>,
    pub previous_period_total: f64,
    /// None for all-time and when the prior window has no spending
    pub period_over_period_change: Option<f64>,
    pub period_label: String,
}

/// Most purchased products by spend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopItem {
    pub name: String,
    pub category: Option<String>,
    pub total_spent: f64,
    pub purchase_count: i64,
}

/// Result of the pre-save duplicate lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DuplicateCheck {
    pub is_duplicate: bool,
    pub existing_id: Option<i64>,
}
