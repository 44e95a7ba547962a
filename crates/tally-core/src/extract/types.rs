//! Extraction payloads

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{NewLineItem, NewReceipt};

/// Receipt as returned by the extraction backend
///
/// Fields the model may omit carry defaults, so a sparse reply still
/// parses and the gaps surface during review instead of failing the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedReceipt {
    pub store_name: String,
    #[serde(default)]
    pub store_location: Option<String>,
    /// `YYYY-MM-DD`, validated on save
    pub purchase_date: String,
    #[serde(default)]
    pub subtotal: f64,
    #[serde(default)]
    pub tax: f64,
    pub total: f64,
    #[serde(default)]
    pub item_count: Option<i64>,
    #[serde(default)]
    pub line_items: Vec<ParsedLineItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedLineItem {
    #[serde(default)]
    pub item_code: Option<String>,
    pub raw_description: String,
    #[serde(default)]
    pub normalized_name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
    pub total_price: f64,
    #[serde(default)]
    pub is_taxable: bool,
    #[serde(default)]
    pub is_discount: bool,
}

fn default_quantity() -> f64 {
    1.0
}

impl ParsedReceipt {
    /// Parsed purchase date
    pub fn purchase_date(&self) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(self.purchase_date.trim(), "%Y-%m-%d").map_err(|_| {
            Error::InvalidData(format!(
                "Invalid purchase date '{}', expected YYYY-MM-DD",
                self.purchase_date
            ))
        })
    }

    /// Item count as reported, or the number of extracted lines when the
    /// model left it out
    pub fn effective_item_count(&self) -> i64 {
        match self.item_count {
            Some(count) if count > 0 => count,
            _ => self.line_items.len() as i64,
        }
    }

    /// Convert to a persistable receipt, keeping this payload as `raw_json`
    pub fn into_new_receipt(self, file_path: Option<String>) -> Result<NewReceipt> {
        let purchase_date = self.purchase_date()?;
        let item_count = self.effective_item_count();
        let raw_json = serde_json::to_string(&self)?;

        Ok(NewReceipt {
            store_name: self.store_name.trim().to_string(),
            store_location: self.store_location,
            purchase_date,
            subtotal: self.subtotal,
            tax: self.tax,
            total: self.total,
            item_count,
            file_path,
            raw_json: Some(raw_json),
            line_items: self
                .line_items
                .into_iter()
                .map(|item| NewLineItem {
                    item_code: item.item_code,
                    raw_description: item.raw_description,
                    normalized_name: item.normalized_name,
                    category: item.category,
                    subcategory: item.subcategory,
                    quantity: item.quantity,
                    total_price: item.total_price,
                    is_taxable: item.is_taxable,
                    is_discount: item.is_discount,
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ParsedReceipt {
        serde_json::from_str(
            r#"{
                "store_name": " Costco ",
                "purchase_date": "2024-03-01",
                "total": 23.98,
                "line_items": [
                    {"raw_description": "KS TOWEL", "total_price": 19.99},
                    {"raw_description": "MILK", "total_price": 3.99, "quantity": 2}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_sparse_reply_defaults() {
        let receipt = sample();
        assert_eq!(receipt.subtotal, 0.0);
        assert!(receipt.store_location.is_none());
        assert_eq!(receipt.line_items[0].quantity, 1.0);
        assert_eq!(receipt.line_items[1].quantity, 2.0);
        assert!(!receipt.line_items[0].is_discount);
    }

    #[test]
    fn test_into_new_receipt() {
        let receipt = sample();
        let new = receipt
            .clone()
            .into_new_receipt(Some("a/b.pdf".to_string()))
            .unwrap();

        assert_eq!(new.store_name, "Costco");
        assert_eq!(new.purchase_date.to_string(), "2024-03-01");
        assert_eq!(new.item_count, 2);
        assert_eq!(new.file_path.as_deref(), Some("a/b.pdf"));
        assert_eq!(new.line_items.len(), 2);

        let stored: ParsedReceipt = serde_json::from_str(new.raw_json.as_deref().unwrap()).unwrap();
        assert_eq!(stored, receipt);
    }

    #[test]
    fn test_reported_item_count_wins() {
        let mut receipt = sample();
        receipt.item_count = Some(5);
        assert_eq!(receipt.effective_item_count(), 5);
        receipt.item_count = Some(0);
        assert_eq!(receipt.effective_item_count(), 2);
    }

    #[test]
    fn test_invalid_date_rejected() {
        let mut receipt = sample();
        receipt.purchase_date = "03/01/2024".to_string();
        assert!(matches!(
            receipt.into_new_receipt(None),
            Err(Error::InvalidData(_))
        ));
    }
}
