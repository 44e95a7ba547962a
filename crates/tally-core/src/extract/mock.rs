//! Mock extraction backend for testing
//!
//! Useful for unit tests and development without API access.

use async_trait::async_trait;

use super::document::Document;
use super::parsing::parse_receipt_reply;
use super::types::{ParsedLineItem, ParsedReceipt};
use super::ReceiptExtractor;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MockMode {
    /// Same receipt for every document
    Canned,
    /// Treat the document bytes as the model's reply text
    Echo,
}

/// Mock extraction backend
#[derive(Debug, Clone)]
pub struct MockExtractor {
    mode: MockMode,
}

impl Default for MockExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExtractor {
    /// Return a fixed Costco receipt for every document
    pub fn new() -> Self {
        Self {
            mode: MockMode::Canned,
        }
    }

    /// Parse each document's bytes as if the model had replied with them
    ///
    /// Lets tests drive fenced replies and malformed JSON through the same
    /// parsing path as the real backend.
    pub fn echo() -> Self {
        Self {
            mode: MockMode::Echo,
        }
    }

    /// The receipt returned in canned mode
    pub fn canned_receipt() -> ParsedReceipt {
        let item = |code: &str, raw: &str, name: &str, category: &str, sub: &str, price: f64| {
            ParsedLineItem {
                item_code: Some(code.to_string()),
                raw_description: raw.to_string(),
                normalized_name: Some(name.to_string()),
                category: Some(category.to_string()),
                subcategory: Some(sub.to_string()),
                quantity: 1.0,
                total_price: price,
                is_taxable: category != "Grocery",
                is_discount: price < 0.0,
            }
        };

        ParsedReceipt {
            store_name: "Costco".to_string(),
            store_location: Some("Issaquah, WA".to_string()),
            purchase_date: "2024-03-01".to_string(),
            subtotal: 35.97,
            tax: 2.04,
            total: 38.01,
            item_count: Some(4),
            line_items: vec![
                item("57554", "KS TOWEL", "Kirkland Signature Paper Towels", "Household", "Paper Goods", 22.99),
                item("1048072", "ORG MILK", "Organic Milk", "Grocery", "Dairy", 12.99),
                item("3923", "BANANAS", "Bananas", "Grocery", "Produce", 1.99),
                item("57554", "/57554", "Paper Towels Discount", "Household", "Paper Goods", -2.00),
            ],
        }
    }
}

#[async_trait]
impl ReceiptExtractor for MockExtractor {
    async fn extract(&self, document: &Document) -> Result<ParsedReceipt> {
        match self.mode {
            MockMode::Canned => Ok(Self::canned_receipt()),
            MockMode::Echo => parse_receipt_reply(&String::from_utf8_lossy(&document.bytes)),
        }
    }

    fn model(&self) -> &str {
        "mock"
    }
}
