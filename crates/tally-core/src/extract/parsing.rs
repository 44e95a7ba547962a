//! Model reply parsing

use crate::error::{ExtractionError, Result};

use super::types::ParsedReceipt;

/// Longest raw reply excerpt kept in error messages
const MAX_EXCERPT_CHARS: usize = 200;

/// Strip a surrounding markdown code fence, if any
pub fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text);
    text.trim()
}

/// Parse the model's text reply as a receipt
pub fn parse_receipt_reply(text: &str) -> Result<ParsedReceipt> {
    let json_text = strip_code_fence(text);
    serde_json::from_str(json_text).map_err(|e| {
        let excerpt: String = json_text.chars().take(MAX_EXCERPT_CHARS).collect();
        ExtractionError::MalformedJson(format!("{} | Raw: {}", e, excerpt)).into()
    })
}
