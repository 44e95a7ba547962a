//! Receipt extraction gateway
//!
//! Turns a receipt image or PDF into structured data by calling an
//! external model.
//!
//! # Architecture
//!
//! - `ReceiptExtractor` trait: the one operation every backend provides
//! - `ExtractionClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backends: `AnthropicExtractor` (Messages API), `MockExtractor`
//!
//! # Usage
//!
//! ```rust,ignore
//! let config = Config::load(None)?;
//! let client = ExtractionClient::from_config(&config.extraction)?;
//!
//! let document = Document::detect(bytes, Some("receipt.pdf"), None)?;
//! let parsed = client.extract(&document).await?;
//! println!("{} on {}", parsed.store_name, parsed.purchase_date);
//! ```

pub mod anthropic;
pub mod document;
mod mock;
pub mod parsing;
pub mod prompt;
pub mod types;

pub use anthropic::AnthropicExtractor;
pub use document::{Document, DocumentKind};
pub use mock::MockExtractor;
pub use types::{ParsedLineItem, ParsedReceipt};

use async_trait::async_trait;

use crate::config::{ExtractionBackendKind, ExtractionConfig};
use crate::error::Result;

/// Interface for extraction backends
///
/// Backends should be Send + Sync to allow use across async tasks.
#[async_trait]
pub trait ReceiptExtractor: Send + Sync {
    /// Extract a structured receipt from one document
    async fn extract(&self, document: &Document) -> Result<ParsedReceipt>;

    /// Model name, for logs and status output
    fn model(&self) -> &str;
}

/// Concrete extraction client enum
#[derive(Clone)]
pub enum ExtractionClient {
    Anthropic(AnthropicExtractor),
    Mock(MockExtractor),
}

impl ExtractionClient {
    /// Build the configured backend
    ///
    /// The anthropic backend fails with `NotConfigured` when no API key is set.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self> {
        match config.backend {
            ExtractionBackendKind::Anthropic => {
                AnthropicExtractor::from_config(config).map(ExtractionClient::Anthropic)
            }
            ExtractionBackendKind::Mock => Ok(ExtractionClient::Mock(MockExtractor::new())),
        }
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        ExtractionClient::Mock(MockExtractor::new())
    }

    /// Create an echo mock backend for testing
    pub fn mock_echo() -> Self {
        ExtractionClient::Mock(MockExtractor::echo())
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            ExtractionClient::Anthropic(_) => "anthropic",
            ExtractionClient::Mock(_) => "mock",
        }
    }
}

#[async_trait]
impl ReceiptExtractor for ExtractionClient {
    async fn extract(&self, document: &Document) -> Result<ParsedReceipt> {
        match self {
            ExtractionClient::Anthropic(b) => b.extract(document).await,
            ExtractionClient::Mock(b) => b.extract(document).await,
        }
    }

    fn model(&self) -> &str {
        match self {
            ExtractionClient::Anthropic(b) => b.model(),
            ExtractionClient::Mock(b) => b.model(),
        }
    }
}
