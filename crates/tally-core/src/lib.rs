//! Tally Core Library
//!
//! Shared functionality for the Tally receipt tracker:
//! - Database access and migrations (SQLCipher, connection pooling)
//! - Receipt extraction through a pluggable model backend
//! - Local document storage with signed download URLs
//! - Upload pipeline with duplicate detection
//! - Spending analytics (categories, recurring items, price changes, periods)
//! - Layered configuration

pub mod analytics;
pub mod config;
pub mod db;
pub mod duplicates;
pub mod error;
pub mod extract;
pub mod models;
pub mod storage;
pub mod upload;

/// Test utilities including mock Messages API server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::Config;
pub use db::{AuditEntry, Database};
pub use duplicates::DuplicateCandidate;
pub use error::{Error, ExtractionError, Result};
pub use extract::{
    Document, DocumentKind, ExtractionClient, MockExtractor, ParsedLineItem, ParsedReceipt,
    ReceiptExtractor,
};
pub use storage::{DocumentStore, SignedUrl};
pub use upload::{
    save_batch, save_receipt, FileOutcome, FileResult, SaveOutcome, SaveRequest, SaveResult,
    UploadPipeline, UploadedFile,
};
