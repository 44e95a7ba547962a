//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `audit` - Audit log listing
//! - `core` - Init and shared utilities (open_db, config, extractor, store)
//! - `dashboard` - Spending overview and top items
//! - `receipts` - Receipt management (list, show, delete, edit, history)
//! - `serve` - Web server command
//! - `upload` - Batch extraction and save

pub mod audit;
pub mod core;
pub mod dashboard;
pub mod receipts;
pub mod serve;
pub mod upload;

// Re-export command functions for main.rs
pub use audit::*;
pub use core::*;
pub use dashboard::*;
pub use receipts::*;
pub use serve::*;
pub use upload::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
