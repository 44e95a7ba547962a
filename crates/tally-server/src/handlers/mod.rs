//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod audit;
pub mod auth;
pub mod dashboard;
pub mod files;
pub mod line_items;
pub mod receipts;

// Re-export all handlers for use in router
pub use audit::*;
pub use auth::*;
pub use dashboard::*;
pub use files::*;
pub use line_items::*;
pub use receipts::*;
