//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `load_config`, `open_extractor`, `open_store` - Service setup from config
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{Context, Result};
use tally_core::{Config, Database, DocumentStore, ExtractionClient};

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .with_context(|| format!("Database path is not valid UTF-8: {}", db_path.display()))?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// Load defaults, the config file and environment overrides
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    Config::load(path).context("Failed to load configuration")
}

/// Build the configured extraction backend
pub fn open_extractor(config: &Config) -> Result<ExtractionClient> {
    ExtractionClient::from_config(&config.extraction).with_context(|| {
        format!(
            "Extraction backend unavailable (set {} or use backend = \"mock\")",
            tally_core::config::API_KEY_ENV
        )
    })
}

/// Open the document store
pub fn open_store(config: &Config) -> Result<DocumentStore> {
    DocumentStore::from_config(&config.storage).context("Failed to open document store")
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    // Opening runs the migrations
    open_db(db_path, no_encrypt)?;

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Upload receipts: tally upload receipt.pdf");
    println!("  2. Start web UI: tally serve");

    Ok(())
}
