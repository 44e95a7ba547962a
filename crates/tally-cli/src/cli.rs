//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tally - Track what you buy, receipt by receipt
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Self-hosted receipt tracker", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "tally.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set TALLY_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    /// Config file overriding the built-in defaults
    /// (default: ~/.config/tally/config.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// User the receipts belong to
    #[arg(long, global = true, env = "TALLY_USER", default_value = "local-dev")]
    pub user: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Extract receipts from PDFs or images and save them
    Upload {
        /// Receipt files (PDF, JPEG, PNG, WebP, GIF)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Do not save receipts that look like ones already stored
        #[arg(long)]
        skip_duplicates: bool,

        /// Extract and print only; nothing is stored
        #[arg(long)]
        dry_run: bool,
    },

    /// Manage saved receipts
    Receipts {
        #[command(subcommand)]
        action: Option<ReceiptsAction>,
    },

    /// Spending summary, categories, recurring items and price changes
    Dashboard {
        /// this-month, last-month, last-3-months, all-time
        #[arg(short, long, default_value = "this-month")]
        range: String,
    },

    /// Products with the highest total spend
    TopItems {
        /// Number of items to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show the audit log
    Audit {
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Disable authentication (for local development only)
        ///
        /// WARNING: Do not use this flag when exposing the server to a network.
        /// By default, the server requires Cloudflare Access authentication headers
        /// or an API key from TALLY_API_KEYS.
        #[arg(long)]
        no_auth: bool,

        /// Directory containing static files to serve (e.g., ui/dist)
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum ReceiptsAction {
    /// List receipts, newest purchase first
    List {
        /// Number of receipts to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Show one receipt with its line items
    Show {
        /// Receipt ID
        id: i64,

        /// Print the receipt as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a receipt, its line items and its stored file
    Delete {
        /// Receipt ID
        id: i64,

        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Correct a line item field
    Edit {
        /// Line item ID
        item_id: i64,

        /// normalized_name, category or subcategory
        #[arg(short, long)]
        field: String,

        /// New value (omit to clear the field)
        #[arg(long)]
        value: Option<String>,
    },

    /// Show the edit history of a receipt's line items
    History {
        /// Receipt ID
        id: i64,
    },
}
