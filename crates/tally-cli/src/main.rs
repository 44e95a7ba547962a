//! Tally CLI - Receipt tracker
//!
//! Usage:
//!   tally init                     Initialize database
//!   tally upload receipt.pdf ...   Extract and save receipts
//!   tally dashboard --range R      Spending overview
//!   tally serve --port 3000        Start web server

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Upload {
            files,
            skip_duplicates,
            dry_run,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let config = commands::load_config(config_path)?;
            let extractor = commands::open_extractor(&config)?;
            let store = commands::open_store(&config)?;
            let options = commands::UploadOptions {
                skip_duplicates,
                dry_run,
            };
            commands::cmd_upload(&db, &extractor, &store, &cli.user, &files, options)
                .await
                .map(|_| ())
        }
        Commands::Receipts { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                None => commands::cmd_receipts_list(&db, &cli.user, 20),
                Some(ReceiptsAction::List { limit }) => {
                    commands::cmd_receipts_list(&db, &cli.user, limit)
                }
                Some(ReceiptsAction::Show { id, json }) => {
                    commands::cmd_receipts_show(&db, &cli.user, id, json)
                }
                Some(ReceiptsAction::Delete { id, yes }) => {
                    let config = commands::load_config(config_path)?;
                    let store = commands::open_store(&config)?;
                    commands::cmd_receipts_delete(&db, &store, &cli.user, id, yes)
                }
                Some(ReceiptsAction::Edit {
                    item_id,
                    field,
                    value,
                }) => commands::cmd_receipts_edit(&db, &cli.user, item_id, &field, value.as_deref()),
                Some(ReceiptsAction::History { id }) => {
                    commands::cmd_receipts_history(&db, &cli.user, id)
                }
            }
        }
        Commands::Dashboard { range } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let range = range.parse().map_err(|e: String| anyhow::anyhow!(e))?;
            commands::cmd_dashboard(&db, &cli.user, range, chrono::Local::now().date_naive())
        }
        Commands::TopItems { limit } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_top_items(&db, &cli.user, limit)
        }
        Commands::Audit { limit } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_audit(&db, limit)
        }
        Commands::Serve {
            port,
            host,
            no_auth,
            static_dir,
        } => {
            let config = commands::load_config(config_path)?;
            commands::cmd_serve(
                &cli.db,
                &host,
                port,
                no_auth,
                cli.no_encrypt,
                static_dir.as_deref(),
                &config,
            )
            .await
        }
    }
}
