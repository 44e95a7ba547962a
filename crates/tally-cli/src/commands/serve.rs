//! Server command implementation

use std::path::Path;

use anyhow::{Context, Result};
use tally_core::config::ExtractionBackendKind;
use tally_core::Config;

use super::open_db;

pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: u16,
    no_auth: bool,
    no_encrypt: bool,
    static_dir: Option<&Path>,
    config: &Config,
) -> Result<()> {
    println!("🚀 Starting Tally web server...");
    println!("   Database: {}", db_path.display());
    println!("   Documents: {}", config.storage.root.display());
    println!("   Listening: http://{}:{}", host, port);
    if let Some(dir) = static_dir {
        println!("   Static files: {}", dir.display());
    }
    match config.extraction.backend {
        ExtractionBackendKind::Anthropic => {
            println!("   🤖 Extraction: {}", config.extraction.model)
        }
        ExtractionBackendKind::Mock => println!("   🤖 Extraction: mock (canned receipts)"),
    }

    let server_config = tally_server::ServerConfig {
        require_auth: !no_auth,
        allowed_origins: vec![],
        ..Default::default()
    }
    .with_env_api_keys();

    if no_auth {
        println!();
        println!("   ⚠️  Authentication DISABLED - do not expose to network!");
    } else {
        println!("   🔒 Authentication: Cloudflare Access (header)");
        if !server_config.api_keys.is_empty() {
            println!(
                "   🔑 API keys: {} configured ({})",
                server_config.api_keys.len(),
                tally_server::API_KEYS_ENV
            );
        }
    }
    if no_encrypt {
        println!("   ⚠️  Encryption DISABLED (--no-encrypt)");
    }
    println!();
    println!("   Press Ctrl+C to stop");

    let db = open_db(db_path, no_encrypt)?;

    let static_dir_str = static_dir
        .map(|p| {
            p.to_str()
                .with_context(|| format!("Static dir is not valid UTF-8: {}", p.display()))
        })
        .transpose()?;

    tally_server::serve_with_config(db, host, port, static_dir_str, server_config, config).await?;

    Ok(())
}
