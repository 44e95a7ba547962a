//! Layered configuration
//!
//! Resolution order, later layers win:
//! 1. Embedded defaults (`config/tally.toml`, compiled into the binary)
//! 2. Override file (`--config` path, or `~/.config/tally/config.toml`)
//! 3. Environment variables
//!
//! Environment variables:
//! - `TALLY_EXTRACTION_BACKEND`: `anthropic` or `mock`
//! - `TALLY_EXTRACTION_HOST`: Messages API base URL
//! - `TALLY_EXTRACTION_MODEL`: model name
//! - `ANTHROPIC_API_KEY`: API key for the anthropic backend
//! - `TALLY_STORAGE_DIR`: document store root
//! - `TALLY_SIGNING_SECRET`: secret for signed document URLs

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/tally.toml");

pub const EXTRACTION_BACKEND_ENV: &str = "TALLY_EXTRACTION_BACKEND";
pub const EXTRACTION_HOST_ENV: &str = "TALLY_EXTRACTION_HOST";
pub const EXTRACTION_MODEL_ENV: &str = "TALLY_EXTRACTION_MODEL";
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const STORAGE_DIR_ENV: &str = "TALLY_STORAGE_DIR";
pub const SIGNING_SECRET_ENV: &str = "TALLY_SIGNING_SECRET";

/// Which extraction backend to build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionBackendKind {
    Anthropic,
    Mock,
}

impl std::str::FromStr for ExtractionBackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "mock" => Ok(Self::Mock),
            _ => Err(format!("Unknown extraction backend: {}", s)),
        }
    }
}

/// Extraction gateway settings
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    pub backend: ExtractionBackendKind,
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            backend: ExtractionBackendKind::Anthropic,
            api_base: "https://api.anthropic.com".to_string(),
            api_key: None,
            model: "claude-3-5-haiku-20241022".to_string(),
            max_tokens: 4096,
            timeout: Duration::from_secs(120),
        }
    }
}

/// Document store settings
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub root: PathBuf,
    /// HMAC secret for signed URLs. Generated per process when unset,
    /// which invalidates outstanding links on restart.
    pub signing_secret: Option<String>,
    pub signed_url_ttl: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("receipts"),
            signing_secret: None,
            signed_url_ttl: Duration::from_secs(3600),
        }
    }
}

/// Full application configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub extraction: ExtractionConfig,
    pub storage: StorageConfig,
}

impl Config {
    /// Load defaults, the override file, then environment variables
    pub fn load(override_path: Option<&Path>) -> Result<Self> {
        let mut config = parse_config(DEFAULT_CONFIG)?;

        let path = override_path
            .map(Path::to_path_buf)
            .or_else(default_config_path);
        if let Some(path) = path {
            if path.exists() {
                debug!(path = %path.display(), "Loading config override");
                let content = fs::read_to_string(&path)
                    .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;
                apply_toml(&mut config, &content)?;
            } else if override_path.is_some() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
        }

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply environment overrides through a lookup function
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(backend) = get(EXTRACTION_BACKEND_ENV) {
            match backend.parse() {
                Ok(kind) => self.extraction.backend = kind,
                Err(e) => warn!(error = %e, "Ignoring {}", EXTRACTION_BACKEND_ENV),
            }
        }
        if let Some(host) = get(EXTRACTION_HOST_ENV) {
            self.extraction.api_base = host;
        }
        if let Some(model) = get(EXTRACTION_MODEL_ENV) {
            self.extraction.model = model;
        }
        if let Some(key) = get(API_KEY_ENV) {
            self.extraction.api_key = Some(key);
        }
        if let Some(dir) = get(STORAGE_DIR_ENV) {
            self.storage.root = PathBuf::from(dir);
        }
        if let Some(secret) = get(SIGNING_SECRET_ENV) {
            self.storage.signing_secret = Some(secret);
        }
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tally").join("config.toml"))
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    extraction: Option<RawExtraction>,
    storage: Option<RawStorage>,
}

#[derive(Debug, Deserialize)]
struct RawExtraction {
    backend: Option<String>,
    api_base: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawStorage {
    root: Option<PathBuf>,
    signing_secret: Option<String>,
    signed_url_ttl_secs: Option<u64>,
}

/// Parse config from TOML content on top of built-in defaults
fn parse_config(content: &str) -> Result<Config> {
    let mut config = Config::default();
    apply_toml(&mut config, content)?;
    Ok(config)
}

fn apply_toml(config: &mut Config, content: &str) -> Result<()> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    if let Some(extraction) = raw.extraction {
        if let Some(backend) = extraction.backend {
            config.extraction.backend = backend.parse().map_err(Error::Config)?;
        }
        if let Some(api_base) = extraction.api_base {
            config.extraction.api_base = api_base;
        }
        if let Some(api_key) = extraction.api_key {
            config.extraction.api_key = Some(api_key);
        }
        if let Some(model) = extraction.model {
            config.extraction.model = model;
        }
        if let Some(max_tokens) = extraction.max_tokens {
            config.extraction.max_tokens = max_tokens;
        }
        if let Some(timeout) = extraction.timeout_secs {
            config.extraction.timeout = Duration::from_secs(timeout);
        }
    }

    if let Some(storage) = raw.storage {
        if let Some(root) = storage.root {
            config.storage.root = root;
        }
        if let Some(secret) = storage.signing_secret {
            config.storage.signing_secret = Some(secret);
        }
        if let Some(ttl) = storage.signed_url_ttl_secs {
            config.storage.signed_url_ttl = Duration::from_secs(ttl);
        }
    }

    Ok(())
}
