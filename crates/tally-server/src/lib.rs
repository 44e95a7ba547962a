//! Tally Web Server
//!
//! Axum-based REST API for the Tally receipt tracker.
//!
//! Security features:
//! - Cloudflare Access authentication (secure by default, use --no-auth for local dev)
//! - Per-user API keys as an alternative for scripts
//! - Restrictive CORS policy
//! - Upload size limits
//! - Full audit logging for all API access (reads and writes)
//! - Sanitized error responses
//! - Signed, expiring download links for stored documents

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{
    cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};
use tracing::{error, info, warn};

use tally_core::{Config, Database, DocumentStore, ExtractionClient, ReceiptExtractor};

mod handlers;

/// Maximum size of one uploaded file (10 MB)
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Maximum total request body for a batch upload
pub const MAX_BATCH_BODY: usize = 20 * MAX_UPLOAD_SIZE;

/// Maximum pagination limit
pub const MAX_PAGE_LIMIT: i64 = 1000;

/// Cloudflare Access header for authenticated user email
const CF_ACCESS_USER_HEADER: &str = "cf-access-authenticated-user-email";

/// Authorization header for API key auth
const AUTHORIZATION_HEADER: &str = "authorization";

/// Environment variable holding API keys (`user=key` pairs, comma separated)
pub const API_KEYS_ENV: &str = "TALLY_API_KEYS";

/// User recorded for a bare API key
pub const API_KEY_USER: &str = "api-key";

/// User recorded when authentication is disabled
pub const LOCAL_DEV_USER: &str = "local-dev";

/// An API key and the user it authenticates as
#[derive(Clone)]
pub struct ApiKey {
    pub user: String,
    pub key: String,
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKey")
            .field("user", &self.user)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Parse `user=key` pairs separated by commas
///
/// A bare key authenticates as `api-key`. Empty entries are skipped.
pub fn parse_api_keys(input: &str) -> Vec<ApiKey> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|entry| {
            let (user, key) = match entry.split_once('=') {
                Some((user, key)) => (user.trim(), key.trim()),
                None => (API_KEY_USER, entry),
            };
            if key.is_empty() || user.is_empty() {
                warn!("Ignoring malformed API key entry");
                return None;
            }
            Some(ApiKey {
                user: user.to_string(),
                key: key.to_string(),
            })
        })
        .collect()
}

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Whether authentication is required (secure by default)
    pub require_auth: bool,
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
    /// API keys for script access (alternative to Cloudflare Access)
    /// Format: "Bearer <key>" in Authorization header
    pub api_keys: Vec<ApiKey>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            allowed_origins: vec![],
            api_keys: vec![],
        }
    }
}

impl ServerConfig {
    /// Read API keys from `TALLY_API_KEYS`
    pub fn with_env_api_keys(mut self) -> Self {
        if let Ok(value) = std::env::var(API_KEYS_ENV) {
            self.api_keys = parse_api_keys(&value);
        }
        self
    }
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: ServerConfig,
    /// None when no extraction backend is configured; uploads then fail with 503
    pub extractor: Option<ExtractionClient>,
    pub store: DocumentStore,
}

/// How a request was authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    CloudflareHeader,
    ApiKey,
    None,
}

/// Authenticated caller, inserted into request extensions by the auth middleware
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: String,
    pub method: AuthMethod,
}

/// Work out who is calling from the request headers
///
/// The access proxy header wins over an API key. Returns None when neither
/// identifies the caller.
pub fn resolve_identity(headers: &HeaderMap, config: &ServerConfig) -> Option<CurrentUser> {
    let cf_user = headers
        .get(CF_ACCESS_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty());

    if let Some(email) = cf_user {
        return Some(CurrentUser {
            user: email.to_string(),
            method: AuthMethod::CloudflareHeader,
        });
    }

    headers
        .get(AUTHORIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .and_then(|key| validate_api_key(key.trim(), &config.api_keys))
        .map(|user| CurrentUser {
            user: user.to_string(),
            method: AuthMethod::ApiKey,
        })
}

/// Authentication middleware - resolves the caller or rejects the request
///
/// # Security Notes
///
/// **Cloudflare Access headers**: The `CF-Access-Authenticated-User-Email` header is
/// trusted as-is. This is safe behind Cloudflare Tunnel (which strips/rewrites CF
/// headers), but can be spoofed if the server is exposed directly to the internet.
///
/// **API keys**: Compared using constant-time comparison to prevent timing attacks.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let identity = match resolve_identity(request.headers(), &state.config) {
        Some(identity) => identity,
        None if !state.config.require_auth => CurrentUser {
            user: LOCAL_DEV_USER.to_string(),
            method: AuthMethod::None,
        },
        None => {
            warn!(path = %request.uri().path(), "Unauthorized request - no valid auth");
            return (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({
                    "error": "Authentication required"
                })),
            )
                .into_response();
        }
    };

    tracing::debug!(
        user = %identity.user,
        method = ?identity.method,
        path = %request.uri().path(),
        "Authenticated request"
    );
    request.extensions_mut().insert(identity);
    next.run(request).await
}

/// Find the user for an API key using constant-time comparison
/// to prevent timing attacks.
fn validate_api_key<'a>(provided: &str, valid_keys: &'a [ApiKey]) -> Option<&'a str> {
    use subtle::ConstantTimeEq;

    let provided_bytes = provided.as_bytes();
    let mut found = None;

    for entry in valid_keys {
        let key_bytes = entry.key.as_bytes();
        // Only compare if lengths match (constant-time for same-length keys)
        if provided_bytes.len() == key_bytes.len()
            && bool::from(provided_bytes.ct_eq(key_bytes))
            && found.is_none()
        {
            found = Some(entry.user.as_str());
        }
    }
    found
}

/// Success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Create the application router from the loaded Tally configuration
///
/// A missing extraction API key is not fatal: the server still serves
/// stored receipts and dashboards, and uploads answer 503.
pub fn create_router(
    db: Database,
    static_dir: Option<&str>,
    config: ServerConfig,
    app_config: &Config,
) -> anyhow::Result<Router> {
    let extractor = match ExtractionClient::from_config(&app_config.extraction) {
        Ok(client) => {
            info!(
                "Extraction backend configured: {} (model: {})",
                client.backend_name(),
                client.model()
            );
            Some(client)
        }
        Err(e) => {
            info!("ℹ️  Extraction backend not available ({}), uploads disabled", e);
            None
        }
    };

    let store = DocumentStore::from_config(&app_config.storage)?;
    info!("Document store at {}", store.root().display());

    Ok(create_router_with_options(
        db, static_dir, config, extractor, store,
    ))
}

/// Create the application router with explicit services (for testing)
pub fn create_router_with_options(
    db: Database,
    static_dir: Option<&str>,
    config: ServerConfig,
    extractor: Option<ExtractionClient>,
    store: DocumentStore,
) -> Router {
    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        extractor,
        store,
    });

    let api_routes = Router::new()
        // Auth
        .route("/me", get(handlers::get_me))
        .route("/logout", post(handlers::logout))
        // Receipts
        .route(
            "/receipts",
            get(handlers::list_receipts).post(handlers::save_receipt),
        )
        .route(
            "/receipts/extract",
            post(handlers::extract_receipts).layer(DefaultBodyLimit::max(MAX_BATCH_BODY)),
        )
        .route(
            "/receipts/check-duplicate",
            post(handlers::check_duplicate),
        )
        .route("/receipts/batch", post(handlers::save_receipt_batch))
        .route(
            "/receipts/:id",
            get(handlers::get_receipt).delete(handlers::delete_receipt),
        )
        .route("/receipts/:id/file-url", get(handlers::get_receipt_file_url))
        .route("/receipts/:id/edits", get(handlers::list_receipt_edits))
        // Line items
        .route(
            "/line-items/:id",
            axum::routing::patch(handlers::update_line_item),
        )
        .route("/line-items/:id/edits", get(handlers::list_line_item_edits))
        // Dashboard
        .route("/dashboard/summary", get(handlers::get_summary))
        .route("/dashboard/categories", get(handlers::get_categories))
        .route("/dashboard/recurring", get(handlers::get_recurring))
        .route("/dashboard/price-changes", get(handlers::get_price_changes))
        .route("/dashboard/top-items", get(handlers::get_top_items))
        // Stored documents
        .route("/files/*path", axum::routing::delete(handlers::discard_file))
        // Audit log
        .route("/audit", get(handlers::list_audit_log))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Build CORS layer
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    } else {
        // Allow specified origins
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    };

    // Security headers
    // CSP: restrict scripts to same-origin, allow inline styles, allow blob: for images
    let csp_value = HeaderValue::from_static(
        "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'; img-src 'self' blob: data:; font-src 'self'; connect-src 'self'; frame-ancestors 'none'"
    );

    let mut app = Router::new()
        .nest("/api", api_routes)
        // Signed downloads: the signature is the credential
        .route("/files/*path", get(handlers::download_file))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_XSS_PROTECTION,
            HeaderValue::from_static("1; mode=block"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            csp_value,
        ));

    // Serve static files if directory provided
    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app
}

/// Start the server with the default configuration
pub async fn serve(
    db: Database,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
    app_config: &Config,
) -> anyhow::Result<()> {
    serve_with_config(
        db,
        host,
        port,
        static_dir,
        ServerConfig::default().with_env_api_keys(),
        app_config,
    )
    .await
}

/// Start the server with custom configuration
pub async fn serve_with_config(
    db: Database,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
    config: ServerConfig,
    app_config: &Config,
) -> anyhow::Result<()> {
    if !config.require_auth {
        warn!("⚠️  Authentication disabled - do not expose to network!");
    }
    if config.require_auth && config.api_keys.is_empty() {
        info!("ℹ️  No API keys configured (set {} for script access)", API_KEYS_ENV);
    }

    let app = create_router(db, static_dir, config, app_config)?
        .into_make_service_with_connect_info::<std::net::SocketAddr>();
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, msg)
    }

    pub fn forbidden(msg: &str) -> Self {
        Self::with_status(StatusCode::FORBIDDEN, msg)
    }

    pub fn not_found(msg: &str) -> Self {
        Self::with_status(StatusCode::NOT_FOUND, msg)
    }

    pub fn unavailable(msg: &str) -> Self {
        Self::with_status(StatusCode::SERVICE_UNAVAILABLE, msg)
    }

    fn with_status(status: StatusCode, msg: &str) -> Self {
        Self {
            status,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();

        // Client-facing core errors keep their message and status
        if let Some(core) = err.downcast_ref::<tally_core::Error>() {
            let status = match core {
                tally_core::Error::NotFound(_) => Some(StatusCode::NOT_FOUND),
                tally_core::Error::InvalidData(_) => Some(StatusCode::BAD_REQUEST),
                tally_core::Error::Unauthenticated => Some(StatusCode::UNAUTHORIZED),
                tally_core::Error::Extraction(_) => Some(StatusCode::BAD_GATEWAY),
                _ => None,
            };
            if let Some(status) = status {
                return Self {
                    status,
                    message: core.to_string(),
                    internal: None,
                };
            }
        }

        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err),
        }
    }
}
