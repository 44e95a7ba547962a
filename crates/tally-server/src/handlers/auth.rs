//! Authentication-related handlers

use axum::{Extension, Json};
use serde::Serialize;

use crate::{AuthMethod, CurrentUser};

/// Cloudflare Access logout endpoint, relative to the application host
const CF_ACCESS_LOGOUT_URL: &str = "/cdn-cgi/access/logout";

/// Response for the /api/me endpoint
#[derive(Serialize)]
pub struct MeResponse {
    /// The authenticated user's email or identifier
    pub user: String,
    /// How the user was authenticated
    pub auth_method: AuthMethod,
}

/// Get the currently authenticated user
pub async fn get_me(Extension(current): Extension<CurrentUser>) -> Json<MeResponse> {
    Json(MeResponse {
        user: current.user,
        auth_method: current.method,
    })
}

#[derive(Serialize)]
pub struct LogoutResponse {
    pub logout_url: &'static str,
}

/// POST /api/logout - Sessions belong to the access proxy; point the client at its logout
pub async fn logout(Extension(current): Extension<CurrentUser>) -> Json<LogoutResponse> {
    tracing::info!(user = %current.user, "Logout requested");
    Json(LogoutResponse {
        logout_url: CF_ACCESS_LOGOUT_URL,
    })
}
