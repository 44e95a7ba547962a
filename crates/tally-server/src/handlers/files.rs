//! Stored document handlers
//!
//! Downloads are mounted outside `/api`: the link signature stands in for
//! authentication, so links can be opened directly by the browser. Discards
//! go through the authenticated API.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use crate::{AppError, AppState, CurrentUser, SuccessResponse};
use tally_core::DocumentKind;

/// Query parameters carried by a signed link
#[derive(Debug, Deserialize)]
pub struct SignedLinkQuery {
    pub expires: i64,
    pub signature: String,
}

/// GET /files/*path - Serve a stored document if the link is valid and unexpired
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    Query(link): Query<SignedLinkQuery>,
) -> Result<Response, AppError> {
    if !state
        .store
        .verify(&path, link.expires, &link.signature, Utc::now())
    {
        warn!(path = %path, "Rejected signed link");
        return Err(AppError::forbidden("Invalid or expired link"));
    }

    let bytes = state.store.read(&path)?;
    let content_type = DocumentKind::detect(&bytes, Some(&path), None)
        .map(|kind| kind.media_type())
        .unwrap_or("application/octet-stream");

    info!(path = %path, bytes = bytes.len(), "Served signed download");

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "private, no-store"),
        ],
        bytes,
    )
        .into_response())
}

/// DELETE /api/files/*path - Discard an extracted document that will not be saved
///
/// Only the caller's own files can be discarded, and never one a saved
/// receipt still points at.
pub async fn discard_file(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(path): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    if !state.store.owns(&current.user, &path) {
        warn!(user = %current.user, path = %path, "Rejected foreign store path");
        return Err(AppError::bad_request("Invalid file path"));
    }
    if state.db.file_path_in_use(&current.user, &path)? {
        return Err(AppError::bad_request("File belongs to a saved receipt"));
    }
    if !state.store.delete(&path)? {
        return Err(AppError::not_found("File not found"));
    }

    state
        .db
        .log_audit(&current.user, "discard", Some("file"), None, Some(&path))?;

    Ok(Json(SuccessResponse { success: true }))
}
