//! Receipt handlers

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    Extension, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{AppError, AppState, CurrentUser, SuccessResponse, MAX_PAGE_LIMIT, MAX_UPLOAD_SIZE};
use tally_core::models::{DuplicateCheck, LineItemEdit, Receipt};
use tally_core::{
    DuplicateCandidate, FileResult, SaveRequest, SaveResult, SignedUrl, UploadPipeline,
    UploadedFile,
};

/// Response for a batch extraction
#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub results: Vec<FileResult>,
    pub extracted: usize,
    pub failed: usize,
}

/// POST /api/receipts/extract - Extract receipts from uploaded documents
///
/// Expects a multipart form with one or more `file` (or `files`) fields,
/// each a PDF or image of at most 10 MB. Files are processed in order; a
/// file that fails is reported in its result and the rest still run.
/// Nothing is saved until the client posts the reviewed receipts back.
pub async fn extract_receipts(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Result<Json<ExtractResponse>, AppError> {
    let extractor = state
        .extractor
        .as_ref()
        .ok_or_else(|| AppError::unavailable("Receipt extraction is not configured"))?;

    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(&format!("Failed to read form field: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name != "file" && name != "files" {
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("upload-{}", files.len() + 1));
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|_| AppError::bad_request("Failed to read file data"))?;

        // Check file size limit
        if bytes.len() > MAX_UPLOAD_SIZE {
            return Err(AppError::bad_request(&format!(
                "File {} too large. Maximum size is {} MB",
                file_name,
                MAX_UPLOAD_SIZE / 1024 / 1024
            )));
        }

        files.push(UploadedFile {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    if files.is_empty() {
        return Err(AppError::bad_request("No files provided"));
    }

    let pipeline = UploadPipeline::new(&state.db, extractor, &state.store);
    let results = pipeline
        .extract_batch(&current.user, files, |done, total, result| {
            debug!(done, total, file = %result.file_name, failed = result.is_failed(), "Extracted file");
        })
        .await?;

    let failed = results.iter().filter(|r| r.is_failed()).count();
    let extracted = results.len() - failed;

    state.db.log_audit(
        &current.user,
        "extract",
        Some("receipt"),
        None,
        Some(&format!("files={}, failed={}", results.len(), failed)),
    )?;

    Ok(Json(ExtractResponse {
        results,
        extracted,
        failed,
    }))
}

/// POST /api/receipts/check-duplicate - Look for an already saved copy of a receipt
pub async fn check_duplicate(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(candidate): Json<DuplicateCandidate>,
) -> Result<Json<DuplicateCheck>, AppError> {
    let check = state.db.find_duplicate(&current.user, &candidate)?;

    state.db.log_audit(
        &current.user,
        "check_duplicate",
        Some("receipt"),
        check.existing_id,
        Some(&format!(
            "store={}, date={}",
            candidate.store_name, candidate.purchase_date
        )),
    )?;

    Ok(Json(check))
}

/// Reject store paths outside the caller's directory
fn check_file_path(state: &AppState, user: &str, file_path: Option<&str>) -> Result<(), AppError> {
    match file_path {
        Some(path) if !state.store.owns(user, path) => {
            warn!(user, path, "Rejected foreign store path");
            Err(AppError::bad_request("Invalid file_path"))
        }
        _ => Ok(()),
    }
}

/// POST /api/receipts - Save a reviewed receipt
pub async fn save_receipt(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(request): Json<SaveRequest>,
) -> Result<Json<Receipt>, AppError> {
    check_file_path(&state, &current.user, request.file_path.as_deref())?;

    let receipt = tally_core::save_receipt(
        &state.db,
        &current.user,
        request.receipt,
        request.file_path,
    )?;

    state.db.log_audit(
        &current.user,
        "create",
        Some("receipt"),
        Some(receipt.id),
        Some(&format!(
            "store={}, items={}",
            receipt.store_name,
            receipt.line_items.len()
        )),
    )?;

    Ok(Json(receipt))
}

/// Request body for a batch save
#[derive(Debug, Deserialize)]
pub struct BatchSaveRequest {
    pub receipts: Vec<SaveRequest>,
}

#[derive(Debug, Serialize)]
pub struct BatchSaveResponse {
    pub results: Vec<SaveResult>,
    pub saved: usize,
    pub failed: usize,
}

/// POST /api/receipts/batch - Save several receipts, continuing past failures
pub async fn save_receipt_batch(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(request): Json<BatchSaveRequest>,
) -> Result<Json<BatchSaveResponse>, AppError> {
    for receipt in &request.receipts {
        check_file_path(&state, &current.user, receipt.file_path.as_deref())?;
    }

    let results = tally_core::save_batch(&state.db, &current.user, request.receipts)?;
    let failed = results
        .iter()
        .filter(|r| matches!(r.outcome, tally_core::SaveOutcome::Failed { .. }))
        .count();
    let saved = results.len() - failed;

    state.db.log_audit(
        &current.user,
        "create_batch",
        Some("receipt"),
        None,
        Some(&format!("saved={}, failed={}", saved, failed)),
    )?;

    Ok(Json(BatchSaveResponse {
        results,
        saved,
        failed,
    }))
}

/// Query params for listing receipts
#[derive(Debug, Deserialize)]
pub struct ListReceiptsQuery {
    #[serde(default = "default_receipt_limit")]
    pub limit: i64,
}

fn default_receipt_limit() -> i64 {
    50
}

/// GET /api/receipts - List receipts, newest purchase first
pub async fn list_receipts(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<ListReceiptsQuery>,
) -> Result<Json<Vec<Receipt>>, AppError> {
    let limit = query.limit.clamp(1, MAX_PAGE_LIMIT);
    let receipts = state.db.list_receipts(&current.user, limit)?;

    state.db.log_audit(
        &current.user,
        "list",
        Some("receipt"),
        None,
        Some(&format!("limit={}, count={}", limit, receipts.len())),
    )?;

    Ok(Json(receipts))
}

/// GET /api/receipts/:id - Get a specific receipt
pub async fn get_receipt(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<Receipt>, AppError> {
    let receipt = state
        .db
        .get_receipt(&current.user, id)?
        .ok_or_else(|| AppError::not_found("Receipt not found"))?;

    state
        .db
        .log_audit(&current.user, "view", Some("receipt"), Some(id), None)?;

    Ok(Json(receipt))
}

/// DELETE /api/receipts/:id - Delete a receipt, its line items and its stored file
pub async fn delete_receipt(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    let receipt = state
        .db
        .delete_receipt(&current.user, id)?
        .ok_or_else(|| AppError::not_found("Receipt not found"))?;

    // The rows are gone either way; a stale file is only logged
    if let Some(path) = &receipt.file_path {
        if state.db.file_path_in_use(&current.user, path)? {
            debug!(path = %path, "Stored document still referenced, keeping it");
        } else if let Err(e) = state.store.delete(path) {
            warn!(path = %path, error = %e, "Failed to remove stored document");
        }
    }

    state.db.log_audit(
        &current.user,
        "delete",
        Some("receipt"),
        Some(id),
        Some(&format!("store={}", receipt.store_name)),
    )?;

    Ok(Json(SuccessResponse { success: true }))
}

/// GET /api/receipts/:id/file-url - Signed download link for the stored document
pub async fn get_receipt_file_url(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<SignedUrl>, AppError> {
    let receipt = state
        .db
        .get_receipt(&current.user, id)?
        .ok_or_else(|| AppError::not_found("Receipt not found"))?;

    let path = receipt
        .file_path
        .ok_or_else(|| AppError::not_found("Receipt has no stored file"))?;

    let signed = state.store.signed_url(&path, Utc::now());

    state
        .db
        .log_audit(&current.user, "sign_url", Some("receipt"), Some(id), None)?;

    Ok(Json(signed))
}

/// GET /api/receipts/:id/edits - Edit history of every line item on a receipt
pub async fn list_receipt_edits(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<LineItemEdit>>, AppError> {
    if state.db.get_receipt(&current.user, id)?.is_none() {
        return Err(AppError::not_found("Receipt not found"));
    }

    let edits = state.db.list_receipt_edits(&current.user, id)?;

    state.db.log_audit(
        &current.user,
        "view",
        Some("receipt_edits"),
        Some(id),
        Some(&format!("count={}", edits.len())),
    )?;

    Ok(Json(edits))
}
