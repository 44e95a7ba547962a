//! Line item correction handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::{AppError, AppState, CurrentUser};
use tally_core::models::{EditableField, LineItem, LineItemEdit};

/// Request body for editing a line item
#[derive(Debug, Deserialize)]
pub struct UpdateLineItemRequest {
    /// normalized_name, category or subcategory
    pub field: String,
    /// New value; null or blank clears the field
    #[serde(default)]
    pub value: Option<String>,
}

/// PATCH /api/line-items/:id - Correct one field and record the edit
pub async fn update_line_item(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateLineItemRequest>,
) -> Result<Json<LineItem>, AppError> {
    let field: EditableField = request
        .field
        .parse()
        .map_err(|e: String| AppError::bad_request(&e))?;

    let item = state.db.update_line_item(
        &current.user,
        id,
        field,
        request.value.as_deref(),
        &current.user,
    )?;

    state.db.log_audit(
        &current.user,
        "update",
        Some("line_item"),
        Some(id),
        Some(&format!("field={}", field.as_str())),
    )?;

    Ok(Json(item))
}

/// GET /api/line-items/:id/edits - Edit history of one line item, oldest first
pub async fn list_line_item_edits(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<LineItemEdit>>, AppError> {
    if state.db.get_line_item(&current.user, id)?.is_none() {
        return Err(AppError::not_found("Line item not found"));
    }

    let edits = state.db.list_line_item_edits(&current.user, id)?;

    state.db.log_audit(
        &current.user,
        "view",
        Some("line_item_edits"),
        Some(id),
        Some(&format!("count={}", edits.len())),
    )?;

    Ok(Json(edits))
}
