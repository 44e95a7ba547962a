//! Dashboard handlers
//!
//! Every view is computed on request from the caller's stored receipts.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{Local, NaiveDate};
use serde::Deserialize;

use crate::{AppError, AppState, CurrentUser};
use tally_core::models::{
    CategorySpending, MonthlySpending, PriceChange, RecurringItem, TimeRange, TopItem,
};

/// Largest `limit` accepted for top items
const MAX_TOP_ITEMS: usize = 100;

/// Query parameters for range-based views
#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    /// this-month, last-month, last-3-months or all-time (default)
    pub range: Option<String>,
}

impl RangeQuery {
    fn time_range(&self) -> Result<TimeRange, AppError> {
        match self.range.as_deref() {
            None | Some("") => Ok(TimeRange::default()),
            Some(s) => s.parse().map_err(|e: String| AppError::bad_request(&e)),
        }
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn log_view(
    state: &AppState,
    user: &str,
    view: &str,
    details: &str,
) -> Result<(), AppError> {
    state
        .db
        .log_audit(user, "view", Some(view), None, Some(details))?;
    Ok(())
}

/// GET /api/dashboard/summary - Spending total with period-over-period change
pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<RangeQuery>,
) -> Result<Json<MonthlySpending>, AppError> {
    let range = params.time_range()?;
    let summary = state.db.monthly_spending(&current.user, range, today())?;

    log_view(
        &state,
        &current.user,
        "dashboard_summary",
        &format!("range={}", range.as_str()),
    )?;

    Ok(Json(summary))
}

/// GET /api/dashboard/categories - Spending per category
pub async fn get_categories(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<RangeQuery>,
) -> Result<Json<Vec<CategorySpending>>, AppError> {
    let range = params.time_range()?;
    let categories = state
        .db
        .category_breakdown(&current.user, range, today())?;

    log_view(
        &state,
        &current.user,
        "dashboard_categories",
        &format!("range={}", range.as_str()),
    )?;

    Ok(Json(categories))
}

/// GET /api/dashboard/recurring - Products bought repeatedly, with monthly estimates
pub async fn get_recurring(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<RangeQuery>,
) -> Result<Json<Vec<RecurringItem>>, AppError> {
    let range = params.time_range()?;
    let items = state.db.recurring_items(&current.user, range, today())?;

    log_view(
        &state,
        &current.user,
        "dashboard_recurring",
        &format!("range={}", range.as_str()),
    )?;

    Ok(Json(items))
}

/// GET /api/dashboard/price-changes - First vs latest price per product, all history
pub async fn get_price_changes(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Vec<PriceChange>>, AppError> {
    let changes = state.db.price_changes(&current.user)?;

    log_view(
        &state,
        &current.user,
        "dashboard_price_changes",
        &format!("count={}", changes.len()),
    )?;

    Ok(Json(changes))
}

/// Query parameters for top items
#[derive(Debug, Deserialize)]
pub struct TopItemsQuery {
    #[serde(default = "default_top_items_limit")]
    pub limit: usize,
}

fn default_top_items_limit() -> usize {
    10
}

/// GET /api/dashboard/top-items - Products with the highest total spend
pub async fn get_top_items(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<TopItemsQuery>,
) -> Result<Json<Vec<TopItem>>, AppError> {
    let limit = params.limit.clamp(1, MAX_TOP_ITEMS);
    let items = state.db.top_items(&current.user, limit)?;

    log_view(
        &state,
        &current.user,
        "dashboard_top_items",
        &format!("limit={}", limit),
    )?;

    Ok(Json(items))
}
