//! Dashboard, summary and stock report routes.

use crate::error::ApiError;
use crate::AppState;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use clinic_core::constants::{DEFAULT_EXPIRY_WINDOW_DAYS, TOP_ITEMS_LIMIT};
use clinic_core::models::closing::{reconcile, Reconciliation};
use clinic_core::models::dates::{parse_date_prefix, today};
use clinic_core::models::indoor::Bed;
use clinic_core::models::pharmacy::{PharmItem, StockEntry};
use clinic_core::reports::{
    self, DashboardStats, DateRange, ExpenseSummary, InvoiceSummary, SalesSummary,
};
use clinic_types::Money;
use serde::Deserialize;
use std::collections::HashMap;

/// Report routes, to be nested under `/apis`.
pub fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard/stats", get(dashboard_stats))
        .route("/invoices/summary", get(invoice_summary))
        .route("/expenses/summary", get(expense_summary))
        .route("/pharmsales/summary", get(sales_summary))
        .route("/pharmitems/lowstock", get(low_stock))
        .route("/pharmstock/expiring", get(expiring_stock))
        .route("/beds/available", get(available_beds))
        .route("/storeclosings/preview", get(closing_preview))
}

#[utoipa::path(
    get,
    path = "/apis/dashboard/stats",
    responses(
        (status = 200, description = "Today's figures for the dashboard", body = DashboardStats)
    )
)]
#[axum::debug_handler]
pub(crate) async fn dashboard_stats(State(state): State<AppState>) -> Json<DashboardStats> {
    Json(reports::dashboard(&state.store, today()))
}

#[utoipa::path(
    get,
    path = "/apis/invoices/summary",
    params(
        ("from" = Option<String>, Query, description = "First day, YYYY-MM-DD"),
        ("to" = Option<String>, Query, description = "Last day, YYYY-MM-DD")
    ),
    responses(
        (status = 200, description = "Invoice totals for the range", body = InvoiceSummary),
        (status = 400, description = "Malformed date")
    )
)]
#[axum::debug_handler]
pub(crate) async fn invoice_summary(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<InvoiceSummary>, ApiError> {
    let range = DateRange::from_params(&params)?;
    Ok(Json(reports::invoice_summary(&state.store, range)))
}

#[utoipa::path(
    get,
    path = "/apis/expenses/summary",
    params(
        ("from" = Option<String>, Query, description = "First day, YYYY-MM-DD"),
        ("to" = Option<String>, Query, description = "Last day, YYYY-MM-DD")
    ),
    responses(
        (status = 200, description = "Expense totals per category", body = ExpenseSummary),
        (status = 400, description = "Malformed date")
    )
)]
#[axum::debug_handler]
pub(crate) async fn expense_summary(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ExpenseSummary>, ApiError> {
    let range = DateRange::from_params(&params)?;
    Ok(Json(reports::expense_summary(&state.store, range)))
}

#[utoipa::path(
    get,
    path = "/apis/pharmsales/summary",
    params(
        ("from" = Option<String>, Query, description = "First day, YYYY-MM-DD"),
        ("to" = Option<String>, Query, description = "Last day, YYYY-MM-DD")
    ),
    responses(
        (status = 200, description = "Pharmacy sales, best sellers and missed sales", body = SalesSummary),
        (status = 400, description = "Malformed date")
    )
)]
#[axum::debug_handler]
pub(crate) async fn sales_summary(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<SalesSummary>, ApiError> {
    let range = DateRange::from_params(&params)?;
    Ok(Json(reports::sales_summary(&state.store, range, TOP_ITEMS_LIMIT)))
}

#[utoipa::path(
    get,
    path = "/apis/pharmitems/lowstock",
    responses(
        (status = 200, description = "Items at or below their reorder level", body = [PharmItem])
    )
)]
#[axum::debug_handler]
pub(crate) async fn low_stock(State(state): State<AppState>) -> Json<Vec<PharmItem>> {
    Json(reports::low_stock(&state.store))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExpiringParams {
    days: Option<String>,
}

#[utoipa::path(
    get,
    path = "/apis/pharmstock/expiring",
    params(
        ("days" = Option<u32>, Query, description = "Look-ahead window in days, default 30")
    ),
    responses(
        (status = 200, description = "Batches expired or expiring within the window", body = [StockEntry]),
        (status = 400, description = "Malformed window")
    )
)]
#[axum::debug_handler]
pub(crate) async fn expiring_stock(
    State(state): State<AppState>,
    Query(params): Query<ExpiringParams>,
) -> Result<Json<Vec<StockEntry>>, ApiError> {
    let days = match params.days.as_deref().map(str::trim) {
        None | Some("") => DEFAULT_EXPIRY_WINDOW_DAYS,
        Some(v) => v
            .parse::<u32>()
            .map_err(|_| ApiError::bad_request("days must be a non-negative integer"))?,
    };
    Ok(Json(reports::expiring_stock(&state.store, today(), days)))
}

#[utoipa::path(
    get,
    path = "/apis/beds/available",
    responses(
        (status = 200, description = "Beds that can take an admission", body = [Bed])
    )
)]
#[axum::debug_handler]
pub(crate) async fn available_beds(State(state): State<AppState>) -> Json<Vec<Bed>> {
    Json(reports::available_beds(&state.store))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PreviewParams {
    date: Option<String>,
    opening_cash: Option<String>,
    counted_cash: Option<String>,
}

#[utoipa::path(
    get,
    path = "/apis/storeclosings/preview",
    params(
        ("date" = Option<String>, Query, description = "Day to reconcile, default today"),
        ("openingCash" = Option<String>, Query, description = "Cash in the drawer at opening"),
        ("countedCash" = Option<String>, Query, description = "Cash counted at closing")
    ),
    responses(
        (status = 200, description = "Reconciliation, not saved", body = Reconciliation),
        (status = 400, description = "Malformed date or amount")
    )
)]
#[axum::debug_handler]
pub(crate) async fn closing_preview(
    State(state): State<AppState>,
    Query(params): Query<PreviewParams>,
) -> Result<Json<Reconciliation>, ApiError> {
    let date = match params.date.as_deref().map(str::trim) {
        None | Some("") => today(),
        Some(v) => parse_date_prefix(v)
            .ok_or_else(|| ApiError::bad_request("date must be a YYYY-MM-DD date"))?,
    };
    let amount = |key: &str, raw: Option<&str>| -> Result<Money, ApiError> {
        raw.map(str::parse::<Money>)
            .transpose()
            .map(Option::unwrap_or_default)
            .map_err(|e| ApiError::bad_request(format!("{}: {}", key, e)))
    };
    let opening = amount("openingCash", params.opening_cash.as_deref())?;
    let counted = amount("countedCash", params.counted_cash.as_deref())?;
    if opening.is_negative() || counted.is_negative() {
        return Err(ApiError::bad_request("cash amounts cannot be negative"));
    }

    Ok(Json(reconcile(&state.store, date, opening, counted)?))
}
