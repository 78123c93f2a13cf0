//! DSR handlers: preview, export requests, export status, validation accounts

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::NaiveDate;

use super::super::state::AppState;
use super::super::types::{
    AccountStatusRequest, ApiJson, ApiResponse, ApiResult, DsrKeyRequest, ExportRequestResult, ok,
};
use crate::export::{DsrExport, DsrReport, ValidationAccount};

/// Report figures without queuing an export
#[utoipa::path(
    post,
    path = "/dsr/preview",
    request_body = DsrKeyRequest,
    responses(
        (status = 200, description = "Report figures", body = DsrReport),
        (status = 404, description = "No report for store/date")
    ),
    tag = "DSR"
)]
pub async fn preview(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<DsrKeyRequest>,
) -> ApiResult<DsrReport> {
    let report = state.dsr.preview(&req.store_id, req.report_date).await?;
    ok(report)
}

/// Queue a report for export to the accounting system
///
/// 202 when a new job was created, 200 when one already existed.
#[utoipa::path(
    post,
    path = "/dsr/export",
    request_body = DsrKeyRequest,
    responses(
        (status = 202, description = "Export queued", body = ExportRequestResult),
        (status = 200, description = "Export already requested", body = ExportRequestResult),
        (status = 400, description = "Inactive validation account"),
        (status = 404, description = "No report for store/date")
    ),
    tag = "DSR"
)]
pub async fn request_export(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<DsrKeyRequest>,
) -> ApiResult<ExportRequestResult> {
    let outcome = state
        .dsr
        .request_export(&req.store_id, req.report_date)
        .await?;

    let status = if outcome.created {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(ApiResponse::success(ExportRequestResult {
            created: outcome.created,
            idempotent: !outcome.created,
            status: outcome.status,
        })),
    ))
}

#[utoipa::path(
    get,
    path = "/dsr/exports/{store_id}/{report_date}",
    params(
        ("store_id" = String, Path, description = "Store id"),
        ("report_date" = String, Path, description = "Report date, YYYY-MM-DD")
    ),
    responses(
        (status = 200, description = "Export job", body = DsrExport),
        (status = 404, description = "No export for store/date")
    ),
    tag = "DSR"
)]
pub async fn export_status(
    State(state): State<Arc<AppState>>,
    Path((store_id, report_date)): Path<(String, NaiveDate)>,
) -> ApiResult<DsrExport> {
    let export = state.dsr.export_status(&store_id, report_date).await?;
    ok(export)
}

#[utoipa::path(
    get,
    path = "/dsr/accounts/status/{account_number}",
    params(("account_number" = String, Path, description = "Validation account number")),
    responses(
        (status = 200, description = "Validation account", body = ValidationAccount),
        (status = 404, description = "Unknown account")
    ),
    tag = "DSR"
)]
pub async fn get_account_status(
    State(state): State<Arc<AppState>>,
    Path(account_number): Path<String>,
) -> ApiResult<ValidationAccount> {
    let account = state.dsr.validation_account(&account_number).await?;
    ok(account)
}

/// Activate or deactivate a validation account
#[utoipa::path(
    patch,
    path = "/dsr/accounts/status",
    request_body = AccountStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = ValidationAccount),
        (status = 404, description = "Unknown account"),
        (status = 409, description = "Account already in the requested state")
    ),
    tag = "DSR"
)]
pub async fn set_account_status(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<AccountStatusRequest>,
) -> ApiResult<ValidationAccount> {
    let account = state
        .dsr
        .set_account_active(&req.account_number, req.is_active)
        .await?;
    ok(account)
}
