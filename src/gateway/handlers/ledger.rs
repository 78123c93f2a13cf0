//! Payment, transfer and statement handlers

use std::sync::Arc;

use axum::extract::{Path, Query, State};

use super::super::state::AppState;
use super::super::types::{ApiJson, ApiResult, LedgerResult, StatementQuery, ok};
use crate::ledger::{AccountStatement, LedgerError, PaymentRequest, TransferRequest};

const DEFAULT_STATEMENT_LIMIT: i64 = 50;
const MAX_STATEMENT_LIMIT: i64 = 500;

/// Record a payment against one account
///
/// POST /accounts/payments
#[utoipa::path(
    post,
    path = "/accounts/payments",
    request_body = PaymentRequest,
    responses(
        (status = 200, description = "Applied, or already applied", body = LedgerResult),
        (status = 400, description = "Invalid parameters"),
        (status = 404, description = "Account not found"),
        (status = 422, description = "Refund exceeds balance")
    ),
    tag = "Ledger"
)]
pub async fn record_payment(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<PaymentRequest>,
) -> ApiResult<LedgerResult> {
    let outcome = state.payments.record_payment(&req).await?;
    ok(outcome.into())
}

/// Move funds between two accounts
///
/// POST /accounts/payments/transfer
#[utoipa::path(
    post,
    path = "/accounts/payments/transfer",
    request_body = TransferRequest,
    responses(
        (status = 200, description = "Applied, or already applied", body = LedgerResult),
        (status = 400, description = "Invalid parameters"),
        (status = 404, description = "Account not found"),
        (status = 422, description = "Insufficient funds")
    ),
    tag = "Ledger"
)]
pub async fn record_transfer(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<TransferRequest>,
) -> ApiResult<LedgerResult> {
    let outcome = state.transfers.record_transfer(&req).await?;
    ok(outcome.into())
}

/// Balance and recent activity of an account
///
/// GET /accounts/{account_id}/statement
#[utoipa::path(
    get,
    path = "/accounts/{account_id}/statement",
    params(
        ("account_id" = i64, Path, description = "Account id"),
        StatementQuery
    ),
    responses(
        (status = 200, description = "Statement, newest first", body = AccountStatement),
        (status = 404, description = "Account not found")
    ),
    tag = "Ledger"
)]
pub async fn account_statement(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<i64>,
    Query(query): Query<StatementQuery>,
) -> ApiResult<AccountStatement> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_STATEMENT_LIMIT)
        .clamp(1, MAX_STATEMENT_LIMIT);

    let statement = state
        .ledger
        .statement(account_id, limit)
        .await?
        .ok_or(LedgerError::AccountNotFound(account_id))?;
    ok(statement)
}
