//! API envelope, error mapping and request/response DTOs
//!
//! - `ApiResponse<T>`: unified `{code, msg, data}` wrapper
//! - `ApiError`: the one place an [`ErrorKind`] becomes an HTTP status
//! - `error_codes`: numeric codes carried in `code`
//! - `ApiJson<T>`: JSON body extractor whose rejections use the envelope

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ErrorKind;
use crate::export::{ExportError, ExportStatus};
use crate::ledger::{ApplyOutcome, LedgerError};

// ============================================================================
// Unified API Response Format
// ============================================================================

/// Unified API response wrapper
///
/// - code: 0 = success, non-zero = error code
/// - msg: short message description
/// - data: payload on success, absent on error
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    #[schema(example = 0)]
    pub code: i32,
    #[schema(example = "ok")]
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: error_codes::SUCCESS,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: i32, msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

/// Standard API error codes
pub mod error_codes {
    pub const SUCCESS: i32 = 0;

    // Client errors (1xxx)
    pub const INVALID_PARAMETER: i32 = 1001;
    pub const INSUFFICIENT_BALANCE: i32 = 1002;

    // Resource errors (4xxx)
    pub const NOT_FOUND: i32 = 4004;
    pub const CONFLICT: i32 = 4009;

    // Server errors (5xxx)
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const SERVICE_UNAVAILABLE: i32 = 5001;
}

// ============================================================================
// Error mapping
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: i32,
    pub msg: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: i32, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            msg: msg.into(),
        }
    }

    /// Map a component failure to its caller-visible form.
    ///
    /// Transient failures are logged here and reported without detail.
    pub fn from_kind(kind: ErrorKind, msg: String) -> Self {
        match kind {
            ErrorKind::Validation => {
                Self::new(StatusCode::BAD_REQUEST, error_codes::INVALID_PARAMETER, msg)
            }
            ErrorKind::NotFound => Self::new(StatusCode::NOT_FOUND, error_codes::NOT_FOUND, msg),
            ErrorKind::Conflict => Self::new(StatusCode::CONFLICT, error_codes::CONFLICT, msg),
            ErrorKind::InsufficientFunds => Self::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                error_codes::INSUFFICIENT_BALANCE,
                msg,
            ),
            ErrorKind::Transient => {
                tracing::error!(error = %msg, "Request failed");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_codes::INTERNAL_ERROR,
                    "Internal server error",
                )
            }
        }
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            error_codes::SERVICE_UNAVAILABLE,
            msg,
        )
    }
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        Self::from_kind(e.kind(), e.to_string())
    }
}

impl From<ExportError> for ApiError {
    fn from(e: ExportError) -> Self {
        Self::from_kind(e.kind(), e.to_string())
    }
}

/// Malformed, mistyped or incomplete bodies are validation failures
impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            error_codes::INVALID_PARAMETER,
            format!("Invalid JSON: {}", e.body_text()),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::<()>::error(self.code, self.msg))).into_response()
    }
}

/// `Json<T>` with rejections reported as 400 + `INVALID_PARAMETER`
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

pub type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

/// 200 with the success envelope
pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(ApiResponse::success(data))))
}

// ============================================================================
// DTOs
// ============================================================================

/// Ledger mutation result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct LedgerResult {
    /// Balances changed by this call
    pub applied: bool,
    /// The external id had already been applied
    pub idempotent: bool,
}

impl From<ApplyOutcome> for LedgerResult {
    fn from(outcome: ApplyOutcome) -> Self {
        Self {
            applied: outcome.applied(),
            idempotent: !outcome.applied(),
        }
    }
}

/// Identifies one daily sales report
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DsrKeyRequest {
    #[schema(example = "STORE-001")]
    pub store_id: String,
    #[schema(value_type = String, example = "2024-03-01")]
    pub report_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequestResult {
    pub created: bool,
    pub idempotent: bool,
    pub status: ExportStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatusRequest {
    pub account_number: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StatementQuery {
    /// Maximum lines returned (default 50, capped at 500)
    pub limit: Option<i64>,
}
