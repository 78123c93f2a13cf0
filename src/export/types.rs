//! DSR export domain types

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use super::state::ExportStatus;

/// Daily sales report for one store and date, produced upstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DsrReport {
    pub store_id: String,
    pub report_date: NaiveDate,
    pub account_number: String,
    pub total_sales: Decimal,
    pub tax: Decimal,
    pub cash: Decimal,
    pub card: Decimal,
}

/// Account a report must belong to before it may be exported
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidationAccount {
    pub account_number: String,
    pub client_name: String,
    pub is_active: bool,
}

/// Export job row as seen by callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DsrExport {
    #[serde(skip)]
    pub id: i64,
    pub store_id: String,
    pub report_date: NaiveDate,
    pub status: ExportStatus,
    pub retry_count: i32,
    pub next_attempt_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub processing_started_at: Option<DateTime<Utc>>,
    pub qb_transaction_id: Option<String>,
    pub exported_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// A job owned by one scheduler pass, joined with its report figures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedExport {
    pub id: i64,
    pub store_id: String,
    pub report_date: NaiveDate,
    pub total_sales: Decimal,
    pub tax: Decimal,
    pub retry_count: i32,
    /// `processing_started_at` exactly as the store wrote it; the claim token
    pub claimed_at: DateTime<Utc>,
}

impl ClaimedExport {
    pub fn payload(&self) -> ExportPayload {
        ExportPayload {
            store_id: self.store_id.clone(),
            report_date: self.report_date,
            total_sales: self.total_sales,
            tax: self.tax,
            idempotency_key: idempotency_key(&self.store_id, self.report_date),
        }
    }
}

/// Request body sent to the accounting system
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportPayload {
    pub store_id: String,
    pub report_date: NaiveDate,
    pub total_sales: Decimal,
    pub tax: Decimal,
    pub idempotency_key: String,
}

/// Stable per-job key: `<storeId>-<YYYY-MM-DD>`
pub fn idempotency_key(store_id: &str, report_date: NaiveDate) -> String {
    format!("{}-{}", store_id, report_date.format("%Y-%m-%d"))
}

/// Result of asking the store to create a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportCreation {
    Created,
    /// A job for this pair already exists
    Existing(ExportStatus),
}

/// Single atomic write after an attempt ran out of retries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureUpdate {
    pub status: ExportStatus,
    pub retry_count: i32,
    pub next_attempt_at: DateTime<Utc>,
    pub last_error: String,
}
