//! Export Job Store seam

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use super::error::ExportError;
use super::types::{
    ClaimedExport, DsrExport, DsrReport, ExportCreation, FailureUpdate, ValidationAccount,
};

/// Durable DSR reports, validation accounts and export jobs
#[async_trait]
pub trait ExportStore: Send + Sync {
    async fn report(
        &self,
        store_id: &str,
        report_date: NaiveDate,
    ) -> Result<Option<DsrReport>, ExportError>;

    async fn validation_account(
        &self,
        account_number: &str,
    ) -> Result<Option<ValidationAccount>, ExportError>;

    /// Flip `is_active` to `active` only if it currently holds the opposite
    /// value. Returns the updated row, or `None` when nothing matched.
    async fn set_validation_account_active(
        &self,
        account_number: &str,
        active: bool,
    ) -> Result<Option<ValidationAccount>, ExportError>;

    /// Create a `pending` job in one atomic unit with the report and
    /// validation-account checks.
    async fn create_export(
        &self,
        store_id: &str,
        report_date: NaiveDate,
    ) -> Result<ExportCreation, ExportError>;

    async fn export(
        &self,
        store_id: &str,
        report_date: NaiveDate,
    ) -> Result<Option<DsrExport>, ExportError>;

    /// Select and mark up to `limit` eligible jobs `processing` with
    /// `processing_started_at = now`, skipping rows held by another claimer.
    ///
    /// Eligible: `pending` and due (`next_attempt_at` unset or `<= now`), or
    /// `processing` with `processing_started_at < stale_before`.
    async fn claim_batch(
        &self,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<ClaimedExport>, ExportError>;

    /// `processing → completed` if the claim is still ours.
    ///
    /// Returns `false` when the claim was lost.
    async fn mark_completed(
        &self,
        claim: &ClaimedExport,
        qb_transaction_id: &str,
        exported_at: DateTime<Utc>,
    ) -> Result<bool, ExportError>;

    /// `processing → pending | failed` if the claim is still ours.
    ///
    /// Returns `false` when the claim was lost.
    async fn record_failure(
        &self,
        claim: &ClaimedExport,
        update: &FailureUpdate,
    ) -> Result<bool, ExportError>;
}
