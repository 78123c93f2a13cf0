//! DSR Service
//!
//! Caller-facing DSR operations: preview, export initiation, export status
//! and validation-account management. Exports themselves run later in the
//! scheduler; nothing here talks to the accounting system.

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info};

use super::error::ExportError;
use super::state::ExportStatus;
use super::store::ExportStore;
use super::types::{DsrExport, DsrReport, ExportCreation, ValidationAccount};

/// Outcome of an export request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportRequestOutcome {
    /// `false` when a job for the pair already existed
    pub created: bool,
    pub status: ExportStatus,
}

pub struct DsrService {
    store: Arc<dyn ExportStore>,
}

impl DsrService {
    pub fn new(store: Arc<dyn ExportStore>) -> Self {
        Self { store }
    }

    pub async fn preview(
        &self,
        store_id: &str,
        report_date: NaiveDate,
    ) -> Result<DsrReport, ExportError> {
        require("storeId", store_id)?;
        self.store
            .report(store_id, report_date)
            .await?
            .ok_or_else(|| ExportError::ReportNotFound {
                store_id: store_id.to_string(),
                report_date,
            })
    }

    /// Queue a report for export. Repeating the request is an idempotent
    /// success carrying the existing job's status.
    pub async fn request_export(
        &self,
        store_id: &str,
        report_date: NaiveDate,
    ) -> Result<ExportRequestOutcome, ExportError> {
        require("storeId", store_id)?;

        match self.store.create_export(store_id, report_date).await? {
            ExportCreation::Created => {
                info!(store_id, %report_date, "DSR export queued");
                Ok(ExportRequestOutcome {
                    created: true,
                    status: ExportStatus::Pending,
                })
            }
            ExportCreation::Existing(status) => {
                debug!(store_id, %report_date, %status, "DSR export already requested");
                Ok(ExportRequestOutcome {
                    created: false,
                    status,
                })
            }
        }
    }

    pub async fn export_status(
        &self,
        store_id: &str,
        report_date: NaiveDate,
    ) -> Result<DsrExport, ExportError> {
        require("storeId", store_id)?;
        self.store
            .export(store_id, report_date)
            .await?
            .ok_or_else(|| ExportError::ExportNotFound {
                store_id: store_id.to_string(),
                report_date,
            })
    }

    pub async fn validation_account(
        &self,
        account_number: &str,
    ) -> Result<ValidationAccount, ExportError> {
        require("accountNumber", account_number)?;
        self.store
            .validation_account(account_number)
            .await?
            .ok_or_else(|| ExportError::ValidationAccountNotFound(account_number.to_string()))
    }

    /// Compare-and-set `is_active`; setting the value it already holds is a
    /// conflict.
    pub async fn set_account_active(
        &self,
        account_number: &str,
        active: bool,
    ) -> Result<ValidationAccount, ExportError> {
        require("accountNumber", account_number)?;

        if let Some(account) = self
            .store
            .set_validation_account_active(account_number, active)
            .await?
        {
            info!(account_number, active, "Validation account status changed");
            return Ok(account);
        }

        match self.store.validation_account(account_number).await? {
            None => Err(ExportError::ValidationAccountNotFound(
                account_number.to_string(),
            )),
            Some(current) => Err(ExportError::InvalidStateTransition(format!(
                "account {} is already {}",
                account_number,
                if current.is_active { "active" } else { "inactive" }
            ))),
        }
    }
}

fn require(field: &'static str, value: &str) -> Result<(), ExportError> {
    if value.trim().is_empty() {
        return Err(ExportError::MissingField(field));
    }
    Ok(())
}
