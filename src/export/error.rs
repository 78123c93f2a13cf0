//! Export Error Types

use chrono::NaiveDate;
use std::time::Duration;
use thiserror::Error;

use crate::error::ErrorKind;

/// Errors from the export job store, DSR service and scheduler
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExportError {
    // === Validation Errors ===
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Invalid or inactive account: {0}")]
    InactiveAccount(String),

    #[error("Invalid scheduler configuration: {0}")]
    Config(String),

    // === Lookup Errors ===
    #[error("No DSR found for store {store_id} on {report_date}")]
    ReportNotFound {
        store_id: String,
        report_date: NaiveDate,
    },

    #[error("No export record found for store {store_id} on {report_date}")]
    ExportNotFound {
        store_id: String,
        report_date: NaiveDate,
    },

    #[error("No accounts match account number {0}")]
    ValidationAccountNotFound(String),

    // === State Errors ===
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    // === System Errors ===
    #[error("Database error: {0}")]
    Database(String),
}

impl ExportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExportError::MissingField(_)
            | ExportError::InactiveAccount(_)
            | ExportError::Config(_) => ErrorKind::Validation,
            ExportError::ReportNotFound { .. }
            | ExportError::ExportNotFound { .. }
            | ExportError::ValidationAccountNotFound(_) => ErrorKind::NotFound,
            ExportError::InvalidStateTransition(_) => ErrorKind::Conflict,
            ExportError::Database(_) => ErrorKind::Transient,
        }
    }
}

impl From<sqlx::Error> for ExportError {
    fn from(e: sqlx::Error) -> Self {
        ExportError::Database(e.to_string())
    }
}

/// Failure of one call to the external accounting system
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccountingError {
    #[error("Accounting service unavailable: {0}")]
    Unavailable(String),

    #[error("Accounting call timed out after {0:?}")]
    Timeout(Duration),
}

impl AccountingError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Transient
    }
}
