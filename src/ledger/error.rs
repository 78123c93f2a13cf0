//! Ledger Error Types

use thiserror::Error;

use crate::error::ErrorKind;

/// Errors raised by the payment recorder and transfer engine
///
/// Idempotent replays are not errors; see [`super::types::ApplyOutcome`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    // === Validation Errors ===
    #[error("Amount must be non-zero")]
    ZeroAmount,

    #[error("Amount must be a positive integer")]
    InvalidAmount,

    #[error("You cannot transfer to and from the same account")]
    SameAccount,

    #[error("{0} is required")]
    MissingField(&'static str),

    // === Consistency Errors ===
    #[error("Account not found: {0}")]
    AccountNotFound(i64),

    #[error("Insufficient funds")]
    InsufficientFunds,

    // === System Errors ===
    #[error("Database error: {0}")]
    Database(String),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::ZeroAmount
            | LedgerError::InvalidAmount
            | LedgerError::SameAccount
            | LedgerError::MissingField(_) => ErrorKind::Validation,
            LedgerError::AccountNotFound(_) => ErrorKind::NotFound,
            LedgerError::InsufficientFunds => ErrorKind::InsufficientFunds,
            LedgerError::Database(_) => ErrorKind::Transient,
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::Database(e.to_string())
    }
}
