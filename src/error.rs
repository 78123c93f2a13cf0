//! Shared error taxonomy
//!
//! Every component error (`LedgerError`, `ExportError`, `AccountingError`)
//! classifies itself into one of these kinds. The HTTP gateway is the only
//! place that turns a kind into a status code.

use std::fmt;

/// Closed set of failure classes visible to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad or missing input, rejected before any storage mutation
    Validation,
    /// Referenced row does not exist
    NotFound,
    /// Request conflicts with current state (e.g. invalid state transition)
    Conflict,
    /// Debit would drive a balance below zero
    InsufficientFunds,
    /// Storage or external-service failure; safe to retry
    Transient,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::InsufficientFunds => "INSUFFICIENT_FUNDS",
            ErrorKind::Transient => "TRANSIENT",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
