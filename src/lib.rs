//! DSR Ledger
//!
//! Idempotent account ledger plus the daily-sales-report export pipeline.
//!
//! # Modules
//!
//! - [`ledger`] - payments and double-entry transfers, exactly once per external id
//! - [`export`] - DSR export jobs, claim scheduler and accounting client
//! - [`retry`] - bounded exponential retry for async actions
//! - [`gateway`] - axum HTTP API
//! - [`db`] - PostgreSQL pool lifecycle and schema
//! - [`config`] / [`logging`] - process setup

pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod gateway;
pub mod ledger;
pub mod logging;
pub mod retry;

pub use error::ErrorKind;
pub use retry::{RetryPolicy, retry_with_backoff};
