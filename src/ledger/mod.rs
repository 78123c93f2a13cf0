//! Transactional ledger with idempotent mutation
//!
//! # Components
//!
//! - [`PaymentRecorder`]: single credit per external payment id
//! - [`TransferEngine`]: two-sided debit/credit per external transfer id,
//!   lower-account-id-first locking
//! - [`LedgerStore`]: storage seam, implemented by [`PgLedgerStore`]
//!
//! # Invariants
//!
//! 1. **No negative balance**: every debit is a conditional update
//! 2. **At-most-once**: the idempotency marker row is written in the same
//!    atomic unit as the balance change, and rolled back with it
//! 3. **Double-entry**: each committed transfer has exactly one debit and one
//!    credit entry of the same amount

pub mod error;
#[cfg(test)]
pub mod mock;
pub mod payment;
pub mod pg;
pub mod store;
pub mod transfer;
pub mod types;

pub use error::LedgerError;
pub use payment::PaymentRecorder;
pub use pg::PgLedgerStore;
pub use store::{LedgerStore, LedgerTx};
pub use transfer::TransferEngine;
pub use types::{
    Account, AccountStatement, ApplyOutcome, EntryType, NewEntry, PaymentRequest, StatementLine,
    StatementLineKind, TransferRequest,
};
