//! Ledger Store seam
//!
//! The payment recorder and transfer engine drive their atomic units through
//! these traits; the Postgres store is the production implementation.

use async_trait::async_trait;

use super::error::LedgerError;
use super::types::{Account, AccountStatement, ApplyOutcome, NewEntry};

/// Durable ledger state
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Open a new atomic unit
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, LedgerError>;

    /// Read an account outside any unit
    async fn account(&self, account_id: i64) -> Result<Option<Account>, LedgerError>;

    /// Balance and newest `limit` ledger lines; `None` if the account is missing
    async fn statement(
        &self,
        account_id: i64,
        limit: i64,
    ) -> Result<Option<AccountStatement>, LedgerError>;
}

/// One open atomic unit. Dropping it without `commit` discards all writes.
#[async_trait]
pub trait LedgerTx: Send {
    /// Insert the payment idempotency marker.
    ///
    /// Returns `false` when `external_payment_id` already exists.
    async fn insert_payment(
        &mut self,
        account_id: i64,
        amount: i64,
        external_payment_id: &str,
    ) -> Result<bool, LedgerError>;

    /// Insert the transfer idempotency marker.
    ///
    /// Returns the new transfer row id, or `None` when
    /// `external_transfer_id` already exists.
    async fn insert_transfer(
        &mut self,
        from_account_id: i64,
        to_account_id: i64,
        amount: i64,
        external_transfer_id: &str,
    ) -> Result<Option<i64>, LedgerError>;

    /// Take exclusive row locks on `account_ids`, one at a time, in the
    /// order given. Returns the ids that exist.
    async fn lock_accounts(&mut self, account_ids: &[i64]) -> Result<Vec<i64>, LedgerError>;

    /// `balance += delta`, only if the result stays non-negative.
    ///
    /// Returns `false` when no row was updated (missing account or the
    /// balance would go negative).
    async fn adjust_balance(&mut self, account_id: i64, delta: i64) -> Result<bool, LedgerError>;

    async fn insert_entry(&mut self, entry: NewEntry) -> Result<(), LedgerError>;

    async fn commit(self: Box<Self>) -> Result<(), LedgerError>;

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError>;
}

/// Commit an applied unit; roll back a replayed or failed one.
///
/// Rollback failures are logged, never allowed to mask the original error.
pub(crate) async fn finish(
    tx: Box<dyn LedgerTx>,
    result: Result<ApplyOutcome, LedgerError>,
) -> Result<ApplyOutcome, LedgerError> {
    match result {
        Ok(ApplyOutcome::Applied) => {
            tx.commit().await?;
            Ok(ApplyOutcome::Applied)
        }
        Ok(ApplyOutcome::Replayed) => {
            if let Err(e) = tx.rollback().await {
                tracing::warn!(error = %e, "Rollback after idempotent replay failed");
            }
            Ok(ApplyOutcome::Replayed)
        }
        Err(err) => {
            if let Err(e) = tx.rollback().await {
                tracing::warn!(error = %e, original = %err, "Rollback failed");
            }
            Err(err)
        }
    }
}
