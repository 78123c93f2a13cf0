//! Transfer Engine
//!
//! Moves funds between two accounts inside one atomic unit:
//!
//! ```text
//! 1. insert transfer marker      (duplicate → Replayed)
//! 2. lock both accounts          (lower id first)
//! 3. debit source                (only if balance >= amount)
//! 4. credit destination
//! 5. write debit + credit entries
//! ```
//!
//! Any failure rolls back all five steps, including the marker, so the same
//! transfer id can be retried later.
//!
//! # Deadlock avoidance
//!
//! Every transfer locks the lower account id first. Two transfers over the
//! same pair in opposite directions therefore queue on the same first lock
//! instead of each holding one row and waiting for the other.

use std::sync::Arc;
use tracing::{debug, info};

use super::error::LedgerError;
use super::store::{LedgerStore, LedgerTx, finish};
use super::types::{ApplyOutcome, NewEntry, TransferRequest};

pub struct TransferEngine {
    store: Arc<dyn LedgerStore>,
}

impl TransferEngine {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Record a transfer. Validation failures never touch storage.
    pub async fn record_transfer(&self, req: &TransferRequest) -> Result<ApplyOutcome, LedgerError> {
        validate(req)?;

        let mut tx = self.store.begin().await?;
        let result = apply(tx.as_mut(), req).await;
        let outcome = finish(tx, result).await?;

        match outcome {
            ApplyOutcome::Applied => info!(
                from = req.from_account_id,
                to = req.to_account_id,
                amount = req.amount,
                transfer_id = %req.transfer_id,
                "Transfer committed"
            ),
            ApplyOutcome::Replayed => debug!(
                transfer_id = %req.transfer_id,
                "Transfer already applied (idempotent)"
            ),
        }

        Ok(outcome)
    }
}

/// Lock acquisition order for a transfer: lower id first
#[inline]
pub fn lock_order(a: i64, b: i64) -> [i64; 2] {
    if a < b { [a, b] } else { [b, a] }
}

fn validate(req: &TransferRequest) -> Result<(), LedgerError> {
    if req.from_account_id == req.to_account_id {
        return Err(LedgerError::SameAccount);
    }
    if req.amount <= 0 {
        return Err(LedgerError::InvalidAmount);
    }
    if req.transfer_id.trim().is_empty() {
        return Err(LedgerError::MissingField("transferId"));
    }
    Ok(())
}

async fn apply(tx: &mut dyn LedgerTx, req: &TransferRequest) -> Result<ApplyOutcome, LedgerError> {
    // 1. Idempotency gate
    let Some(transfer_row_id) = tx
        .insert_transfer(
            req.from_account_id,
            req.to_account_id,
            req.amount,
            &req.transfer_id,
        )
        .await?
    else {
        return Ok(ApplyOutcome::Replayed);
    };

    // 2. Deterministic lock ordering
    let order = lock_order(req.from_account_id, req.to_account_id);
    let locked = tx.lock_accounts(&order).await?;
    if let Some(missing) = order.into_iter().find(|id| !locked.contains(id)) {
        return Err(LedgerError::AccountNotFound(missing));
    }

    // 3. Debit, conditioned on sufficient balance
    if !tx.adjust_balance(req.from_account_id, -req.amount).await? {
        return Err(LedgerError::InsufficientFunds);
    }

    // 4. Credit
    if !tx.adjust_balance(req.to_account_id, req.amount).await? {
        return Err(LedgerError::AccountNotFound(req.to_account_id));
    }

    // 5. Double-entry pair
    for entry in NewEntry::pair(
        transfer_row_id,
        req.from_account_id,
        req.to_account_id,
        req.amount,
    ) {
        tx.insert_entry(entry).await?;
    }

    Ok(ApplyOutcome::Applied)
}
