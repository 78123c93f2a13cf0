//! Payment Recorder
//!
//! Applies a single credit (or refund) to one account, exactly once per
//! external payment id.

use std::sync::Arc;
use tracing::{debug, info};

use super::error::LedgerError;
use super::store::{LedgerStore, LedgerTx, finish};
use super::types::{ApplyOutcome, PaymentRequest};

pub struct PaymentRecorder {
    store: Arc<dyn LedgerStore>,
}

impl PaymentRecorder {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Record a payment.
    ///
    /// Replaying an already-recorded `external_payment_id` returns
    /// [`ApplyOutcome::Replayed`] and leaves the balance untouched.
    pub async fn record_payment(&self, req: &PaymentRequest) -> Result<ApplyOutcome, LedgerError> {
        validate(req)?;

        let mut tx = self.store.begin().await?;
        let result = apply(tx.as_mut(), req).await;
        let outcome = finish(tx, result).await?;

        match outcome {
            ApplyOutcome::Applied => info!(
                account_id = req.account_id,
                amount = req.amount,
                external_payment_id = %req.external_payment_id,
                "Payment recorded"
            ),
            ApplyOutcome::Replayed => debug!(
                external_payment_id = %req.external_payment_id,
                "Payment already recorded (idempotent)"
            ),
        }

        Ok(outcome)
    }
}

fn validate(req: &PaymentRequest) -> Result<(), LedgerError> {
    if req.amount == 0 {
        return Err(LedgerError::ZeroAmount);
    }
    if req.external_payment_id.trim().is_empty() {
        return Err(LedgerError::MissingField("externalPaymentId"));
    }
    Ok(())
}

async fn apply(tx: &mut dyn LedgerTx, req: &PaymentRequest) -> Result<ApplyOutcome, LedgerError> {
    if !tx
        .insert_payment(req.account_id, req.amount, &req.external_payment_id)
        .await?
    {
        return Ok(ApplyOutcome::Replayed);
    }

    if tx.lock_accounts(&[req.account_id]).await?.is_empty() {
        return Err(LedgerError::AccountNotFound(req.account_id));
    }

    // Only a refund can fail here
    if !tx.adjust_balance(req.account_id, req.amount).await? {
        return Err(LedgerError::InsufficientFunds);
    }

    Ok(ApplyOutcome::Applied)
}
