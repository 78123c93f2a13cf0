//! External accounting client
//!
//! The remote side deduplicates on `ExportPayload::idempotency_key`; callers
//! must send the same key for every attempt of one job.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::error::AccountingError;
use super::types::ExportPayload;
use crate::config::AccountingConfig;

#[async_trait]
pub trait AccountingClient: Send + Sync {
    /// Name for logs
    fn name(&self) -> &'static str;

    /// Post one report; returns the remote transaction id
    async fn send_report(&self, payload: &ExportPayload) -> Result<String, AccountingError>;
}

/// Stand-in for the QuickBooks endpoint: fixed latency, random failures
pub struct SimulatedAccountingClient {
    failure_rate: f64,
    latency: Duration,
}

impl SimulatedAccountingClient {
    pub fn new(failure_rate: f64, latency: Duration) -> Self {
        Self {
            failure_rate: failure_rate.clamp(0.0, 1.0),
            latency,
        }
    }

    pub fn from_config(config: &AccountingConfig) -> Self {
        Self::new(config.failure_rate, Duration::from_millis(config.latency_ms))
    }
}

#[async_trait]
impl AccountingClient for SimulatedAccountingClient {
    fn name(&self) -> &'static str {
        "simulated-quickbooks"
    }

    async fn send_report(&self, payload: &ExportPayload) -> Result<String, AccountingError> {
        tokio::time::sleep(self.latency).await;

        if rand::random::<f64>() < self.failure_rate {
            return Err(AccountingError::Unavailable(
                "simulated QuickBooks API failure".to_string(),
            ));
        }

        let transaction_id = format!("QB-{}", chrono::Utc::now().timestamp_millis());
        debug!(
            idempotency_key = %payload.idempotency_key,
            transaction_id = %transaction_id,
            "Report accepted by accounting service"
        );
        Ok(transaction_id)
    }
}
