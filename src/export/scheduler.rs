//! Export Claim Scheduler
//!
//! Background driver that claims due export jobs on a fixed period and runs
//! one attempt per claimed job, concurrently. Cycles never overlap: a tick
//! is only taken after the previous cycle, including all of its attempts,
//! has finished.

use chrono::{DateTime, TimeDelta, Utc};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::accounting::AccountingClient;
use super::error::{AccountingError, ExportError};
use super::state::ExportStatus;
use super::store::ExportStore;
use super::types::{ClaimedExport, FailureUpdate};
use crate::retry::RetryPolicy;

/// Configuration for the export scheduler
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    pub poll_interval: Duration,
    /// Maximum jobs claimed (and attempted concurrently) per cycle
    pub batch_size: u32,
    /// A `processing` job claimed longer ago than this is reclaimed
    pub stale_after: Duration,
    /// Failed attempts before a job is terminally `failed`
    pub max_retries: u32,
    /// Job-level backoff: `retry_base * 2^retry_count`
    pub retry_base: Duration,
    /// Retries around the accounting call inside one attempt
    pub attempt_policy: RetryPolicy,
    /// Upper bound on a single accounting call
    pub call_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(50),
            batch_size: 5,
            stale_after: Duration::from_secs(120),
            max_retries: 3,
            retry_base: Duration::from_secs(10),
            attempt_policy: RetryPolicy::default(),
            call_timeout: Duration::from_secs(10),
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), ExportError> {
        if self.poll_interval.is_zero() {
            return Err(ExportError::Config("poll_interval must be positive".into()));
        }
        if self.batch_size == 0 {
            return Err(ExportError::Config("batch_size must be positive".into()));
        }
        if self.max_retries == 0 {
            return Err(ExportError::Config("max_retries must be positive".into()));
        }
        if self.call_timeout.is_zero() {
            return Err(ExportError::Config("call_timeout must be positive".into()));
        }
        let worst_case = self.worst_case_attempt();
        if self.stale_after <= worst_case {
            return Err(ExportError::Config(format!(
                "stale_after ({:?}) must exceed the worst-case attempt duration ({:?})",
                self.stale_after, worst_case
            )));
        }
        Ok(())
    }

    /// Longest one attempt can run: every call times out and every backoff
    /// sleep is taken
    pub fn worst_case_attempt(&self) -> Duration {
        self.call_timeout
            .saturating_mul(self.attempt_policy.max_attempts.max(1))
            .saturating_add(self.attempt_policy.worst_case_delay())
    }

    /// Claims started before this instant are considered abandoned
    pub fn stale_before(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(to_delta(self.stale_after))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Next eligibility for a job that has failed `retry_count` times before
    /// this failure
    pub fn next_attempt_at(&self, now: DateTime<Utc>, retry_count: i32) -> DateTime<Utc> {
        let exp = u32::try_from(retry_count).unwrap_or(0);
        1u32.checked_shl(exp)
            .and_then(|factor| self.retry_base.checked_mul(factor))
            .and_then(|delay| TimeDelta::from_std(delay).ok())
            .and_then(|delay| now.checked_add_signed(delay))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Status after one more failure on a job with `retry_count` prior failures
    pub fn status_after_failure(&self, retry_count: i32) -> ExportStatus {
        if i64::from(retry_count) + 1 >= i64::from(self.max_retries) {
            ExportStatus::Failed
        } else {
            ExportStatus::Pending
        }
    }

    pub fn failure_update(
        &self,
        claim: &ClaimedExport,
        error: String,
        now: DateTime<Utc>,
    ) -> FailureUpdate {
        FailureUpdate {
            status: self.status_after_failure(claim.retry_count),
            retry_count: claim.retry_count.saturating_add(1),
            next_attempt_at: self.next_attempt_at(now, claim.retry_count),
            last_error: error,
        }
    }
}

fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

/// What happened to one claimed job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Completed { qb_transaction_id: String },
    /// Back to `pending` for a later cycle
    Retrying { retry_count: i32 },
    Failed { retry_count: i32 },
    /// The claim was reclaimed by another pass before we could write
    ClaimLost,
}

/// Tally of one scheduler cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub claimed: usize,
    pub completed: usize,
    pub retrying: usize,
    pub failed: usize,
    pub lost: usize,
    /// Attempts whose outcome could not be written
    pub errors: usize,
}

impl CycleReport {
    fn record(&mut self, outcome: &AttemptOutcome) {
        match outcome {
            AttemptOutcome::Completed { .. } => self.completed += 1,
            AttemptOutcome::Retrying { .. } => self.retrying += 1,
            AttemptOutcome::Failed { .. } => self.failed += 1,
            AttemptOutcome::ClaimLost => self.lost += 1,
        }
    }
}

pub struct ExportScheduler {
    store: Arc<dyn ExportStore>,
    client: Arc<dyn AccountingClient>,
    config: SchedulerConfig,
}

impl ExportScheduler {
    pub fn new(
        store: Arc<dyn ExportStore>,
        client: Arc<dyn AccountingClient>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            client,
            config,
        }
    }

    /// Run cycles until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// A cycle in progress is always finished before stopping.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            batch_size = self.config.batch_size,
            stale_after_secs = self.config.stale_after.as_secs(),
            max_retries = self.config.max_retries,
            client = self.client.name(),
            "Starting DSR export scheduler"
        );

        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        error!(error = %e, "Export cycle failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("DSR export scheduler stopped");
    }

    pub async fn run_once(&self) -> Result<CycleReport, ExportError> {
        self.run_cycle(Utc::now()).await
    }

    /// Claim due jobs as of `now` and attempt each one
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleReport, ExportError> {
        let claims = self
            .store
            .claim_batch(now, self.config.stale_before(now), self.config.batch_size)
            .await?;

        let mut report = CycleReport {
            claimed: claims.len(),
            ..CycleReport::default()
        };

        if claims.is_empty() {
            debug!("No export jobs due");
            return Ok(report);
        }

        info!(count = claims.len(), "Claimed export jobs");

        let handles = claims.into_iter().map(|claim| {
            let store = self.store.clone();
            let client = self.client.clone();
            let config = self.config.clone();
            tokio::spawn(async move { process_claim(&*store, &*client, &config, claim).await })
        });

        for joined in join_all(handles).await {
            match joined {
                Ok(Ok(outcome)) => report.record(&outcome),
                Ok(Err(e)) => {
                    error!(error = %e, "Failed to record export outcome");
                    report.errors += 1;
                }
                Err(e) => {
                    error!(error = %e, "Export attempt task panicked");
                    report.errors += 1;
                }
            }
        }

        info!(
            claimed = report.claimed,
            completed = report.completed,
            retrying = report.retrying,
            failed = report.failed,
            lost = report.lost,
            errors = report.errors,
            "Export cycle finished"
        );
        Ok(report)
    }
}

/// Attempt one claimed job and write its outcome in a single guarded update
pub async fn process_claim(
    store: &dyn ExportStore,
    client: &dyn AccountingClient,
    config: &SchedulerConfig,
    claim: ClaimedExport,
) -> Result<AttemptOutcome, ExportError> {
    let payload = claim.payload();
    debug!(
        export_id = claim.id,
        idempotency_key = %payload.idempotency_key,
        retry_count = claim.retry_count,
        "Exporting DSR"
    );

    let payload_ref = &payload;
    let call_timeout = config.call_timeout;
    let result = config
        .attempt_policy
        .retry(|| async move {
            tokio::time::timeout(call_timeout, client.send_report(payload_ref))
                .await
                .unwrap_or_else(|_| Err(AccountingError::Timeout(call_timeout)))
        })
        .await;
    let now = Utc::now();

    match result {
        Ok(qb_transaction_id) => {
            if !store.mark_completed(&claim, &qb_transaction_id, now).await? {
                warn!(export_id = claim.id, "Claim lost before completion was recorded");
                return Ok(AttemptOutcome::ClaimLost);
            }
            info!(
                export_id = claim.id,
                store_id = %claim.store_id,
                report_date = %claim.report_date,
                qb_transaction_id = %qb_transaction_id,
                "DSR exported"
            );
            Ok(AttemptOutcome::Completed { qb_transaction_id })
        }
        Err(e) => {
            let update = config.failure_update(&claim, e.to_string(), now);
            if !store.record_failure(&claim, &update).await? {
                warn!(export_id = claim.id, "Claim lost before failure was recorded");
                return Ok(AttemptOutcome::ClaimLost);
            }

            let retry_count = update.retry_count;
            if update.status == ExportStatus::Failed {
                warn!(
                    export_id = claim.id,
                    store_id = %claim.store_id,
                    report_date = %claim.report_date,
                    retry_count,
                    error = %e,
                    "DSR export failed permanently"
                );
                Ok(AttemptOutcome::Failed { retry_count })
            } else {
                warn!(
                    export_id = claim.id,
                    retry_count,
                    next_attempt_at = %update.next_attempt_at,
                    error = %e,
                    "DSR export failed, rescheduled"
                );
                Ok(AttemptOutcome::Retrying { retry_count })
            }
        }
    }
}
