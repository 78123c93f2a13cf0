//! In-memory export store and accounting client for tests

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use super::accounting::AccountingClient;
use super::error::{AccountingError, ExportError};
use super::state::ExportStatus;
use super::store::ExportStore;
use super::types::{
    ClaimedExport, DsrExport, DsrReport, ExportCreation, ExportPayload, FailureUpdate,
    ValidationAccount,
};

#[derive(Default)]
struct ExportState {
    reports: HashMap<(String, NaiveDate), DsrReport>,
    accounts: HashMap<String, ValidationAccount>,
    exports: Vec<DsrExport>,
    next_id: i64,
}

/// Claims run under one mutex, which gives the same exclusivity as
/// `SKIP LOCKED` for concurrent callers.
#[derive(Default)]
pub struct MemoryExportStore {
    state: Mutex<ExportState>,
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn report(store_id: &str, report_date: NaiveDate, account_number: &str) -> DsrReport {
    DsrReport {
        store_id: store_id.to_string(),
        report_date,
        account_number: account_number.to_string(),
        total_sales: Decimal::new(152075, 2),
        tax: Decimal::new(12166, 2),
        cash: Decimal::new(50000, 2),
        card: Decimal::new(102075, 2),
    }
}

impl MemoryExportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_report(&self, report: DsrReport) {
        self.state
            .lock()
            .unwrap()
            .reports
            .insert((report.store_id.clone(), report.report_date), report);
    }

    pub fn insert_account(&self, account_number: &str, client_name: &str, is_active: bool) {
        self.state.lock().unwrap().accounts.insert(
            account_number.to_string(),
            ValidationAccount {
                account_number: account_number.to_string(),
                client_name: client_name.to_string(),
                is_active,
            },
        );
    }

    /// Report plus active account plus a fresh `pending` job; returns the job id
    pub fn seed_pending(&self, store_id: &str, report_date: NaiveDate) -> i64 {
        let account = format!("ACC-{}", store_id);
        self.insert_account(&account, "Test Client", true);
        self.insert_report(report(store_id, report_date, &account));
        self.insert_export(store_id, report_date, ExportStatus::Pending, 0, None)
    }

    /// Insert a job row directly, bypassing validation
    pub fn insert_export(
        &self,
        store_id: &str,
        report_date: NaiveDate,
        status: ExportStatus,
        retry_count: i32,
        processing_started_at: Option<DateTime<Utc>>,
    ) -> i64 {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        state.exports.push(DsrExport {
            id,
            store_id: store_id.to_string(),
            report_date,
            status,
            retry_count,
            next_attempt_at: None,
            processing_started_at,
            qb_transaction_id: None,
            exported_at: None,
            last_error: None,
        });
        id
    }

    pub fn get(&self, id: i64) -> Option<DsrExport> {
        self.state
            .lock()
            .unwrap()
            .exports
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }

    pub fn export_count(&self) -> usize {
        self.state.lock().unwrap().exports.len()
    }
}

#[async_trait]
impl ExportStore for MemoryExportStore {
    async fn report(
        &self,
        store_id: &str,
        report_date: NaiveDate,
    ) -> Result<Option<DsrReport>, ExportError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .reports
            .get(&(store_id.to_string(), report_date))
            .cloned())
    }

    async fn validation_account(
        &self,
        account_number: &str,
    ) -> Result<Option<ValidationAccount>, ExportError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .accounts
            .get(account_number)
            .cloned())
    }

    async fn set_validation_account_active(
        &self,
        account_number: &str,
        active: bool,
    ) -> Result<Option<ValidationAccount>, ExportError> {
        let mut state = self.state.lock().unwrap();
        match state.accounts.get_mut(account_number) {
            Some(account) if account.is_active != active => {
                account.is_active = active;
                Ok(Some(account.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn create_export(
        &self,
        store_id: &str,
        report_date: NaiveDate,
    ) -> Result<ExportCreation, ExportError> {
        let mut state = self.state.lock().unwrap();

        let Some(report) = state.reports.get(&(store_id.to_string(), report_date)) else {
            return Err(ExportError::ReportNotFound {
                store_id: store_id.to_string(),
                report_date,
            });
        };
        let account_number = report.account_number.clone();
        if !state
            .accounts
            .get(&account_number)
            .is_some_and(|a| a.is_active)
        {
            return Err(ExportError::InactiveAccount(account_number));
        }

        if let Some(existing) = state
            .exports
            .iter()
            .find(|e| e.store_id == store_id && e.report_date == report_date)
        {
            return Ok(ExportCreation::Existing(existing.status));
        }

        state.next_id += 1;
        let id = state.next_id;
        state.exports.push(DsrExport {
            id,
            store_id: store_id.to_string(),
            report_date,
            status: ExportStatus::Pending,
            retry_count: 0,
            next_attempt_at: None,
            processing_started_at: None,
            qb_transaction_id: None,
            exported_at: None,
            last_error: None,
        });
        Ok(ExportCreation::Created)
    }

    async fn export(
        &self,
        store_id: &str,
        report_date: NaiveDate,
    ) -> Result<Option<DsrExport>, ExportError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .exports
            .iter()
            .find(|e| e.store_id == store_id && e.report_date == report_date)
            .cloned())
    }

    async fn claim_batch(
        &self,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<ClaimedExport>, ExportError> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        let mut claimed = Vec::new();

        for export in state.exports.iter_mut() {
            if claimed.len() >= limit as usize {
                break;
            }
            let due = match export.status {
                ExportStatus::Pending => export.next_attempt_at.is_none_or(|at| at <= now),
                ExportStatus::Processing => {
                    export.processing_started_at.is_some_and(|at| at < stale_before)
                }
                ExportStatus::Completed | ExportStatus::Failed => false,
            };
            if !due {
                continue;
            }
            let Some(report) = state
                .reports
                .get(&(export.store_id.clone(), export.report_date))
            else {
                continue;
            };

            export.status = ExportStatus::Processing;
            export.processing_started_at = Some(now);
            claimed.push(ClaimedExport {
                id: export.id,
                store_id: export.store_id.clone(),
                report_date: export.report_date,
                total_sales: report.total_sales,
                tax: report.tax,
                retry_count: export.retry_count,
                claimed_at: now,
            });
        }

        Ok(claimed)
    }

    async fn mark_completed(
        &self,
        claim: &ClaimedExport,
        qb_transaction_id: &str,
        exported_at: DateTime<Utc>,
    ) -> Result<bool, ExportError> {
        let mut state = self.state.lock().unwrap();
        let Some(export) = owned_by(&mut state.exports, claim) else {
            return Ok(false);
        };
        export.status = ExportStatus::Completed;
        export.qb_transaction_id = Some(qb_transaction_id.to_string());
        export.exported_at = Some(exported_at);
        export.last_error = None;
        Ok(true)
    }

    async fn record_failure(
        &self,
        claim: &ClaimedExport,
        update: &FailureUpdate,
    ) -> Result<bool, ExportError> {
        let mut state = self.state.lock().unwrap();
        let Some(export) = owned_by(&mut state.exports, claim) else {
            return Ok(false);
        };
        export.status = update.status;
        export.retry_count = update.retry_count;
        export.next_attempt_at = Some(update.next_attempt_at);
        export.last_error = Some(update.last_error.clone());
        Ok(true)
    }
}

fn owned_by<'a>(exports: &'a mut [DsrExport], claim: &ClaimedExport) -> Option<&'a mut DsrExport> {
    exports.iter_mut().find(|e| {
        e.id == claim.id
            && e.status == ExportStatus::Processing
            && e.processing_started_at == Some(claim.claimed_at)
    })
}

/// Accounting client that fails a fixed number of calls, then succeeds
pub struct MockAccountingClient {
    failures_left: AtomicU32,
    calls: AtomicU32,
    keys: Mutex<Vec<String>>,
}

impl MockAccountingClient {
    pub fn failing(times: u32) -> Self {
        Self {
            failures_left: AtomicU32::new(times),
            calls: AtomicU32::new(0),
            keys: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding() -> Self {
        Self::failing(0)
    }

    pub fn always_failing() -> Self {
        Self::failing(u32::MAX)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Idempotency keys in call order
    pub fn keys(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }
}

#[async_trait]
impl AccountingClient for MockAccountingClient {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn send_report(&self, payload: &ExportPayload) -> Result<String, AccountingError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.keys
            .lock()
            .unwrap()
            .push(payload.idempotency_key.clone());

        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(AccountingError::Unavailable(format!("mock failure #{}", call)));
        }
        Ok(format!("QB-TEST-{}", call))
    }
}
