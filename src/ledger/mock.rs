//! In-memory ledger store for tests
//!
//! Units are fully serialized through one async mutex and work on a private
//! copy of the state, published only on commit.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

use super::error::LedgerError;
use super::store::{LedgerStore, LedgerTx};
use super::types::{
    Account, AccountStatement, EntryType, NewEntry, StatementLine, StatementLineKind,
};

#[derive(Debug, Clone)]
struct PaymentRow {
    seq: i64,
    account_id: i64,
    amount: i64,
    external_id: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct TransferRow {
    id: i64,
    from_account_id: i64,
    to_account_id: i64,
    external_id: String,
}

#[derive(Debug, Clone)]
struct EntryRow {
    seq: i64,
    entry: NewEntry,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
struct LedgerState {
    accounts: BTreeMap<i64, i64>,
    payments: Vec<PaymentRow>,
    transfers: Vec<TransferRow>,
    entries: Vec<EntryRow>,
    next_seq: i64,
}

impl LedgerState {
    fn next_seq(&mut self) -> i64 {
        self.next_seq += 1;
        self.next_seq
    }
}

pub struct MemoryLedgerStore {
    unit_lock: Arc<tokio::sync::Mutex<()>>,
    state: Arc<Mutex<LedgerState>>,
    fail_entries: Arc<AtomicBool>,
    units_opened: AtomicUsize,
    lock_log: Arc<Mutex<Vec<Vec<i64>>>>,
}

impl MemoryLedgerStore {
    pub fn with_accounts(accounts: &[(i64, i64)]) -> Self {
        let state = LedgerState {
            accounts: accounts.iter().copied().collect(),
            ..LedgerState::default()
        };
        Self {
            unit_lock: Arc::new(tokio::sync::Mutex::new(())),
            state: Arc::new(Mutex::new(state)),
            fail_entries: Arc::new(AtomicBool::new(false)),
            units_opened: AtomicUsize::new(0),
            lock_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn balance(&self, account_id: i64) -> Option<i64> {
        self.state.lock().unwrap().accounts.get(&account_id).copied()
    }

    pub fn set_balance(&self, account_id: i64, balance: i64) {
        self.state
            .lock()
            .unwrap()
            .accounts
            .insert(account_id, balance);
    }

    pub fn total_balance(&self) -> i64 {
        self.state.lock().unwrap().accounts.values().sum()
    }

    pub fn payment_count(&self) -> usize {
        self.state.lock().unwrap().payments.len()
    }

    pub fn transfer_count(&self) -> usize {
        self.state.lock().unwrap().transfers.len()
    }

    /// Committed entries under the transfer with this external id
    pub fn entries_for(&self, external_transfer_id: &str) -> Vec<NewEntry> {
        let state = self.state.lock().unwrap();
        let Some(transfer) = state
            .transfers
            .iter()
            .find(|t| t.external_id == external_transfer_id)
        else {
            return Vec::new();
        };
        state
            .entries
            .iter()
            .filter(|e| e.entry.transfer_id == transfer.id)
            .map(|e| e.entry)
            .collect()
    }

    /// Make every `insert_entry` fail, simulating a storage error at step 5
    pub fn fail_entry_inserts(&self, fail: bool) {
        self.fail_entries.store(fail, Ordering::SeqCst);
    }

    pub fn units_opened(&self) -> usize {
        self.units_opened.load(Ordering::SeqCst)
    }

    /// Account ids in the order each `lock_accounts` call requested them
    pub fn lock_log(&self) -> Vec<Vec<i64>> {
        self.lock_log.lock().unwrap().clone()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, LedgerError> {
        let guard = self.unit_lock.clone().lock_owned().await;
        self.units_opened.fetch_add(1, Ordering::SeqCst);
        let working = self.state.lock().unwrap().clone();
        Ok(Box::new(MemoryLedgerTx {
            _guard: guard,
            working,
            shared: self.state.clone(),
            fail_entries: self.fail_entries.load(Ordering::SeqCst),
            lock_log: self.lock_log.clone(),
        }))
    }

    async fn account(&self, account_id: i64) -> Result<Option<Account>, LedgerError> {
        Ok(self.balance(account_id).map(|balance| Account {
            id: account_id,
            balance,
        }))
    }

    async fn statement(
        &self,
        account_id: i64,
        limit: i64,
    ) -> Result<Option<AccountStatement>, LedgerError> {
        let state = self.state.lock().unwrap();
        let Some(balance) = state.accounts.get(&account_id).copied() else {
            return Ok(None);
        };

        let mut lines: Vec<(i64, StatementLine)> = state
            .payments
            .iter()
            .filter(|p| p.account_id == account_id)
            .map(|p| {
                (
                    p.seq,
                    StatementLine {
                        kind: StatementLineKind::Payment,
                        amount: p.amount,
                        reference: p.external_id.clone(),
                        counterparty_account_id: None,
                        created_at: p.created_at,
                    },
                )
            })
            .collect();

        for row in state.entries.iter().filter(|e| e.entry.account_id == account_id) {
            let Some(transfer) = state
                .transfers
                .iter()
                .find(|t| t.id == row.entry.transfer_id)
            else {
                continue;
            };
            let (kind, counterparty) = match row.entry.entry_type {
                EntryType::Debit => (StatementLineKind::Debit, transfer.to_account_id),
                EntryType::Credit => (StatementLineKind::Credit, transfer.from_account_id),
            };
            lines.push((
                row.seq,
                StatementLine {
                    kind,
                    amount: row.entry.signed_amount(),
                    reference: transfer.external_id.clone(),
                    counterparty_account_id: Some(counterparty),
                    created_at: row.created_at,
                },
            ));
        }

        lines.sort_by(|a, b| b.0.cmp(&a.0));
        lines.truncate(limit.max(0) as usize);

        Ok(Some(AccountStatement {
            account_id,
            balance,
            lines: lines.into_iter().map(|(_, line)| line).collect(),
        }))
    }
}

struct MemoryLedgerTx {
    _guard: OwnedMutexGuard<()>,
    working: LedgerState,
    shared: Arc<Mutex<LedgerState>>,
    fail_entries: bool,
    lock_log: Arc<Mutex<Vec<Vec<i64>>>>,
}

#[async_trait]
impl LedgerTx for MemoryLedgerTx {
    async fn insert_payment(
        &mut self,
        account_id: i64,
        amount: i64,
        external_payment_id: &str,
    ) -> Result<bool, LedgerError> {
        if self
            .working
            .payments
            .iter()
            .any(|p| p.external_id == external_payment_id)
        {
            return Ok(false);
        }
        let seq = self.working.next_seq();
        self.working.payments.push(PaymentRow {
            seq,
            account_id,
            amount,
            external_id: external_payment_id.to_string(),
            created_at: Utc::now(),
        });
        Ok(true)
    }

    async fn insert_transfer(
        &mut self,
        from_account_id: i64,
        to_account_id: i64,
        _amount: i64,
        external_transfer_id: &str,
    ) -> Result<Option<i64>, LedgerError> {
        if self
            .working
            .transfers
            .iter()
            .any(|t| t.external_id == external_transfer_id)
        {
            return Ok(None);
        }
        let id = self.working.next_seq();
        self.working.transfers.push(TransferRow {
            id,
            from_account_id,
            to_account_id,
            external_id: external_transfer_id.to_string(),
        });
        Ok(Some(id))
    }

    async fn lock_accounts(&mut self, account_ids: &[i64]) -> Result<Vec<i64>, LedgerError> {
        self.lock_log.lock().unwrap().push(account_ids.to_vec());
        Ok(account_ids
            .iter()
            .copied()
            .filter(|id| self.working.accounts.contains_key(id))
            .collect())
    }

    async fn adjust_balance(&mut self, account_id: i64, delta: i64) -> Result<bool, LedgerError> {
        match self.working.accounts.get_mut(&account_id) {
            Some(balance) if *balance + delta >= 0 => {
                *balance += delta;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_entry(&mut self, entry: NewEntry) -> Result<(), LedgerError> {
        if self.fail_entries {
            return Err(LedgerError::Database("simulated entry insert failure".into()));
        }
        let seq = self.working.next_seq();
        self.working.entries.push(EntryRow {
            seq,
            entry,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), LedgerError> {
        let MemoryLedgerTx {
            _guard,
            working,
            shared,
            ..
        } = *self;
        *shared.lock().unwrap() = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError> {
        Ok(())
    }
}
