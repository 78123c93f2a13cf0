//! Ledger domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Account row. Balance is in minor currency units and never negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Account {
    pub id: i64,
    pub balance: i64,
}

/// Side of a double-entry pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Debit,
    Credit,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Debit => "debit",
            EntryType::Credit => "credit",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transaction entry to be written under a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewEntry {
    pub transfer_id: i64,
    pub account_id: i64,
    pub amount: i64,
    pub entry_type: EntryType,
}

impl NewEntry {
    /// Balanced debit/credit pair for one transfer
    pub fn pair(transfer_id: i64, from_account_id: i64, to_account_id: i64, amount: i64) -> [Self; 2] {
        [
            NewEntry {
                transfer_id,
                account_id: from_account_id,
                amount,
                entry_type: EntryType::Debit,
            },
            NewEntry {
                transfer_id,
                account_id: to_account_id,
                amount,
                entry_type: EntryType::Credit,
            },
        ]
    }

    /// Effect on the account balance: negative for debits
    pub fn signed_amount(&self) -> i64 {
        match self.entry_type {
            EntryType::Debit => -self.amount,
            EntryType::Credit => self.amount,
        }
    }
}

/// Single credit request against an account
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub account_id: i64,
    /// Minor units; negative amounts are refunds
    pub amount: i64,
    pub external_payment_id: String,
}

/// Two-sided balance movement request
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub from_account_id: i64,
    pub to_account_id: i64,
    /// Minor units, strictly positive
    pub amount: i64,
    /// Client idempotency key
    pub transfer_id: String,
}

/// Result of an idempotent ledger mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Balances changed and the idempotency marker was committed
    Applied,
    /// The external id was already recorded; nothing changed
    Replayed,
}

impl ApplyOutcome {
    #[inline]
    pub fn applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied)
    }
}

/// What a statement line records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StatementLineKind {
    Payment,
    Debit,
    Credit,
}

/// One balance-affecting event on an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatementLine {
    pub kind: StatementLineKind,
    /// Signed effect on the balance
    pub amount: i64,
    /// External payment or transfer id
    pub reference: String,
    /// Other side of a transfer
    pub counterparty_account_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Current balance plus most recent activity, newest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatement {
    pub account_id: i64,
    pub balance: i64,
    pub lines: Vec<StatementLine>,
}
