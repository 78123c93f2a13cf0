//! PostgreSQL Ledger Store
//!
//! Idempotency markers rely on `ON CONFLICT DO NOTHING` against the unique
//! external-id columns; balance updates are conditional single statements.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction};

use super::error::LedgerError;
use super::store::{LedgerStore, LedgerTx};
use super::types::{Account, AccountStatement, NewEntry, StatementLine, StatementLineKind};

pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a new account with an initial balance
    pub async fn create_account(&self, balance: i64) -> Result<i64, LedgerError> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO accounts (balance) VALUES ($1) RETURNING id",
        )
        .bind(balance)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, LedgerError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLedgerTx { tx }))
    }

    async fn account(&self, account_id: i64) -> Result<Option<Account>, LedgerError> {
        let row = sqlx::query("SELECT id, balance FROM accounts WHERE id = $1")
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| Account {
            id: r.get("id"),
            balance: r.get("balance"),
        }))
    }

    async fn statement(
        &self,
        account_id: i64,
        limit: i64,
    ) -> Result<Option<AccountStatement>, LedgerError> {
        let Some(account) = self.account(account_id).await? else {
            return Ok(None);
        };

        let rows = sqlx::query(
            r#"
            SELECT kind, amount, reference, counterparty, created_at FROM (
                SELECT 'payment' AS kind, p.amount, p.external_payment_id AS reference,
                       NULL::BIGINT AS counterparty, p.created_at, 0 AS source, p.id AS seq
                FROM payments p
                WHERE p.account_id = $1
                UNION ALL
                SELECT e.entry_type AS kind,
                       CASE WHEN e.entry_type = 'debit' THEN -e.amount ELSE e.amount END,
                       t.external_transfer_id,
                       CASE WHEN e.entry_type = 'debit' THEN t.to_account_id
                            ELSE t.from_account_id END,
                       e.created_at, 1 AS source, e.id
                FROM transaction_entries e
                JOIN transfers t ON t.id = e.transfer_id
                WHERE e.account_id = $1
            ) lines
            ORDER BY created_at DESC, source DESC, seq DESC
            LIMIT $2
            "#,
        )
        .bind(account_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut lines = Vec::with_capacity(rows.len());
        for row in rows {
            let kind: String = row.get("kind");
            let kind = match kind.as_str() {
                "payment" => StatementLineKind::Payment,
                "debit" => StatementLineKind::Debit,
                "credit" => StatementLineKind::Credit,
                other => {
                    return Err(LedgerError::Database(format!(
                        "Invalid statement line kind: {}",
                        other
                    )));
                }
            };
            lines.push(StatementLine {
                kind,
                amount: row.get("amount"),
                reference: row.get("reference"),
                counterparty_account_id: row.get("counterparty"),
                created_at: row.get("created_at"),
            });
        }

        Ok(Some(AccountStatement {
            account_id,
            balance: account.balance,
            lines,
        }))
    }
}

struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn insert_payment(
        &mut self,
        account_id: i64,
        amount: i64,
        external_payment_id: &str,
    ) -> Result<bool, LedgerError> {
        let inserted = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO payments (account_id, amount, external_payment_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (external_payment_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(account_id)
        .bind(amount)
        .bind(external_payment_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(inserted.is_some())
    }

    async fn insert_transfer(
        &mut self,
        from_account_id: i64,
        to_account_id: i64,
        amount: i64,
        external_transfer_id: &str,
    ) -> Result<Option<i64>, LedgerError> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO transfers (from_account_id, to_account_id, amount_cents, external_transfer_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (external_transfer_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(from_account_id)
        .bind(to_account_id)
        .bind(amount)
        .bind(external_transfer_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(id)
    }

    async fn lock_accounts(&mut self, account_ids: &[i64]) -> Result<Vec<i64>, LedgerError> {
        // One statement per row so the acquisition order is exactly the caller's
        let mut locked = Vec::with_capacity(account_ids.len());
        for &account_id in account_ids {
            let found = sqlx::query_scalar::<_, i64>(
                "SELECT id FROM accounts WHERE id = $1 FOR UPDATE",
            )
            .bind(account_id)
            .fetch_optional(&mut *self.tx)
            .await?;

            if let Some(id) = found {
                locked.push(id);
            }
        }
        Ok(locked)
    }

    async fn adjust_balance(&mut self, account_id: i64, delta: i64) -> Result<bool, LedgerError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET balance = balance + $1, updated_at = NOW()
            WHERE id = $2 AND balance + $1 >= 0
            "#,
        )
        .bind(delta)
        .bind(account_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_entry(&mut self, entry: NewEntry) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            INSERT INTO transaction_entries (transfer_id, account_id, amount, entry_type)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(entry.transfer_id)
        .bind(entry.account_id)
        .bind(entry.amount)
        .bind(entry.entry_type.as_str())
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), LedgerError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
