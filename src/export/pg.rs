//! PostgreSQL Export Job Store
//!
//! Claiming is `SELECT .. FOR UPDATE SKIP LOCKED` followed by the
//! `processing` mark in the same transaction. Outcome writes are guarded on
//! `(id, status = 'processing', processing_started_at = claimed_at)`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::collections::HashMap;

use super::error::ExportError;
use super::state::ExportStatus;
use super::store::ExportStore;
use super::types::{
    ClaimedExport, DsrExport, DsrReport, ExportCreation, FailureUpdate, ValidationAccount,
};

pub struct PgExportStore {
    pool: PgPool,
}

impl PgExportStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or replace a report (upstream feed / fixtures)
    pub async fn upsert_report(&self, report: &DsrReport) -> Result<(), ExportError> {
        sqlx::query(
            r#"
            INSERT INTO dsr_reports (store_id, report_date, account_number, total_sales, tax, cash, card)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (store_id, report_date) DO UPDATE SET
                account_number = EXCLUDED.account_number,
                total_sales = EXCLUDED.total_sales,
                tax = EXCLUDED.tax,
                cash = EXCLUDED.cash,
                card = EXCLUDED.card
            "#,
        )
        .bind(&report.store_id)
        .bind(report.report_date)
        .bind(&report.account_number)
        .bind(report.total_sales)
        .bind(report.tax)
        .bind(report.cash)
        .bind(report.card)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_validation_account(
        &self,
        account: &ValidationAccount,
    ) -> Result<(), ExportError> {
        sqlx::query(
            r#"
            INSERT INTO validation_accounts (account_number, client_name, is_active)
            VALUES ($1, $2, $3)
            ON CONFLICT (account_number) DO UPDATE SET
                client_name = EXCLUDED.client_name,
                is_active = EXCLUDED.is_active
            "#,
        )
        .bind(&account.account_number)
        .bind(&account.client_name)
        .bind(account.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn export_from_row(row: &PgRow) -> Result<DsrExport, ExportError> {
    let status: String = row.get("status");
    Ok(DsrExport {
        id: row.get("id"),
        store_id: row.get("store_id"),
        report_date: row.get("report_date"),
        status: status.parse().map_err(ExportError::Database)?,
        retry_count: row.get("retry_count"),
        next_attempt_at: row.get("next_attempt_at"),
        processing_started_at: row.get("processing_started_at"),
        qb_transaction_id: row.get("qb_transaction_id"),
        exported_at: row.get("exported_at"),
        last_error: row.get("last_error"),
    })
}

fn account_from_row(row: &PgRow) -> ValidationAccount {
    ValidationAccount {
        account_number: row.get("account_number"),
        client_name: row.get("client_name"),
        is_active: row.get("is_active"),
    }
}

#[async_trait]
impl ExportStore for PgExportStore {
    async fn report(
        &self,
        store_id: &str,
        report_date: NaiveDate,
    ) -> Result<Option<DsrReport>, ExportError> {
        let row = sqlx::query(
            r#"
            SELECT store_id, report_date, account_number, total_sales, tax, cash, card
            FROM dsr_reports
            WHERE store_id = $1 AND report_date = $2
            "#,
        )
        .bind(store_id)
        .bind(report_date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| DsrReport {
            store_id: r.get("store_id"),
            report_date: r.get("report_date"),
            account_number: r.get("account_number"),
            total_sales: r.get("total_sales"),
            tax: r.get("tax"),
            cash: r.get("cash"),
            card: r.get("card"),
        }))
    }

    async fn validation_account(
        &self,
        account_number: &str,
    ) -> Result<Option<ValidationAccount>, ExportError> {
        let row = sqlx::query(
            "SELECT account_number, client_name, is_active FROM validation_accounts WHERE account_number = $1",
        )
        .bind(account_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(account_from_row))
    }

    async fn set_validation_account_active(
        &self,
        account_number: &str,
        active: bool,
    ) -> Result<Option<ValidationAccount>, ExportError> {
        let row = sqlx::query(
            r#"
            UPDATE validation_accounts
            SET is_active = $1
            WHERE account_number = $2 AND is_active = NOT $1
            RETURNING account_number, client_name, is_active
            "#,
        )
        .bind(active)
        .bind(account_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(account_from_row))
    }

    async fn create_export(
        &self,
        store_id: &str,
        report_date: NaiveDate,
    ) -> Result<ExportCreation, ExportError> {
        let mut tx = self.pool.begin().await?;

        let account_number = sqlx::query_scalar::<_, String>(
            "SELECT account_number FROM dsr_reports WHERE store_id = $1 AND report_date = $2",
        )
        .bind(store_id)
        .bind(report_date)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ExportError::ReportNotFound {
            store_id: store_id.to_string(),
            report_date,
        })?;

        // FOR SHARE keeps a concurrent deactivation from slipping in before commit
        let active = sqlx::query_scalar::<_, bool>(
            "SELECT is_active FROM validation_accounts WHERE account_number = $1 FOR SHARE",
        )
        .bind(&account_number)
        .fetch_optional(&mut *tx)
        .await?;
        if active != Some(true) {
            return Err(ExportError::InactiveAccount(account_number));
        }

        let inserted = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO dsr_exports (store_id, report_date, status, retry_count)
            VALUES ($1, $2, 'pending', 0)
            ON CONFLICT (store_id, report_date) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(store_id)
        .bind(report_date)
        .fetch_optional(&mut *tx)
        .await?;

        let creation = match inserted {
            Some(_) => ExportCreation::Created,
            None => {
                let status: String = sqlx::query_scalar(
                    "SELECT status FROM dsr_exports WHERE store_id = $1 AND report_date = $2",
                )
                .bind(store_id)
                .bind(report_date)
                .fetch_one(&mut *tx)
                .await?;
                ExportCreation::Existing(status.parse().map_err(ExportError::Database)?)
            }
        };

        tx.commit().await?;
        Ok(creation)
    }

    async fn export(
        &self,
        store_id: &str,
        report_date: NaiveDate,
    ) -> Result<Option<DsrExport>, ExportError> {
        let row = sqlx::query(
            r#"
            SELECT id, store_id, report_date, status, retry_count, next_attempt_at,
                   processing_started_at, qb_transaction_id, exported_at, last_error
            FROM dsr_exports
            WHERE store_id = $1 AND report_date = $2
            "#,
        )
        .bind(store_id)
        .bind(report_date)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(export_from_row).transpose()
    }

    async fn claim_batch(
        &self,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<ClaimedExport>, ExportError> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            r#"
            SELECT e.id, e.store_id, e.report_date, e.retry_count, r.total_sales, r.tax
            FROM dsr_exports e
            JOIN dsr_reports r
              ON r.store_id = e.store_id AND r.report_date = e.report_date
            WHERE (e.status = 'pending'
                   AND (e.next_attempt_at IS NULL OR e.next_attempt_at <= $1))
               OR (e.status = 'processing' AND e.processing_started_at < $2)
            ORDER BY e.created_at, e.id
            LIMIT $3
            FOR UPDATE OF e SKIP LOCKED
            "#,
        )
        .bind(now)
        .bind(stale_before)
        .bind(i64::from(limit))
        .fetch_all(&mut *tx)
        .await?;

        if rows.is_empty() {
            tx.commit().await?;
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = rows.iter().map(|r| r.get("id")).collect();
        let marked = sqlx::query(
            r#"
            UPDATE dsr_exports
            SET status = 'processing', processing_started_at = $1, updated_at = NOW()
            WHERE id = ANY($2)
            RETURNING id, processing_started_at
            "#,
        )
        .bind(now)
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        // Postgres truncates to microseconds; the stored value is the token
        let tokens: HashMap<i64, DateTime<Utc>> = marked
            .iter()
            .map(|r| (r.get("id"), r.get("processing_started_at")))
            .collect();

        Ok(rows
            .iter()
            .filter_map(|r| {
                let id: i64 = r.get("id");
                tokens.get(&id).map(|&claimed_at| ClaimedExport {
                    id,
                    store_id: r.get("store_id"),
                    report_date: r.get("report_date"),
                    total_sales: r.get("total_sales"),
                    tax: r.get("tax"),
                    retry_count: r.get("retry_count"),
                    claimed_at,
                })
            })
            .collect())
    }

    async fn mark_completed(
        &self,
        claim: &ClaimedExport,
        qb_transaction_id: &str,
        exported_at: DateTime<Utc>,
    ) -> Result<bool, ExportError> {
        let result = sqlx::query(
            r#"
            UPDATE dsr_exports
            SET status = $1, qb_transaction_id = $2, exported_at = $3,
                last_error = NULL, updated_at = NOW()
            WHERE id = $4 AND status = 'processing' AND processing_started_at = $5
            "#,
        )
        .bind(ExportStatus::Completed.as_str())
        .bind(qb_transaction_id)
        .bind(exported_at)
        .bind(claim.id)
        .bind(claim.claimed_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_failure(
        &self,
        claim: &ClaimedExport,
        update: &FailureUpdate,
    ) -> Result<bool, ExportError> {
        let result = sqlx::query(
            r#"
            UPDATE dsr_exports
            SET status = $1, retry_count = $2, next_attempt_at = $3,
                last_error = $4, updated_at = NOW()
            WHERE id = $5 AND status = 'processing' AND processing_started_at = $6
            "#,
        )
        .bind(update.status.as_str())
        .bind(update.retry_count)
        .bind(update.next_attempt_at)
        .bind(&update.last_error)
        .bind(claim.id)
        .bind(claim.claimed_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
