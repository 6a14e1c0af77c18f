use crate::error::Result;
use crate::models::{MatchResult, ReconJob, ReconLogEntry, ReconStatus, ReconSummary};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::PgPool;
use std::str::FromStr;
use uuid::Uuid;

/// Counters carried into job finalization.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobTotals {
    pub matched: i32,
    pub unmatched: i32,
    pub total_external: i32,
    pub total_ledger: i32,
}

/// Durable record of reconciliation jobs and their per-row outcomes.
///
/// Jobs are keyed by (job_date, source_name): creating a job for a key
/// that already exists reuses the row, resetting it to RUNNING. Log rows
/// are append-only.
pub struct ReconJournal {
    pool: PgPool,
}

impl ReconJournal {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upserts the job row for (date, source) and returns its id.
    pub async fn create_job(&self, date: NaiveDate, source_name: &str) -> Result<Uuid> {
        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO recon_jobs (id, job_date, source_name, status, started_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (job_date, source_name)
            DO UPDATE SET
                status = EXCLUDED.status,
                started_at = EXCLUDED.started_at,
                error_message = NULL,
                updated_at = NOW()
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(date)
        .bind(source_name)
        .bind(ReconStatus::Running)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    pub async fn finalize_job(
        &self,
        job_id: Uuid,
        status: ReconStatus,
        totals: JobTotals,
        error_message: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE recon_jobs
            SET status = $2,
                total_external_txns = $3,
                total_ledger_txns = $4,
                matched_count = $5,
                unmatched_count = $6,
                error_message = $7,
                completed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(status)
        .bind(totals.total_external)
        .bind(totals.total_ledger)
        .bind(totals.matched)
        .bind(totals.unmatched)
        .bind(error_message)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn update_job_status(
        &self,
        job_id: Uuid,
        status: ReconStatus,
        error_message: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE recon_jobs
            SET status = $2,
                error_message = $3,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(status)
        .bind(error_message)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Appends one match outcome. Enrichment values ride in the result's
    /// metadata as strings and are lifted into typed columns here.
    pub async fn log_result(
        &self,
        date: NaiveDate,
        source_name: &str,
        result: &MatchResult,
    ) -> Result<()> {
        let ledger_amount = decimal_from_metadata(&result.metadata, "ledger_amount");
        let external_amount = decimal_from_metadata(&result.metadata, "external_amount");
        let currency = result
            .metadata
            .get("currency")
            .and_then(Value::as_str)
            .map(str::to_string);

        sqlx::query(
            r#"
            INSERT INTO recon_logs
                (recon_date, source_name, external_txn_id, ledger_txn_id, matched,
                 mismatch_reason, match_score, amount_difference, ledger_amount,
                 external_amount, currency, timestamp_diff_seconds, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(date)
        .bind(source_name)
        .bind(&result.external_txn_id)
        .bind(result.ledger_txn_id)
        .bind(result.matched)
        .bind(&result.mismatch_reason)
        .bind(result.match_score)
        .bind(result.amount_diff)
        .bind(ledger_amount)
        .bind(external_amount)
        .bind(currency)
        .bind(result.timestamp_diff_seconds)
        .bind(Value::Object(result.metadata.clone()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn job_by_id(&self, job_id: Uuid) -> Result<Option<ReconJob>> {
        let row = sqlx::query_as::<_, ReconJob>(
            r#"
            SELECT id, job_date, source_name, status, total_external_txns, total_ledger_txns,
                   matched_count, unmatched_count, error_message, started_at, completed_at,
                   created_at, updated_at
            FROM recon_jobs
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Job rows for a date, optionally narrowed to one source.
    pub async fn job_status(
        &self,
        date: NaiveDate,
        source_name: Option<&str>,
    ) -> Result<Vec<ReconJob>> {
        let rows = sqlx::query_as::<_, ReconJob>(
            r#"
            SELECT id, job_date, source_name, status, total_external_txns, total_ledger_txns,
                   matched_count, unmatched_count, error_message, started_at, completed_at,
                   created_at, updated_at
            FROM recon_jobs
            WHERE job_date = $1
              AND ($2::text IS NULL OR source_name = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(date)
        .bind(source_name)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn logs(
        &self,
        date: NaiveDate,
        source_name: Option<&str>,
        matched: Option<bool>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ReconLogEntry>> {
        let rows = sqlx::query_as::<_, ReconLogEntry>(
            r#"
            SELECT id, recon_date, source_name, external_txn_id, ledger_txn_id, matched,
                   mismatch_reason, match_score, amount_difference, ledger_amount,
                   external_amount, currency, timestamp_diff_seconds, metadata, created_at
            FROM recon_logs
            WHERE recon_date = $1
              AND ($2::text IS NULL OR source_name = $2)
              AND ($3::boolean IS NULL OR matched = $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(date)
        .bind(source_name)
        .bind(matched)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Aggregates the log rows of one (date, source); `None` when no rows
    /// exist yet.
    pub async fn summary(
        &self,
        date: NaiveDate,
        source_name: &str,
    ) -> Result<Option<ReconSummary>> {
        let summary = sqlx::query_as::<_, ReconSummary>(
            r#"
            SELECT
                COUNT(*) AS total_logs,
                COUNT(*) FILTER (WHERE matched) AS matched_count,
                COUNT(*) FILTER (WHERE NOT matched) AS unmatched_count,
                AVG(match_score) AS avg_match_score,
                SUM(ABS(amount_difference)) AS total_amount_variance,
                COUNT(DISTINCT external_txn_id) AS unique_external_txns,
                COUNT(DISTINCT ledger_txn_id) AS unique_ledger_txns
            FROM recon_logs
            WHERE recon_date = $1 AND source_name = $2
            "#,
        )
        .bind(date)
        .bind(source_name)
        .fetch_one(&self.pool)
        .await?;

        if summary.total_logs == 0 {
            return Ok(None);
        }
        Ok(Some(summary))
    }
}

fn decimal_from_metadata(metadata: &serde_json::Map<String, Value>, key: &str) -> Option<Decimal> {
    metadata
        .get(key)
        .and_then(Value::as_str)
        .and_then(|s| Decimal::from_str(s).ok())
}
