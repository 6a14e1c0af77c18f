use crate::error::{AppError, Result};
use crate::models::{LedgerEvent, LedgerTxn};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

/// Reads the ledger's events for reconciliation, as `LedgerTxn`.
pub struct LedgerReader {
    pool: PgPool,
}

impl LedgerReader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All ledger events for one business day, oldest first.
    pub async fn transactions_for_date(&self, date: NaiveDate) -> Result<Vec<LedgerTxn>> {
        let rows = sqlx::query_as::<_, LedgerEvent>(
            r#"
            SELECT id, transaction_id, timestamp, source_account_id, destination_account_id,
                   amount, currency, event_type, status, metadata, created_at
            FROM ledger_events
            WHERE DATE(timestamp) = $1
            ORDER BY timestamp ASC
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(LedgerTxn::from).collect())
    }

    pub async fn transaction_by_id(&self, id: Uuid) -> Result<LedgerTxn> {
        let row = sqlx::query_as::<_, LedgerEvent>(
            r#"
            SELECT id, transaction_id, timestamp, source_account_id, destination_account_id,
                   amount, currency, event_type, status, metadata, created_at
            FROM ledger_events
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(LedgerTxn::from)
            .ok_or_else(|| AppError::not_found(format!("Transaction '{}' not found", id)))
    }

    /// Events within an amount band, used to pre-narrow fuzzy candidates.
    pub async fn transactions_by_amount_range(
        &self,
        date: NaiveDate,
        currency: &str,
        min_amount: Decimal,
        max_amount: Decimal,
    ) -> Result<Vec<LedgerTxn>> {
        let rows = sqlx::query_as::<_, LedgerEvent>(
            r#"
            SELECT id, transaction_id, timestamp, source_account_id, destination_account_id,
                   amount, currency, event_type, status, metadata, created_at
            FROM ledger_events
            WHERE DATE(timestamp) = $1
              AND currency = $2
              AND amount BETWEEN $3 AND $4
            ORDER BY timestamp ASC
            "#,
        )
        .bind(date)
        .bind(currency)
        .bind(min_amount)
        .bind(max_amount)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(LedgerTxn::from).collect())
    }
}
