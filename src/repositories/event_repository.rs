use crate::error::Result;
use crate::models::LedgerEvent;
use sqlx::PgPool;
use uuid::Uuid;

/// Read-side queries over the event log. Writes go through
/// `services::event_appender` because they only make sense inside a
/// transfer transaction.
pub struct EventRepository {
    pool: PgPool,
}

impl EventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Events where the account appears on either side, newest first.
    pub async fn by_account(&self, account_id: Uuid, limit: i64) -> Result<Vec<LedgerEvent>> {
        let rows = sqlx::query_as::<_, LedgerEvent>(
            r#"
            SELECT id, transaction_id, timestamp, source_account_id, destination_account_id,
                   amount, currency, event_type, status, metadata, created_at
            FROM ledger_events
            WHERE source_account_id = $1 OR destination_account_id = $1
            ORDER BY timestamp DESC
            LIMIT $2
            "#,
        )
        .bind(account_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn by_transaction(&self, transaction_id: Uuid) -> Result<Vec<LedgerEvent>> {
        let rows = sqlx::query_as::<_, LedgerEvent>(
            r#"
            SELECT id, transaction_id, timestamp, source_account_id, destination_account_id,
                   amount, currency, event_type, status, metadata, created_at
            FROM ledger_events
            WHERE transaction_id = $1
            ORDER BY timestamp ASC
            "#,
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
