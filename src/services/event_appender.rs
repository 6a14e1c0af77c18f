use crate::error::Result;
use crate::models::{EventStatus, EventType, LedgerEvent};
use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

/// Appends the paired debit/credit rows for one transfer.
///
/// Both rows share a freshly generated `transaction_id` and are written in
/// the caller's transaction, so either both exist after commit or neither
/// does. Timestamps come from the store's clock.
pub struct EventAppender;

impl EventAppender {
    pub async fn append_transfer(
        tx: &mut Transaction<'_, Postgres>,
        source_account_id: Uuid,
        destination_account_id: Uuid,
        amount: Decimal,
        currency: &str,
        metadata: &serde_json::Value,
    ) -> Result<(LedgerEvent, LedgerEvent)> {
        let transaction_id = Uuid::new_v4();

        let debit = Self::insert_event(
            tx,
            transaction_id,
            Some(source_account_id),
            None,
            amount,
            currency,
            EventType::Debit,
            metadata,
        )
        .await?;

        let credit = Self::insert_event(
            tx,
            transaction_id,
            None,
            Some(destination_account_id),
            amount,
            currency,
            EventType::Credit,
            metadata,
        )
        .await?;

        Ok((debit, credit))
    }

    #[allow(clippy::too_many_arguments)]
    async fn insert_event(
        tx: &mut Transaction<'_, Postgres>,
        transaction_id: Uuid,
        source_account_id: Option<Uuid>,
        destination_account_id: Option<Uuid>,
        amount: Decimal,
        currency: &str,
        event_type: EventType,
        metadata: &serde_json::Value,
    ) -> Result<LedgerEvent> {
        let row = sqlx::query_as::<_, LedgerEvent>(
            r#"
            INSERT INTO ledger_events
                (transaction_id, source_account_id, destination_account_id,
                 amount, currency, event_type, status, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, transaction_id, timestamp, source_account_id, destination_account_id,
                      amount, currency, event_type, status, metadata, created_at
            "#,
        )
        .bind(transaction_id)
        .bind(source_account_id)
        .bind(destination_account_id)
        .bind(amount)
        .bind(currency)
        .bind(event_type)
        .bind(EventStatus::Settled)
        .bind(metadata)
        .fetch_one(&mut **tx)
        .await?;

        Ok(row)
    }
}
