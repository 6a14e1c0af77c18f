use crate::error::Result;
use crate::models::Balance;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// Repository for balance rows. Delta application happens through an
/// upsert with server-side arithmetic so that concurrent transfers on
/// overlapping accounts serialise on the row lock instead of clobbering
/// each other's reads.
pub struct BalanceRepository {
    pool: PgPool,
}

impl BalanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Point-in-time read outside any transfer transaction. May be stale
    /// with respect to in-flight transfers.
    pub async fn get(&self, account_id: Uuid) -> Result<Option<Balance>> {
        let row = sqlx::query_as::<_, Balance>(
            r#"
            SELECT account_id, currency, available_balance, pending_balance, version, last_updated
            FROM balances
            WHERE account_id = $1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Reads the available balance inside the caller's transaction. Used
    /// for the funds check so check and debit cannot race.
    pub async fn available_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
    ) -> Result<Option<Decimal>> {
        let row: Option<(Decimal,)> = sqlx::query_as(
            r#"
            SELECT available_balance
            FROM balances
            WHERE account_id = $1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(row.map(|(available,)| available))
    }

    /// Applies an aggregated delta to one balance row within the caller's
    /// transaction. The conflict arm does the arithmetic server-side and
    /// bumps the version, which is what serialises overlapping transfers.
    pub async fn apply_delta(
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
        currency: &str,
        available_delta: Decimal,
        pending_delta: Decimal,
    ) -> Result<Balance> {
        let row = sqlx::query_as::<_, Balance>(
            r#"
            INSERT INTO balances (account_id, currency, available_balance, pending_balance, version)
            VALUES ($1, $2, $3, $4, 0)
            ON CONFLICT (account_id)
            DO UPDATE SET
                available_balance = balances.available_balance + $3,
                pending_balance = balances.pending_balance + $4,
                last_updated = NOW(),
                version = balances.version + 1
            RETURNING account_id, currency, available_balance, pending_balance, version, last_updated
            "#,
        )
        .bind(account_id)
        .bind(currency)
        .bind(available_delta)
        .bind(pending_delta)
        .fetch_one(&mut **tx)
        .await?;

        Ok(row)
    }
}
