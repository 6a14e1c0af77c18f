use crate::error::{AppError, Result};
use crate::models::{Account, AccountType};
use sqlx::PgPool;
use uuid::Uuid;

/// Repository for accounts. Creation also seeds the account's balance row
/// inside the same transaction, so an account is never observable without
/// a balance.
pub struct AccountRepository {
    pool: PgPool,
}

impl AccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts an account and its zeroed balance row atomically.
    pub async fn create(
        &self,
        currency: &str,
        account_type: AccountType,
        metadata: serde_json::Value,
    ) -> Result<Account> {
        if currency.len() != 3 {
            return Err(AppError::validation(
                "Currency must be a 3-letter ISO 4217 code",
            ));
        }

        let mut tx = self.pool.begin().await?;

        let account = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (currency, type, metadata)
            VALUES ($1, $2, $3)
            RETURNING id, currency, type, metadata, created_at, updated_at
            "#,
        )
        .bind(currency)
        .bind(account_type)
        .bind(&metadata)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::Conflict("account already exists".to_string())
            }
            other => AppError::Database(other),
        })?;

        sqlx::query(
            r#"
            INSERT INTO balances (account_id, currency, available_balance, pending_balance, version)
            VALUES ($1, $2, 0, 0, 0)
            "#,
        )
        .bind(account.id)
        .bind(currency)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(account)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>> {
        let row = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, currency, type, metadata, created_at, updated_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn exists(&self, id: Uuid) -> Result<bool> {
        let row: Option<(i32,)> = sqlx::query_as("SELECT 1 FROM accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }
}
