use crate::error::{AppError, Result};
use crate::models::{Account, AccountType};
use crate::repositories::AccountRepository;
use sqlx::PgPool;
use uuid::Uuid;

/// Thin service over the account repository: creation with its balance
/// row, plus lookups that turn absence into `NotFound`.
pub struct AccountService {
    accounts: AccountRepository,
}

impl AccountService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            accounts: AccountRepository::new(pool),
        }
    }

    pub async fn create(
        &self,
        currency: &str,
        account_type: AccountType,
        metadata: Option<serde_json::Value>,
    ) -> Result<Account> {
        let metadata = metadata.unwrap_or_else(|| serde_json::json!({}));
        self.accounts.create(currency, account_type, metadata).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Account> {
        self.accounts
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Account '{}' not found", id)))
    }

    pub async fn exists(&self, id: Uuid) -> Result<bool> {
        self.accounts.exists(id).await
    }
}
