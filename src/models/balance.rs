use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Projected balance for one account. Exactly one row exists per account;
/// it is created alongside the account with zero balances and mutated only
/// inside a transfer transaction. `version` increases on every projection.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Balance {
    pub account_id: Uuid,
    pub currency: String,
    pub available_balance: Decimal,
    /// Reserved for a two-phase hold flow; the transfer path never moves it.
    pub pending_balance: Decimal,
    pub version: i32,
    pub last_updated: DateTime<Utc>,
}

impl Balance {
    pub fn has_sufficient_funds(&self, amount: Decimal) -> bool {
        self.available_balance >= amount
    }
}
