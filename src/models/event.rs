use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Direction of a ledger event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "event_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// Money leaving `source_account_id`; destination is null.
    Debit,
    /// Money entering `destination_account_id`; source is null.
    Credit,
    Transfer,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Debit => "DEBIT",
            EventType::Credit => "CREDIT",
            EventType::Transfer => "TRANSFER",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "event_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Pending,
    Settled,
    Failed,
}

/// One immutable row of the event log. Events are appended in debit/credit
/// pairs sharing a `transaction_id`; for every transaction the credit
/// amounts sum to the debit amounts per currency. Timestamps come from the
/// store's clock at insert.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LedgerEvent {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub source_account_id: Option<Uuid>,
    pub destination_account_id: Option<Uuid>,
    pub amount: Decimal,
    pub currency: String,
    pub event_type: EventType,
    pub status: EventStatus,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// A transfer command before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub source_account_id: Uuid,
    pub destination_account_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    #[serde(default = "default_metadata")]
    pub metadata: serde_json::Value,
}

fn default_metadata() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}
