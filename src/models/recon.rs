use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use uuid::Uuid;

use super::event::{EventType, LedgerEvent};

/// Job lifecycle. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "recon_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReconStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ReconStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconStatus::Pending => "PENDING",
            ReconStatus::Running => "RUNNING",
            ReconStatus::Completed => "COMPLETED",
            ReconStatus::Failed => "FAILED",
        }
    }
}

/// A transaction reported by an external source, normalised for matching.
/// In-memory only; never persisted as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalTxn {
    pub txn_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub timestamp: DateTime<Utc>,
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// A ledger event viewed through the reconciliation lens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerTxn {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub source_account_id: Option<Uuid>,
    pub destination_account_id: Option<Uuid>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl From<LedgerEvent> for LedgerTxn {
    fn from(event: LedgerEvent) -> Self {
        let metadata = match event.metadata {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            id: event.id,
            transaction_id: event.transaction_id,
            amount: event.amount,
            currency: event.currency,
            timestamp: event.timestamp,
            event_type: event.event_type,
            source_account_id: event.source_account_id,
            destination_account_id: event.destination_account_id,
            metadata,
        }
    }
}

/// Outcome of matching one external transaction against the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub matched: bool,
    pub match_score: f64,
    pub mismatch_reason: Option<String>,
    pub ledger_txn_id: Option<Uuid>,
    pub external_txn_id: String,
    pub amount_diff: Decimal,
    pub timestamp_diff_seconds: i64,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// One reconciliation run for a (date, source) pair. The pair is unique:
/// re-running reuses the row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReconJob {
    pub id: Uuid,
    pub job_date: NaiveDate,
    pub source_name: String,
    pub status: ReconStatus,
    pub total_external_txns: i32,
    pub total_ledger_txns: i32,
    pub matched_count: i32,
    pub unmatched_count: i32,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Durable per-row match outcome. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReconLogEntry {
    pub id: Uuid,
    pub recon_date: NaiveDate,
    pub source_name: String,
    pub external_txn_id: Option<String>,
    pub ledger_txn_id: Option<Uuid>,
    pub matched: bool,
    pub mismatch_reason: Option<String>,
    pub match_score: f64,
    pub amount_difference: Decimal,
    pub ledger_amount: Option<Decimal>,
    pub external_amount: Option<Decimal>,
    pub currency: Option<String>,
    pub timestamp_diff_seconds: Option<i64>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

/// Aggregate view over the log rows of one (date, source).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReconSummary {
    pub total_logs: i64,
    pub matched_count: i64,
    pub unmatched_count: i64,
    pub avg_match_score: Option<f64>,
    pub total_amount_variance: Option<Decimal>,
    pub unique_external_txns: i64,
    pub unique_ledger_txns: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn ledger_txn_from_event_keeps_object_metadata() {
        let event = LedgerEvent {
            id: Uuid::new_v4(),
            transaction_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source_account_id: Some(Uuid::new_v4()),
            destination_account_id: None,
            amount: dec!(10),
            currency: "USD".to_string(),
            event_type: EventType::Debit,
            status: super::super::event::EventStatus::Settled,
            metadata: serde_json::json!({"external_txn_id": "EXT-1"}),
            created_at: Utc::now(),
        };
        let txn = LedgerTxn::from(event);
        assert_eq!(
            txn.metadata.get("external_txn_id").and_then(Value::as_str),
            Some("EXT-1")
        );
    }

    #[test]
    fn ledger_txn_from_event_drops_non_object_metadata() {
        let event = LedgerEvent {
            id: Uuid::new_v4(),
            transaction_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source_account_id: None,
            destination_account_id: Some(Uuid::new_v4()),
            amount: dec!(10),
            currency: "USD".to_string(),
            event_type: EventType::Credit,
            status: super::super::event::EventStatus::Settled,
            metadata: Value::Null,
            created_at: Utc::now(),
        };
        assert!(LedgerTxn::from(event).metadata.is_empty());
    }
}
