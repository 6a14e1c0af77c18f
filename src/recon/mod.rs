pub mod engine;
pub mod exact;
pub mod fuzzy;
pub mod journal;
pub mod ledger_reader;
pub mod scheduler;
pub mod sources;

pub use engine::ReconEngine;
pub use exact::ExactMatcher;
pub use fuzzy::FuzzyMatcher;
pub use journal::{JobTotals, ReconJournal};
pub use ledger_reader::LedgerReader;
pub use scheduler::ReconScheduler;
pub use sources::{SourceKind, SourceLoader, SourceParams};

use crate::models::{ExternalTxn, LedgerTxn, MatchResult};
use serde_json::Value;

/// Renders a metadata value the way it reads on the wire: strings stay
/// bare, everything else takes its JSON form.
pub(crate) fn value_as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Builds a `MatchResult` for an external transaction against an optional
/// ledger candidate. Diffs are external-minus-ledger.
pub(crate) fn build_result(
    external: &ExternalTxn,
    ledger: Option<&LedgerTxn>,
    matched: bool,
    score: f64,
    reason: Option<String>,
    criteria: &str,
) -> MatchResult {
    let (amount_diff, timestamp_diff_seconds) = match ledger {
        Some(txn) => (
            external.amount - txn.amount,
            (external.timestamp - txn.timestamp).num_seconds(),
        ),
        None => (rust_decimal::Decimal::ZERO, 0),
    };

    let mut metadata = serde_json::Map::new();
    metadata.insert(
        "external_description".to_string(),
        external
            .description
            .clone()
            .map(Value::String)
            .unwrap_or(Value::Null),
    );
    metadata.insert(
        "ledger_event_type".to_string(),
        ledger
            .map(|txn| Value::String(txn.event_type.as_str().to_string()))
            .unwrap_or(Value::Null),
    );
    metadata.insert(
        "match_criteria".to_string(),
        Value::String(criteria.to_string()),
    );

    MatchResult {
        matched,
        match_score: score,
        mismatch_reason: reason,
        ledger_txn_id: ledger.map(|txn| txn.id),
        external_txn_id: external.txn_id.clone(),
        amount_diff,
        timestamp_diff_seconds,
        metadata,
    }
}
