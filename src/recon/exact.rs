use crate::config::ReconSettings;
use crate::models::{ExternalTxn, LedgerTxn, MatchResult};
use serde_json::Value;

use super::build_result;

const CRITERIA: &str = "ExactMatcher";

/// Exact matching: cross-reference ids first, then exact amount plus
/// currency within the timestamp tolerance. Pure and idempotent: the same
/// inputs always produce the same result.
pub struct ExactMatcher {
    timestamp_tolerance_seconds: i64,
}

impl ExactMatcher {
    pub fn new(settings: &ReconSettings) -> Self {
        Self {
            timestamp_tolerance_seconds: settings.timestamp_tolerance_seconds,
        }
    }

    pub fn match_one(&self, external: &ExternalTxn, candidates: &[LedgerTxn]) -> MatchResult {
        if let Some(candidate) = Self::find_reference_match(external, candidates) {
            return self.validate(external, candidate);
        }

        let amount_matches = self.find_amount_matches(external, candidates);
        match amount_matches.as_slice() {
            [single] => self.validate(external, single),
            [] => build_result(
                external,
                None,
                false,
                0.0,
                Some("No exact match found".to_string()),
                CRITERIA,
            ),
            _ => build_result(
                external,
                None,
                false,
                0.0,
                Some("Multiple exact amount matches found".to_string()),
                CRITERIA,
            ),
        }
    }

    /// Looks for an explicit cross-reference: the ledger row pointing at
    /// the external id, or the external row pointing at the ledger id.
    fn find_reference_match<'a>(
        external: &ExternalTxn,
        candidates: &'a [LedgerTxn],
    ) -> Option<&'a LedgerTxn> {
        candidates.iter().find(|ledger| {
            if let Some(Value::String(ext_id)) = ledger.metadata.get("external_txn_id") {
                if *ext_id == external.txn_id {
                    return true;
                }
            }
            if let Some(Value::String(ledger_id)) = external.metadata.get("ledger_txn_id") {
                if *ledger_id == ledger.id.to_string() {
                    return true;
                }
            }
            false
        })
    }

    fn find_amount_matches<'a>(
        &self,
        external: &ExternalTxn,
        candidates: &'a [LedgerTxn],
    ) -> Vec<&'a LedgerTxn> {
        candidates
            .iter()
            .filter(|ledger| {
                ledger.amount == external.amount
                    && ledger.currency == external.currency
                    && (external.timestamp - ledger.timestamp).num_seconds().abs()
                        <= self.timestamp_tolerance_seconds
            })
            .collect()
    }

    /// Re-checks the candidate; the first failing check sets the reason.
    fn validate(&self, external: &ExternalTxn, ledger: &LedgerTxn) -> MatchResult {
        if external.amount != ledger.amount {
            return build_result(
                external,
                Some(ledger),
                false,
                0.0,
                Some(format!(
                    "Amount mismatch: external={}, ledger={}",
                    external.amount, ledger.amount
                )),
                CRITERIA,
            );
        }

        if external.currency != ledger.currency {
            return build_result(
                external,
                Some(ledger),
                false,
                0.0,
                Some(format!(
                    "Currency mismatch: external={}, ledger={}",
                    external.currency, ledger.currency
                )),
                CRITERIA,
            );
        }

        let time_diff = (external.timestamp - ledger.timestamp).num_seconds().abs();
        if time_diff > self.timestamp_tolerance_seconds {
            return build_result(
                external,
                Some(ledger),
                false,
                0.0,
                Some(format!("Timestamp outside tolerance: diff={}s", time_diff)),
                CRITERIA,
            );
        }

        build_result(external, Some(ledger), true, 1.0, None, CRITERIA)
    }
}
