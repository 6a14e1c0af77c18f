use crate::config::ReconSettings;
use crate::error::Result;
use crate::models::{ExternalTxn, LedgerTxn, MatchResult, ReconStatus};
use chrono::NaiveDate;
use metrics::counter;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    build_result, ExactMatcher, FuzzyMatcher, JobTotals, LedgerReader, ReconJournal, SourceKind,
    SourceLoader, SourceParams,
};

enum RunOutcome {
    Completed(JobTotals),
    Cancelled,
}

/// Orchestrates one reconciliation job: load both populations, run the
/// exact-then-fuzzy cascade per external transaction, journal every
/// outcome, finalise the job row.
pub struct ReconEngine {
    settings: ReconSettings,
    journal: ReconJournal,
    ledger: LedgerReader,
    exact: ExactMatcher,
    fuzzy: FuzzyMatcher,
}

impl ReconEngine {
    pub fn new(pool: PgPool, settings: ReconSettings) -> Self {
        Self {
            journal: ReconJournal::new(pool.clone()),
            ledger: LedgerReader::new(pool),
            exact: ExactMatcher::new(&settings),
            fuzzy: FuzzyMatcher::new(&settings),
            settings,
        }
    }

    pub fn settings(&self) -> &ReconSettings {
        &self.settings
    }

    pub fn journal(&self) -> &ReconJournal {
        &self.journal
    }

    pub fn available_sources() -> Vec<&'static str> {
        SourceKind::ALL.iter().map(|k| k.as_str()).collect()
    }

    /// Runs reconciliation for one (date, source) and returns the job id.
    ///
    /// Source-load and storage failures abort the job and leave it FAILED
    /// with the error message; per-row problems only degrade that row.
    /// Callers must not run the same (date, source) concurrently.
    pub async fn run(
        &self,
        date: NaiveDate,
        kind: SourceKind,
        params: &SourceParams,
    ) -> Result<Uuid> {
        params.validate_for(kind)?;

        let source_name = kind.as_str();
        let job_id = self.journal.create_job(date, source_name).await?;
        tracing::info!(%job_id, %date, source = source_name, "reconciliation job started");

        match self.execute(job_id, date, kind, params).await {
            Ok(RunOutcome::Completed(totals)) => {
                self.journal
                    .finalize_job(job_id, ReconStatus::Completed, totals, None)
                    .await?;
                counter!("recon_jobs_total", "status" => "completed").increment(1);
                tracing::info!(
                    %job_id,
                    matched = totals.matched,
                    unmatched = totals.unmatched,
                    "reconciliation job completed"
                );
                Ok(job_id)
            }
            Ok(RunOutcome::Cancelled) => {
                counter!("recon_jobs_total", "status" => "cancelled").increment(1);
                tracing::warn!(%job_id, "reconciliation job cancelled externally");
                Ok(job_id)
            }
            Err(err) => {
                let message = err.to_string();
                if let Err(finalize_err) = self
                    .journal
                    .finalize_job(job_id, ReconStatus::Failed, JobTotals::default(), Some(&message))
                    .await
                {
                    tracing::error!(%job_id, error = %finalize_err, "failed to mark job FAILED");
                }
                counter!("recon_jobs_total", "status" => "failed").increment(1);
                tracing::error!(%job_id, error = %message, "reconciliation job failed");
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        job_id: Uuid,
        date: NaiveDate,
        kind: SourceKind,
        params: &SourceParams,
    ) -> Result<RunOutcome> {
        let source_name = kind.as_str();

        let loader = SourceLoader::new(kind, params)?;
        let external_txns = loader.load(date).await?;
        tracing::info!(count = external_txns.len(), "loaded external transactions");

        let ledger_txns = self.ledger.transactions_for_date(date).await?;
        tracing::info!(count = ledger_txns.len(), "loaded ledger transactions");

        let mut totals = JobTotals {
            total_external: external_txns.len() as i32,
            total_ledger: ledger_txns.len() as i32,
            ..Default::default()
        };

        for external in &external_txns {
            // Cooperative cancellation: an external actor flips the job to
            // FAILED (user cancel); we notice between rows and stop.
            if let Some(job) = self.journal.job_by_id(job_id).await? {
                if job.status == ReconStatus::Failed {
                    return Ok(RunOutcome::Cancelled);
                }
            }

            let result = match self.match_and_enrich(external, &ledger_txns) {
                Ok(result) => result,
                Err(err) => {
                    tracing::error!(
                        external_txn = %external.txn_id,
                        error = %err,
                        "error processing external transaction"
                    );
                    build_result(
                        external,
                        None,
                        false,
                        0.0,
                        Some(format!("Processing error: {}", err)),
                        "ReconEngine",
                    )
                }
            };

            self.journal.log_result(date, source_name, &result).await?;

            if result.matched {
                totals.matched += 1;
                counter!("recon_rows_total", "outcome" => "matched").increment(1);
            } else {
                totals.unmatched += 1;
                counter!("recon_rows_total", "outcome" => "unmatched").increment(1);
            }

            tracing::debug!(
                external_txn = %external.txn_id,
                matched = result.matched,
                score = result.match_score,
                "processed external transaction"
            );
        }

        Ok(RunOutcome::Completed(totals))
    }

    fn match_and_enrich(
        &self,
        external: &ExternalTxn,
        ledger_txns: &[LedgerTxn],
    ) -> Result<MatchResult> {
        let result = self.match_transaction(external, ledger_txns);
        Ok(Self::enrich(result, external, ledger_txns))
    }

    /// Currency-filters the ledger side, then runs the exact matcher and,
    /// if it did not match, the fuzzy matcher. The higher-scoring result
    /// wins; exact wins ties.
    fn match_transaction(
        &self,
        external: &ExternalTxn,
        ledger_txns: &[LedgerTxn],
    ) -> MatchResult {
        let currency_filtered: Vec<LedgerTxn> = ledger_txns
            .iter()
            .filter(|txn| txn.currency == external.currency)
            .cloned()
            .collect();

        if currency_filtered.is_empty() {
            return build_result(
                external,
                None,
                false,
                0.0,
                Some(format!(
                    "No ledger transactions found for currency {}",
                    external.currency
                )),
                "ReconEngine",
            );
        }

        let exact_result = self.exact.match_one(external, &currency_filtered);
        if exact_result.matched {
            return exact_result;
        }

        let fuzzy_result = self.fuzzy.match_one(external, &currency_filtered);
        if fuzzy_result.match_score > exact_result.match_score {
            fuzzy_result
        } else {
            exact_result
        }
    }

    /// Copies amounts, currencies, timestamps, and the ledger event type
    /// into the result's metadata so the journal row is self-describing.
    /// Amounts become strings to keep their precision on the wire.
    fn enrich(
        mut result: MatchResult,
        external: &ExternalTxn,
        ledger_txns: &[LedgerTxn],
    ) -> MatchResult {
        let metadata = &mut result.metadata;
        metadata.insert(
            "external_amount".to_string(),
            Value::String(external.amount.to_string()),
        );
        metadata.insert(
            "external_currency".to_string(),
            Value::String(external.currency.clone()),
        );
        metadata.insert(
            "currency".to_string(),
            Value::String(external.currency.clone()),
        );
        metadata.insert(
            "external_timestamp".to_string(),
            Value::String(external.timestamp.to_rfc3339()),
        );
        metadata.insert(
            "external_description".to_string(),
            external
                .description
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null),
        );

        if let Some(matched_id) = result.ledger_txn_id {
            if let Some(ledger) = ledger_txns.iter().find(|txn| txn.id == matched_id) {
                metadata.insert(
                    "ledger_amount".to_string(),
                    Value::String(ledger.amount.to_string()),
                );
                metadata.insert(
                    "ledger_currency".to_string(),
                    Value::String(ledger.currency.clone()),
                );
                metadata.insert(
                    "ledger_timestamp".to_string(),
                    Value::String(ledger.timestamp.to_rfc3339()),
                );
                metadata.insert(
                    "ledger_event_type".to_string(),
                    Value::String(ledger.event_type.as_str().to_string()),
                );
            }
        }

        result
    }
}

/// Sum of `|amount_diff|` over a result set, the same aggregate the
/// journal's summary computes server-side.
pub fn absolute_variance(results: &[MatchResult]) -> rust_decimal::Decimal {
    results.iter().map(|r| r.amount_diff.abs()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventType;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use serde_json::Map;

    fn engine_parts() -> (ExactMatcher, FuzzyMatcher) {
        let settings = ReconSettings::default();
        (ExactMatcher::new(&settings), FuzzyMatcher::new(&settings))
    }

    fn external(id: &str, amount: Decimal, currency: &str) -> ExternalTxn {
        ExternalTxn {
            txn_id: id.to_string(),
            amount,
            currency: currency.to_string(),
            timestamp: Utc.with_ymd_and_hms(2025, 7, 13, 10, 0, 0).unwrap(),
            description: None,
            metadata: Map::new(),
        }
    }

    fn ledger(amount: Decimal, currency: &str, offset_secs: i64) -> LedgerTxn {
        LedgerTxn {
            id: Uuid::new_v4(),
            transaction_id: Uuid::new_v4(),
            amount,
            currency: currency.to_string(),
            timestamp: Utc.with_ymd_and_hms(2025, 7, 13, 10, 0, 0).unwrap()
                + Duration::seconds(offset_secs),
            event_type: EventType::Credit,
            source_account_id: None,
            destination_account_id: Some(Uuid::new_v4()),
            metadata: Map::new(),
        }
    }

    // The cascade itself is pure, so it is testable without a pool by
    // reproducing its selection rule over the two matchers.
    fn cascade(external: &ExternalTxn, candidates: &[LedgerTxn]) -> MatchResult {
        let (exact, fuzzy) = engine_parts();
        let exact_result = exact.match_one(external, candidates);
        if exact_result.matched {
            return exact_result;
        }
        let fuzzy_result = fuzzy.match_one(external, candidates);
        if fuzzy_result.match_score > exact_result.match_score {
            fuzzy_result
        } else {
            exact_result
        }
    }

    #[test]
    fn exact_match_short_circuits_fuzzy() {
        let candidates = vec![ledger(dec!(100.00), "USD", 30)];
        let result = cascade(&external("EXT-1", dec!(100.00), "USD"), &candidates);
        assert!(result.matched);
        assert_eq!(result.match_score, 1.0);
        assert_eq!(
            result.metadata.get("match_criteria").and_then(Value::as_str),
            Some("ExactMatcher")
        );
    }

    #[test]
    fn fuzzy_wins_when_exact_fails_and_scores_higher() {
        // Slightly different amount: no exact match, but fuzzy clears 0.8.
        let candidates = vec![ledger(dec!(100.001), "USD", 0)];
        let result = cascade(&external("EXT-1", dec!(100.00), "USD"), &candidates);
        assert!(result.matched);
        assert_eq!(
            result.metadata.get("match_criteria").and_then(Value::as_str),
            Some("FuzzyMatcher")
        );
    }

    #[test]
    fn exact_result_kept_when_fuzzy_no_better() {
        // Ambiguous exact candidates, and both are far enough in time that
        // fuzzy also fails; the tie at score 0 keeps the exact reason.
        let candidates = vec![
            ledger(dec!(100.00), "EUR", 0),
        ];
        let result = cascade(&external("EXT-1", dec!(100.00), "USD"), &candidates);
        assert!(!result.matched);
        assert_eq!(
            result.mismatch_reason.as_deref(),
            Some("No exact match found")
        );
    }

    #[test]
    fn enrichment_stringifies_amounts_and_names_event_type() {
        let candidates = vec![ledger(dec!(100.00), "USD", 0)];
        let ext = external("EXT-1", dec!(100.00), "USD");
        let result = cascade(&ext, &candidates);
        let enriched = ReconEngine::enrich(result, &ext, &candidates);

        let meta = &enriched.metadata;
        assert_eq!(
            meta.get("external_amount").and_then(Value::as_str),
            Some("100.00")
        );
        assert_eq!(
            meta.get("ledger_amount").and_then(Value::as_str),
            Some("100.00")
        );
        assert_eq!(meta.get("currency").and_then(Value::as_str), Some("USD"));
        assert_eq!(
            meta.get("ledger_event_type").and_then(Value::as_str),
            Some("CREDIT")
        );
    }

    #[test]
    fn enrichment_without_candidate_skips_ledger_fields() {
        let ext = external("EXT-9", dec!(55.00), "USD");
        let result = build_result(&ext, None, false, 0.0, Some("No exact match found".into()), "ExactMatcher");
        let enriched = ReconEngine::enrich(result, &ext, &[]);
        assert!(enriched.metadata.get("ledger_amount").is_none());
        assert_eq!(
            enriched.metadata.get("external_amount").and_then(Value::as_str),
            Some("55.00")
        );
    }

    #[test]
    fn absolute_variance_sums_magnitudes() {
        let ext = external("EXT-1", dec!(10.00), "USD");
        let mut a = build_result(&ext, None, false, 0.0, None, "ExactMatcher");
        a.amount_diff = dec!(-2.50);
        let mut b = build_result(&ext, None, false, 0.0, None, "ExactMatcher");
        b.amount_diff = dec!(1.25);
        assert_eq!(absolute_variance(&[a, b]), dec!(3.75));
    }
}
