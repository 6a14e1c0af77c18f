use crate::config::{FuzzyWeights, ReconSettings};
use crate::models::{ExternalTxn, LedgerTxn, MatchResult};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use super::{build_result, value_as_string};

const CRITERIA: &str = "FuzzyMatcher";

/// Weighted-score matching over amount, timestamp, and metadata, gated on
/// currency equality. The best-scoring candidate wins when it clears
/// `min_match_score`.
pub struct FuzzyMatcher {
    weights: FuzzyWeights,
    amount_tolerance_percent: f64,
    timestamp_tolerance_seconds: i64,
    min_match_score: f64,
}

impl FuzzyMatcher {
    pub fn new(settings: &ReconSettings) -> Self {
        Self {
            weights: settings.fuzzy_weights,
            amount_tolerance_percent: settings.amount_tolerance_percent,
            timestamp_tolerance_seconds: settings.timestamp_tolerance_seconds,
            min_match_score: settings.min_match_score,
        }
    }

    pub fn match_one(&self, external: &ExternalTxn, candidates: &[LedgerTxn]) -> MatchResult {
        let mut best_match: Option<&LedgerTxn> = None;
        let mut best_score = 0.0_f64;

        for ledger in candidates {
            let score = self.score(external, ledger);
            if score > best_score {
                best_score = score;
                best_match = Some(ledger);
            }
        }

        if best_score >= self.min_match_score {
            build_result(external, best_match, true, best_score, None, CRITERIA)
        } else {
            let reason = format!(
                "Best match score {:.3} below threshold {}",
                best_score, self.min_match_score
            );
            build_result(
                external,
                best_match,
                false,
                best_score,
                Some(reason),
                CRITERIA,
            )
        }
    }

    /// Weighted combination; a currency mismatch zeroes the whole score.
    fn score(&self, external: &ExternalTxn, ledger: &LedgerTxn) -> f64 {
        let currency_gate = if external.currency == ledger.currency {
            1.0
        } else {
            0.0
        };

        let amount = self.amount_similarity(external.amount, ledger.amount);
        let timestamp = self
            .timestamp_similarity((external.timestamp - ledger.timestamp).num_seconds().abs());
        let metadata = self.metadata_similarity(external, ledger);

        (amount * self.weights.amount
            + timestamp * self.weights.timestamp
            + metadata * self.weights.metadata)
            * currency_gate
    }

    /// 1.0 on equality; linear decay to 0.5 across the tolerance band,
    /// then linear toward zero at a 100% relative difference.
    fn amount_similarity(&self, a: Decimal, b: Decimal) -> f64 {
        if a == b {
            return 1.0;
        }

        let avg = (a + b) / Decimal::TWO;
        if avg.is_zero() {
            return 0.0;
        }

        let diff_ratio = ((a - b).abs() / avg.abs()).to_f64().unwrap_or(f64::MAX);
        let tolerance = self.amount_tolerance_percent / 100.0;

        if diff_ratio <= tolerance {
            1.0 - (diff_ratio / tolerance) * 0.5
        } else {
            (0.5 * (1.0 - diff_ratio)).max(0.0)
        }
    }

    /// Same decay shape over time: 1.0 → 0.5 across the tolerance, then
    /// down to zero at ten times the tolerance.
    fn timestamp_similarity(&self, diff_seconds: i64) -> f64 {
        let diff = diff_seconds as f64;
        let tolerance = self.timestamp_tolerance_seconds as f64;

        if diff <= tolerance {
            1.0 - (diff / tolerance) * 0.5
        } else {
            let max_diff = tolerance * 10.0;
            if diff > max_diff {
                0.0
            } else {
                0.5 * (1.0 - (diff - tolerance) / (max_diff - tolerance))
            }
        }
    }

    /// Gathers every comparable signal into a `[0,1]` similarity and
    /// aggregates with `sum(s_i^2) / sum(s_i)`, which biases toward the
    /// strongest signals. No signals at all means a neutral 0.5.
    fn metadata_similarity(&self, external: &ExternalTxn, ledger: &LedgerTxn) -> f64 {
        let mut scores: Vec<f64> = Vec::new();

        if let Some(ext_desc) = external.description.as_deref() {
            if let Some(ledger_desc) = ledger
                .metadata
                .get("description")
                .map(value_as_string)
                .filter(|s| !s.trim().is_empty())
            {
                if !ext_desc.trim().is_empty() {
                    scores.push(fuzzy_ratio(ext_desc, &ledger_desc));
                }
            }
        }

        for (key, ext_value) in &external.metadata {
            let Some(ledger_value) = ledger.metadata.get(key) else {
                continue;
            };
            let ext_str = value_as_string(ext_value).to_lowercase().trim().to_string();
            let ledger_str = value_as_string(ledger_value)
                .to_lowercase()
                .trim()
                .to_string();
            if ext_str.is_empty() || ledger_str.is_empty() {
                continue;
            }
            if ext_str == ledger_str {
                scores.push(1.0);
            } else {
                scores.push(strsim::normalized_levenshtein(&ext_str, &ledger_str));
            }
        }

        let ref_score = Self::reference_similarity(external, ledger);
        if ref_score > 0.0 {
            scores.push(ref_score);
        }

        if scores.is_empty() {
            return 0.5;
        }

        let weight_sum: f64 = scores.iter().sum();
        if weight_sum <= 0.0 {
            return 0.0;
        }
        let weighted_sum: f64 = scores.iter().map(|s| s * s).sum();
        weighted_sum / weight_sum
    }

    /// Cross-links ids buried in metadata or free text: a "ref"/"id" key on
    /// either side naming the other transaction scores 1.0; the ledger id
    /// merely appearing in the external description scores 0.8.
    fn reference_similarity(external: &ExternalTxn, ledger: &LedgerTxn) -> f64 {
        let external_id = external.txn_id.to_lowercase();
        for (key, value) in &ledger.metadata {
            let key = key.to_lowercase();
            if (key.contains("ref") || key.contains("id"))
                && value_as_string(value).to_lowercase() == external_id
            {
                return 1.0;
            }
        }

        let ledger_id = ledger.id.to_string().to_lowercase();
        for (key, value) in &external.metadata {
            let key = key.to_lowercase();
            if (key.contains("ref") || key.contains("id"))
                && value_as_string(value).to_lowercase() == ledger_id
            {
                return 1.0;
            }
        }

        if let Some(description) = external.description.as_deref() {
            let description = description.to_lowercase();
            if description.contains(&ledger_id)
                || description.contains(&ledger.transaction_id.to_string().to_lowercase())
            {
                return 0.8;
            }
        }

        0.0
    }
}

/// Normalised string similarity for descriptions and metadata values,
/// case-folded and trimmed.
fn fuzzy_ratio(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(
        a.to_lowercase().trim(),
        b.to_lowercase().trim(),
    )
}
