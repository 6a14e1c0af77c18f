use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::ReconSummary;

/// Error body shared by every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_)
            | AppError::SourceIo(_)
            | AppError::Database(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }

        let body = ErrorBody {
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Success body of `POST /ledger/transfer/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferAccepted {
    pub message: String,
    pub transaction_id: Uuid,
    pub events_created: usize,
}

/// 400 body of `POST /ledger/transfer/` on rule failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRejected {
    pub message: String,
    pub errors: Vec<String>,
}

/// Body of `POST /recon/run`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReconResponse {
    pub job_id: Uuid,
    pub status: String,
    pub message: String,
}

/// Body of `POST /recon/validate-source`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateSourceResponse {
    pub valid: bool,
    pub source: String,
    pub message: String,
}

/// Body of `GET /recon/summary/{date}/{source}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconSummaryResponse {
    pub total_logs: i64,
    pub matched_count: i64,
    pub unmatched_count: i64,
    pub match_rate: f64,
    pub avg_match_score: f64,
    pub total_amount_variance: String,
    pub unique_external_txns: i64,
    pub unique_ledger_txns: i64,
}

impl From<ReconSummary> for ReconSummaryResponse {
    fn from(summary: ReconSummary) -> Self {
        let match_rate = if summary.total_logs > 0 {
            summary.matched_count as f64 / summary.total_logs as f64
        } else {
            0.0
        };
        Self {
            total_logs: summary.total_logs,
            matched_count: summary.matched_count,
            unmatched_count: summary.unmatched_count,
            match_rate,
            avg_match_score: summary.avg_match_score.unwrap_or(0.0),
            total_amount_variance: summary
                .total_amount_variance
                .unwrap_or_default()
                .to_string(),
            unique_external_txns: summary.unique_external_txns,
            unique_ledger_txns: summary.unique_ledger_txns,
        }
    }
}
