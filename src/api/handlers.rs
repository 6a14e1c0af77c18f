use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use uuid::Uuid;

use crate::api::requests::{
    CreateAccountRequest, EventsQuery, LogsQuery, RunReconRequest, StatusQuery,
};
use crate::api::responses::{
    ReconSummaryResponse, RunReconResponse, TransferAccepted, TransferRejected,
    ValidateSourceResponse,
};
use crate::error::{AppError, Result};
use crate::models::{
    Account, Balance, LedgerEvent, ReconJob, ReconLogEntry, ReconStatus, TransferRequest,
};
use crate::recon::{ReconEngine, ReconJournal, SourceKind};
use crate::services::{AccountService, LedgerService};

use super::routes::AppState;

const DEFAULT_EVENT_LIMIT: i64 = 100;
const DEFAULT_LOG_LIMIT: i64 = 100;

pub async fn health_check(State(state): State<AppState>) -> Response {
    let db_healthy = sqlx::query("SELECT 1").fetch_one(&state.pool).await.is_ok();
    let body = serde_json::json!({
        "status": if db_healthy { "healthy" } else { "degraded" },
        "version": env!("CARGO_PKG_VERSION"),
        "database": db_healthy,
    });
    Json(body).into_response()
}

pub async fn readiness_check(State(state): State<AppState>) -> StatusCode {
    if sqlx::query("SELECT 1").fetch_one(&state.pool).await.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

pub async fn liveness_check() -> StatusCode {
    StatusCode::OK
}

pub async fn metrics_endpoint(State(state): State<AppState>) -> Response {
    match &state.metrics_handle {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

// ---------------------------------------------------------------------------
// Ledger handlers
// ---------------------------------------------------------------------------

pub async fn create_account(
    State(state): State<AppState>,
    Json(request): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<Account>)> {
    let service = AccountService::new(state.pool.clone());
    let account = service
        .create(&request.currency, request.account_type, request.metadata)
        .await?;
    Ok((StatusCode::CREATED, Json(account)))
}

pub async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Account>> {
    let service = AccountService::new(state.pool.clone());
    Ok(Json(service.get(id).await?))
}

pub async fn get_account_balance(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Balance>> {
    let service = LedgerService::new(state.pool.clone(), state.ledger_config.clone());
    service
        .account_balance(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("Balance for account '{}' not found", id)))
}

pub async fn transfer(
    State(state): State<AppState>,
    Json(request): Json<TransferRequest>,
) -> Result<Response> {
    let service = LedgerService::new(state.pool.clone(), state.ledger_config.clone());
    let outcome = service.transfer(request).await?;

    if outcome.success {
        let transaction_id = outcome
            .transaction_id
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("settled transfer missing id")))?;
        let body = TransferAccepted {
            message: "Transfer completed successfully".to_string(),
            transaction_id,
            events_created: outcome.events.len(),
        };
        Ok(Json(body).into_response())
    } else {
        let body = TransferRejected {
            message: "Transfer failed".to_string(),
            errors: outcome.errors,
        };
        Ok((StatusCode::BAD_REQUEST, Json(body)).into_response())
    }
}

pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<LedgerEvent>>> {
    let service = LedgerService::new(state.pool.clone(), state.ledger_config.clone());
    let limit = query.limit.unwrap_or(DEFAULT_EVENT_LIMIT);
    Ok(Json(service.account_events(query.account_id, limit).await?))
}

// ---------------------------------------------------------------------------
// Reconciliation handlers
// ---------------------------------------------------------------------------

pub async fn run_recon(
    State(state): State<AppState>,
    Json(request): Json<RunReconRequest>,
) -> Result<Json<RunReconResponse>> {
    let kind: SourceKind = request.source.parse()?;
    let params = request.source_params();
    params.validate_for(kind)?;

    let engine = ReconEngine::new(state.pool.clone(), state.recon_settings.clone());
    // Synchronous by design: the caller blocks until the job terminates.
    let job_id = engine.run(request.date, kind, &params).await?;

    let status = engine
        .journal()
        .job_by_id(job_id)
        .await?
        .map(|job| job.status)
        .unwrap_or(ReconStatus::Completed);

    Ok(Json(RunReconResponse {
        job_id,
        status: status.as_str().to_string(),
        message: "Reconciliation job completed".to_string(),
    }))
}

pub async fn validate_source(
    State(_state): State<AppState>,
    Json(request): Json<RunReconRequest>,
) -> Json<ValidateSourceResponse> {
    let valid = request
        .source
        .parse::<SourceKind>()
        .and_then(|kind| request.source_params().validate_for(kind))
        .is_ok();

    Json(ValidateSourceResponse {
        valid,
        source: request.source,
        message: if valid {
            "Configuration is valid".to_string()
        } else {
            "Configuration is invalid".to_string()
        },
    })
}

pub async fn job_status(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Vec<ReconJob>>> {
    let journal = ReconJournal::new(state.pool.clone());
    Ok(Json(journal.job_status(date, query.source.as_deref()).await?))
}

pub async fn recon_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Vec<ReconLogEntry>>> {
    let journal = ReconJournal::new(state.pool.clone());
    let rows = journal
        .logs(
            query.date,
            query.source.as_deref(),
            query.matched,
            query.limit.unwrap_or(DEFAULT_LOG_LIMIT),
            query.offset.unwrap_or(0),
        )
        .await?;
    Ok(Json(rows))
}

pub async fn recon_summary(
    State(state): State<AppState>,
    Path((date, source)): Path<(NaiveDate, String)>,
) -> Result<Json<ReconSummaryResponse>> {
    let journal = ReconJournal::new(state.pool.clone());
    journal
        .summary(date, &source)
        .await?
        .map(|summary| Json(ReconSummaryResponse::from(summary)))
        .ok_or_else(|| {
            AppError::not_found(format!(
                "No reconciliation data found for {} and source {}",
                date, source
            ))
        })
}

pub async fn list_sources() -> Json<Vec<&'static str>> {
    Json(ReconEngine::available_sources())
}

/// Marks a job FAILED; an in-flight orchestrator notices between rows.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    let journal = ReconJournal::new(state.pool.clone());
    if journal.job_by_id(job_id).await?.is_none() {
        return Err(AppError::not_found(format!("Job '{}' not found", job_id)));
    }

    journal
        .update_job_status(job_id, ReconStatus::Failed, Some("Job cancelled by user"))
        .await?;

    Ok(Json(serde_json::json!({
        "message": format!("Job {} cancelled successfully", job_id)
    })))
}
