use axum::{
    routing::{delete, get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::config::ReconSettings;
use crate::services::LedgerConfig;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub ledger_config: LedgerConfig,
    pub recon_settings: ReconSettings,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(pool: PgPool, ledger_config: LedgerConfig, recon_settings: ReconSettings) -> Self {
        Self {
            pool,
            ledger_config,
            recon_settings,
            metrics_handle: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }
}

/// Builds the main router with the ledger and reconciliation surfaces.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health and observability
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/live", get(handlers::liveness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        // Ledger
        .route("/ledger/account/", post(handlers::create_account))
        .route("/ledger/account/:id", get(handlers::get_account))
        .route("/ledger/account/:id/balance", get(handlers::get_account_balance))
        .route("/ledger/transfer/", post(handlers::transfer))
        .route("/ledger/events/", get(handlers::list_events))
        // Reconciliation
        .route("/recon/run", post(handlers::run_recon))
        .route("/recon/validate-source", post(handlers::validate_source))
        .route("/recon/status/:date", get(handlers::job_status))
        .route("/recon/logs", get(handlers::recon_logs))
        .route("/recon/summary/:date/:source", get(handlers::recon_summary))
        .route("/recon/sources", get(handlers::list_sources))
        .route("/recon/jobs/:id", delete(handlers::cancel_job))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
