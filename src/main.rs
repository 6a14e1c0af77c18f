use ledger_recon::api::{create_router, AppState};
use ledger_recon::config::{ReconSettings, Settings};
use ledger_recon::observability::{init_logging, init_metrics, LogConfig, LogFormat};
use ledger_recon::recon::{ReconEngine, ReconScheduler};
use ledger_recon::services::LedgerConfig;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let settings = Settings::new()?;
    let recon_settings = ReconSettings::new()?;

    let log_config = LogConfig {
        level: settings.log_level.clone(),
        format: LogFormat::from(
            std::env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .as_str(),
        ),
        include_target: true,
    };
    init_logging(&log_config);

    let metrics_handle = init_metrics();
    info!("Configuration loaded, metrics initialized");

    info!("Connecting to database...");
    let connect_options = PgConnectOptions::from_str(&settings.database_url)?
        .options([("statement_timeout", "60000")]);
    let pool = PgPoolOptions::new()
        .max_connections(settings.pool_size)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(connect_options)
        .await?;

    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations applied");

    let ledger_config = LedgerConfig {
        allow_overdraft: settings.allow_overdraft,
        max_transaction_amount: settings.max_transaction_amount,
    };

    if recon_settings.scheduler_enabled {
        let engine = Arc::new(ReconEngine::new(pool.clone(), recon_settings.clone()));
        tokio::spawn(ReconScheduler::new(engine).run());
    }

    let state = AppState::new(pool, ledger_config, recon_settings).with_metrics(metrics_handle);
    let app = create_router(state);

    let addr = format!("{}:{}", settings.api_host, settings.api_port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
