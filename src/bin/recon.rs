use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use ledger_recon::config::{ReconSettings, Settings};
use ledger_recon::observability::{init_logging, LogConfig, LogFormat};
use ledger_recon::recon::{ReconEngine, SourceKind, SourceParams};
use sqlx::postgres::PgPoolOptions;
use std::process::ExitCode;
use std::time::Duration;

/// Reconciliation engine CLI.
#[derive(Parser)]
#[command(name = "recon", about = "Run ledger reconciliation against external sources")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run reconciliation for one source and date.
    RunRecon {
        /// Source type: bank_csv, csv, api, or payment_processor.
        #[arg(long)]
        source: String,

        /// Date to reconcile (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Path to the CSV file (csv and bank_csv sources).
        #[arg(long)]
        file_path: Option<String>,

        /// Base URL (api and payment_processor sources).
        #[arg(long)]
        base_url: Option<String>,

        /// Bearer token for authenticated sources.
        #[arg(long)]
        auth_token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    match cli.command {
        Command::RunRecon {
            source,
            date,
            file_path,
            base_url,
            auth_token,
        } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let params = SourceParams {
                file_path,
                base_url,
                auth_token,
            };
            match run_recon(&source, date, params).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(err) => {
                    eprintln!("Error running reconciliation: {}", err);
                    ExitCode::FAILURE
                }
            }
        }
    }
}

async fn run_recon(
    source: &str,
    date: NaiveDate,
    params: SourceParams,
) -> Result<(), Box<dyn std::error::Error>> {
    let kind: SourceKind = source.parse()?;
    params.validate_for(kind)?;

    let settings = Settings::new()?;
    let recon_settings = ReconSettings::new()?;

    init_logging(&LogConfig {
        level: settings.log_level.clone(),
        format: LogFormat::Compact,
        include_target: false,
    });

    println!("Starting reconciliation for source: {}", source);
    println!("Date: {}", date);
    if let Some(path) = &params.file_path {
        println!("File: {}", path);
    }
    if let Some(url) = &params.base_url {
        println!("Base URL: {}", url);
    }

    let pool = PgPoolOptions::new()
        .max_connections(settings.pool_size)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&settings.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let engine = ReconEngine::new(pool, recon_settings);
    let job_id = engine.run(date, kind, &params).await?;

    if let Some(job) = engine.journal().job_by_id(job_id).await? {
        println!();
        println!("Reconciliation job finished");
        println!("Job ID: {}", job.id);
        println!("Status: {}", job.status.as_str());
        println!("External transactions: {}", job.total_external_txns);
        println!("Ledger transactions: {}", job.total_ledger_txns);
        println!("Matched: {}", job.matched_count);
        println!("Unmatched: {}", job.unmatched_count);
        if let Some(error) = job.error_message {
            println!("Errors: {}", error);
        }
    } else {
        println!("Job {} finished", job_id);
    }

    Ok(())
}
