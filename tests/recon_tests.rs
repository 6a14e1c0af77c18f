mod common;

use chrono::Utc;
use ledger_recon::config::ReconSettings;
use ledger_recon::models::{AccountType, ReconStatus, TransferRequest};
use ledger_recon::recon::{LedgerReader, ReconEngine, ReconJournal, SourceKind, SourceParams};
use ledger_recon::services::{AccountService, LedgerConfig, LedgerService};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

fn overdraft_config() -> LedgerConfig {
    LedgerConfig {
        allow_overdraft: true,
        ..LedgerConfig::default()
    }
}

async fn seed_transfer(
    pool: &sqlx::PgPool,
    amount: Decimal,
    metadata: serde_json::Value,
) -> Uuid {
    let accounts = AccountService::new(pool.clone());
    let ledger = LedgerService::new(pool.clone(), overdraft_config());

    let source = accounts.create("USD", AccountType::Liability, None).await.unwrap();
    let dest = accounts.create("USD", AccountType::Asset, None).await.unwrap();

    let outcome = ledger
        .transfer(TransferRequest {
            source_account_id: source.id,
            destination_account_id: dest.id,
            amount,
            currency: "USD".to_string(),
            metadata,
        })
        .await
        .unwrap();
    assert!(outcome.success);
    outcome.transaction_id.unwrap()
}

fn write_temp_csv(name: &str, content: &str) -> String {
    let path = std::env::temp_dir().join(format!("{}-{}.csv", name, Uuid::new_v4()));
    std::fs::write(&path, content).expect("Failed to write CSV fixture");
    path.to_string_lossy().into_owned()
}

#[tokio::test]
async fn csv_job_matches_one_of_two_externals() {
    let pool = common::setup_test_db().await;

    let today = Utc::now().date_naive();
    common::cleanup_recon_data(&pool, today, "csv").await;

    // One ledger transfer whose events cross-reference the external id.
    seed_transfer(
        &pool,
        dec!(123.45),
        serde_json::json!({"external_txn_id": "TXN-A"}),
    )
    .await;

    let now = Utc::now().to_rfc3339();
    let csv = format!(
        "txn_id,amount,currency,timestamp,description\n\
         TXN-A,123.45,USD,{now},Funding wire\n\
         TXN-B,999.99,USD,{now},Unknown payout\n"
    );
    let file_path = write_temp_csv("recon-s6", &csv);

    let engine = ReconEngine::new(pool.clone(), ReconSettings::default());
    let params = SourceParams {
        file_path: Some(file_path),
        ..Default::default()
    };
    let job_id = engine.run(today, SourceKind::Csv, &params).await.unwrap();

    let journal = ReconJournal::new(pool.clone());
    let job = journal.job_by_id(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, ReconStatus::Completed);
    assert_eq!(job.total_external_txns, 2);
    assert_eq!(job.matched_count, 1);
    assert_eq!(job.unmatched_count, 1);
    assert!(job.completed_at.is_some());

    let logs = journal.logs(today, Some("csv"), None, 100, 0).await.unwrap();
    assert_eq!(logs.len(), 2);

    let matched_log = logs.iter().find(|l| l.matched).unwrap();
    assert_eq!(matched_log.external_txn_id.as_deref(), Some("TXN-A"));
    assert_eq!(matched_log.match_score, 1.0);
    assert!(matched_log.ledger_txn_id.is_some());
    assert_eq!(matched_log.external_amount, Some(dec!(123.45)));
    assert_eq!(matched_log.currency.as_deref(), Some("USD"));

    let unmatched_log = logs.iter().find(|l| !l.matched).unwrap();
    assert_eq!(unmatched_log.external_txn_id.as_deref(), Some("TXN-B"));
    assert!(unmatched_log.mismatch_reason.is_some());

    // Filtering by match flag narrows the rows.
    let only_matched = journal.logs(today, Some("csv"), Some(true), 100, 0).await.unwrap();
    assert_eq!(only_matched.len(), 1);

    let summary = journal.summary(today, "csv").await.unwrap().unwrap();
    assert_eq!(summary.total_logs, 2);
    assert_eq!(summary.matched_count, 1);
    assert_eq!(summary.unmatched_count, 1);
    assert!(summary.avg_match_score.unwrap() > 0.0);
}

#[tokio::test]
async fn rerunning_a_job_reuses_the_row() {
    let pool = common::setup_test_db().await;

    let today = Utc::now().date_naive();
    let csv = format!(
        "transaction_id,amount,currency,date,description\n\
         BNK-1,-55.00,USD,{today},ACH WITHDRAWAL\n"
    );
    let file_path = write_temp_csv("recon-rerun", &csv);
    let params = SourceParams {
        file_path: Some(file_path),
        ..Default::default()
    };

    let engine = ReconEngine::new(pool.clone(), ReconSettings::default());
    let first = engine.run(today, SourceKind::BankCsv, &params).await.unwrap();
    let second = engine.run(today, SourceKind::BankCsv, &params).await.unwrap();
    assert_eq!(first, second);

    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM recon_jobs WHERE job_date = $1 AND source_name = 'bank_csv'",
    )
    .bind(today)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn missing_file_fails_the_job_with_error_message() {
    let pool = common::setup_test_db().await;

    // A past date keeps this run clear of the same-day csv test.
    let date = Utc::now().date_naive() - chrono::Duration::days(1);
    let engine = ReconEngine::new(pool.clone(), ReconSettings::default());
    let params = SourceParams {
        file_path: Some("/nonexistent/statement.csv".to_string()),
        ..Default::default()
    };

    let result = engine.run(date, SourceKind::PaymentProcessor, &params).await;
    // payment_processor needs base_url, not file_path: rejected before a job exists.
    assert!(result.is_err());

    let result = engine.run(date, SourceKind::Csv, &params).await;
    assert!(result.is_err());

    let journal = ReconJournal::new(pool.clone());
    let jobs = journal.job_status(date, Some("csv")).await.unwrap();
    let job = jobs.first().expect("job row should exist");
    assert_eq!(job.status, ReconStatus::Failed);
    assert!(job.error_message.is_some());
}

#[tokio::test]
async fn ledger_reader_exposes_day_and_range_views() {
    let pool = common::setup_test_db().await;

    let today = Utc::now().date_naive();
    let transaction_id = seed_transfer(&pool, dec!(640.25), serde_json::json!({})).await;

    let reader = LedgerReader::new(pool.clone());
    let day_txns = reader.transactions_for_date(today).await.unwrap();
    let pair: Vec<_> = day_txns
        .iter()
        .filter(|t| t.transaction_id == transaction_id)
        .collect();
    assert_eq!(pair.len(), 2);

    let by_id = reader.transaction_by_id(pair[0].id).await.unwrap();
    assert_eq!(by_id.amount, dec!(640.25));
    assert!(reader.transaction_by_id(Uuid::new_v4()).await.is_err());

    let in_range = reader
        .transactions_by_amount_range(today, "USD", dec!(640), dec!(641))
        .await
        .unwrap();
    assert!(in_range.iter().any(|t| t.transaction_id == transaction_id));
    let out_of_range = reader
        .transactions_by_amount_range(today, "USD", dec!(10000), dec!(10001))
        .await
        .unwrap();
    assert!(!out_of_range.iter().any(|t| t.transaction_id == transaction_id));
}

#[tokio::test]
async fn foreign_currency_without_candidates_short_circuits() {
    let pool = common::setup_test_db().await;

    // Two days back: no ledger events exist for that date.
    let date = Utc::now().date_naive() - chrono::Duration::days(2);
    common::cleanup_recon_data(&pool, date, "csv").await;

    let csv = format!(
        "txn_id,amount,currency,timestamp\n\
         TXN-EUR,77.00,EUR,{date}T09:00:00Z\n"
    );
    let file_path = write_temp_csv("recon-eur", &csv);

    let engine = ReconEngine::new(pool.clone(), ReconSettings::default());
    let params = SourceParams {
        file_path: Some(file_path),
        ..Default::default()
    };
    engine.run(date, SourceKind::Csv, &params).await.unwrap();

    let journal = ReconJournal::new(pool.clone());
    let logs = journal.logs(date, Some("csv"), None, 100, 0).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert!(!logs[0].matched);
    assert_eq!(
        logs[0].mismatch_reason.as_deref(),
        Some("No ledger transactions found for currency EUR")
    );
}

#[tokio::test]
async fn cancelling_a_job_marks_it_failed() {
    let pool = common::setup_test_db().await;

    let date = Utc::now().date_naive() + chrono::Duration::days(1);
    let journal = ReconJournal::new(pool.clone());
    let job_id = journal.create_job(date, "api").await.unwrap();

    journal
        .update_job_status(job_id, ReconStatus::Failed, Some("Job cancelled by user"))
        .await
        .unwrap();

    let job = journal.job_by_id(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, ReconStatus::Failed);
    assert_eq!(job.error_message.as_deref(), Some("Job cancelled by user"));
}
