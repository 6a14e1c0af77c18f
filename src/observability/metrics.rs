use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Installs the Prometheus recorder and describes the counters the two
/// cores emit. The handle renders the scrape body for `/metrics`.
pub fn init_metrics() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    describe_counter!(
        "ledger_transfers_total",
        "Transfer attempts by outcome (settled, rejected, insufficient_funds)"
    );
    describe_counter!(
        "recon_rows_total",
        "Reconciliation log rows written, by outcome (matched, unmatched)"
    );
    describe_counter!(
        "recon_jobs_total",
        "Reconciliation jobs by terminal status (completed, failed, cancelled)"
    );

    handle
}
