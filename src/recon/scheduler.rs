use chrono::{Local, NaiveDate, Timelike};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use super::{ReconEngine, SourceKind, SourceParams};

const TICK: Duration = Duration::from_secs(60);

/// Daily in-process scheduler. Once the local clock reaches the configured
/// hour it runs every configured source, at most once per (source, day);
/// the dedup set resets when the date rolls over. Failures are logged and
/// the loop keeps running.
pub struct ReconScheduler {
    engine: Arc<ReconEngine>,
    completed: HashSet<String>,
    last_date: Option<NaiveDate>,
}

impl ReconScheduler {
    pub fn new(engine: Arc<ReconEngine>) -> Self {
        Self {
            engine,
            completed: HashSet::new(),
            last_date: None,
        }
    }

    pub async fn run(mut self) {
        let hour = self.engine.settings().scheduler_hour;
        tracing::info!(hour, "reconciliation scheduler started");

        loop {
            self.reset_daily_tracking();

            if Local::now().hour() == hour {
                self.run_due_sources().await;
            }

            tokio::time::sleep(TICK).await;
        }
    }

    fn reset_daily_tracking(&mut self) {
        let today = Local::now().date_naive();
        if self.last_date != Some(today) {
            self.completed.clear();
            self.last_date = Some(today);
            tracing::info!(%today, "reset daily scheduler tracking");
        }
    }

    async fn run_due_sources(&mut self) {
        let sources = self.engine.settings().sources.clone();
        if sources.is_empty() {
            tracing::warn!("no sources configured for scheduled reconciliation");
            return;
        }

        let today = Local::now().date_naive();
        for source in sources {
            let key = format!("{}_{}", source, today);
            if self.completed.contains(&key) {
                continue;
            }

            let kind: SourceKind = match source.parse() {
                Ok(kind) => kind,
                Err(err) => {
                    tracing::error!(source = %source, error = %err, "skipping unknown source");
                    self.completed.insert(key);
                    continue;
                }
            };

            tracing::info!(source = %source, "starting scheduled reconciliation");
            match self.engine.run(today, kind, &SourceParams::default()).await {
                Ok(job_id) => {
                    tracing::info!(source = %source, %job_id, "scheduled reconciliation finished");
                    self.completed.insert(key);
                }
                Err(err) => {
                    tracing::error!(source = %source, error = %err, "scheduled reconciliation failed");
                }
            }
        }
    }
}
