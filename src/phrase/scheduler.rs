//! Periodic runner for the generation job

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::phrase::job::GenerationJob;

/// Runs a `GenerationJob` on a fixed interval until shut down.
pub struct Scheduler {
    job: Arc<GenerationJob>,
    interval: Duration,
    shutdown: Arc<Notify>,
}

impl Scheduler {
    pub fn new(job: Arc<GenerationJob>, interval: Duration) -> Self {
        Self {
            job,
            interval,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Handle that stops `run` when notified.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    /// Request graceful shutdown. Takes effect after the current run.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Run until shutdown and return how many job runs happened.
    ///
    /// With `run_immediately` the first run starts right away, otherwise
    /// after one full interval.
    pub async fn run(&self, run_immediately: bool) -> usize {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        if !run_immediately {
            // the first tick of an interval completes at once
            ticker.tick().await;
        }

        info!(interval_secs = self.interval.as_secs(), "Phrase scheduler started");

        let mut runs = 0;
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.notified() => {
                    info!(runs, "Phrase scheduler received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    let report = self.job.run().await;
                    runs += 1;
                    if !report.success {
                        warn!(attempts = report.attempts, message = %report.message, "Scheduled generation failed");
                    }
                }
            }
        }

        runs
    }
}
