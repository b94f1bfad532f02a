//! Stale-processing sweep.
//!
//! A fulfillment that dies mid-flight (process crash, panic in a task) leaves
//! its job in `processing`. The sweep moves such jobs to `failed` once their
//! `updated_at` is older than the threshold. It never re-queues work.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use diagpro_core::{DiagnosticStatus, DiagnosticUpdate};

use crate::repository::{DiagnosticRepository, RepositoryError};

#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// How long a job may sit in `processing` before it is failed.
    pub threshold: chrono::Duration,
    pub interval: Duration,
    /// Maximum jobs failed per pass.
    pub batch_size: usize,
    pub name: String,
}

impl SweeperConfig {
    pub fn new(threshold: chrono::Duration) -> Self {
        Self {
            threshold,
            interval: Duration::from_secs(60),
            batch_size: 100,
            name: "stale-processing-sweeper".to_string(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Handle to control a running sweeper.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

impl SweeperHandle {
    /// Request graceful shutdown and wait for the loop to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        let _ = self.join.await;
    }
}

pub struct StaleProcessingSweeper {
    repository: Arc<dyn DiagnosticRepository>,
    config: SweeperConfig,
}

impl StaleProcessingSweeper {
    pub fn new(repository: Arc<dyn DiagnosticRepository>, config: SweeperConfig) -> Self {
        Self { repository, config }
    }

    /// One pass: fail every `processing` job last touched before `now - threshold`.
    /// Returns how many jobs were moved.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Result<usize, RepositoryError> {
        let cutoff = now - self.config.threshold;
        let stale = self
            .repository
            .list_by_status_older_than(DiagnosticStatus::Processing, cutoff, self.config.batch_size)
            .await?;

        let mut failed = 0;
        for job in stale {
            match self.repository.apply(&job.id, &DiagnosticUpdate::failed(now)).await {
                Ok(_) => {
                    warn!(
                        diagnostic_id = %job.id,
                        status = %DiagnosticStatus::Failed,
                        stuck_since = %job.updated_at,
                        "stale processing job failed"
                    );
                    failed += 1;
                }
                // Finished concurrently; nothing to do.
                Err(e) if e.is_illegal_transition() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(failed)
    }

    /// Run [`Self::sweep_once`] on an interval until shut down.
    pub fn spawn(self) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let join = tokio::spawn(async move {
            let name = self.config.name.clone();
            info!(executor = %name, threshold_secs = self.config.threshold.num_seconds(), "sweeper started");

            let mut ticker = tokio::time::interval(self.config.interval);
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        match self.sweep_once(Utc::now()).await {
                            Ok(0) => {}
                            Ok(n) => info!(executor = %name, failed = n, "sweep pass completed"),
                            Err(e) => error!(executor = %name, error = %e, "sweep pass failed"),
                        }
                    }
                }
            }

            info!(executor = %name, "sweeper stopped");
        });

        SweeperHandle {
            shutdown: shutdown_tx,
            join,
        }
    }
}
