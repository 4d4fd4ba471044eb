//! Supervisor for the simulated fleet.
//!
//! [`WorkerPool`] spawns one Tokio task per configured client, each running
//! [`worker_loop`] with its own VIN, HTTP client and pacer, and waits for all
//! of them to stop. Workers share nothing mutable; the only coordination is
//! the pool's [`CancellationToken`].

use crate::{
    client::CommandClient,
    config::LoadgenConfig,
    pool::worker::{WorkerExit, WorkerReport, worker_loop},
};
use core::time::Duration;
use fleetcmd_core::{TransportError, derive_identity};
use futures::future::join_all;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A fleet of independent, rate-paced workers.
pub struct WorkerPool {
    config: Arc<LoadgenConfig>,
    shutdown_token: CancellationToken,
}

impl WorkerPool {
    pub fn new(config: LoadgenConfig, shutdown_token: CancellationToken) -> Self {
        Self {
            config: Arc::new(config),
            shutdown_token,
        }
    }

    pub const fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown_token
    }

    pub fn config(&self) -> &LoadgenConfig {
        &self.config
    }

    /// Stops every worker. In-flight requests are abandoned.
    pub fn shutdown(&self) {
        tracing::info!("Stopping all workers");
        self.shutdown_token.cancel();
    }

    /// Runs workers `1..=num_clients` until each has stopped, either on its
    /// own transport error or because the shutdown token fired.
    ///
    /// A panicking worker is recorded as [`WorkerExit::Panicked`]; it does not
    /// affect its siblings.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Request`] if an HTTP client cannot be
    /// constructed. No worker is started in that case.
    pub async fn run(&self) -> Result<PoolReport, TransportError> {
        let started = Instant::now();

        let mut slots = Vec::with_capacity(self.config.num_clients);
        for worker_id in 1..=self.config.num_clients {
            let client = CommandClient::new(&self.config.target, self.config.request_timeout)?;
            slots.push((worker_id, derive_identity(worker_id), client));
        }

        let mut handles = Vec::with_capacity(slots.len());
        let mut identities = Vec::with_capacity(slots.len());
        for (worker_id, identity, client) in slots {
            tracing::trace!(worker = worker_id, vin = %identity, "Spawning worker");
            identities.push((worker_id, identity.clone()));
            handles.push(tokio::spawn(worker_loop(
                worker_id,
                identity,
                client,
                Arc::clone(&self.config),
                self.shutdown_token.clone(),
            )));
        }

        tracing::info!(
            workers = handles.len(),
            rate = self.config.rate,
            target = %self.config.target,
            "Worker pool started"
        );

        let workers = join_all(handles)
            .await
            .into_iter()
            .zip(identities)
            .map(|(joined, (worker_id, identity))| match joined {
                Ok(report) => report,
                Err(err) => {
                    tracing::error!(
                        worker = worker_id,
                        vin = %identity,
                        error = %err,
                        "Worker panicked"
                    );
                    WorkerReport {
                        worker_id,
                        identity,
                        acknowledged: 0,
                        exit: WorkerExit::Panicked(err.to_string()),
                    }
                }
            })
            .collect();

        Ok(PoolReport {
            workers,
            elapsed: started.elapsed(),
        })
    }
}

/// Outcome of a [`WorkerPool::run`], one entry per worker in slot order.
#[derive(Clone, Debug)]
pub struct PoolReport {
    pub workers: Vec<WorkerReport>,
    pub elapsed: Duration,
}

impl PoolReport {
    /// Acknowledged requests across the fleet.
    pub fn acknowledged(&self) -> u64 {
        self.workers.iter().map(|w| w.acknowledged).sum()
    }

    pub fn failed(&self) -> impl Iterator<Item = &WorkerReport> {
        self.workers.iter().filter(|w| w.is_failure())
    }

    pub fn cancelled(&self) -> usize {
        self.workers
            .iter()
            .filter(|w| w.exit == WorkerExit::Cancelled)
            .count()
    }

    /// Logs one line per worker and a fleet total.
    pub fn log_summary(&self) {
        for worker in &self.workers {
            match &worker.exit {
                WorkerExit::Cancelled => tracing::info!(
                    worker = worker.worker_id,
                    vin = %worker.identity,
                    acknowledged = worker.acknowledged,
                    "Worker cancelled"
                ),
                WorkerExit::Failed(err) => tracing::warn!(
                    worker = worker.worker_id,
                    vin = %worker.identity,
                    acknowledged = worker.acknowledged,
                    kind = err.kind(),
                    error = %err,
                    "Worker failed"
                ),
                WorkerExit::Panicked(reason) => tracing::warn!(
                    worker = worker.worker_id,
                    vin = %worker.identity,
                    reason = %reason,
                    "Worker panicked"
                ),
            }
        }

        tracing::info!(
            workers = self.workers.len(),
            acknowledged = self.acknowledged(),
            failed = self.failed().count(),
            cancelled = self.cancelled(),
            elapsed_ms = self.elapsed.as_millis() as u64,
            "Worker pool finished"
        );
    }
}
