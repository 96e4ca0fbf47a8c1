//! Reconciliation sweep for webhook-delivered jobs.
//!
//! Provider callbacks are not guaranteed to arrive: deliveries get dropped,
//! and submissions that failed outright never produce one. [`Reconciler`]
//! runs as a background task, polling the provider for every
//! submitted-but-unreported prediction on a `processing` job and recording
//! terminal outcomes through the same idempotent path the webhook handler
//! uses, so a late callback racing a sweep cannot double-count.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use atelier_core::job::Job;
use atelier_replicate::ImageGenerator;
use atelier_store::{JobStore, StoreError};

/// How often the sweep runs.
const RECONCILE_INTERVAL: Duration = Duration::from_secs(60);

/// Background service that closes out jobs with missing callbacks.
pub struct Reconciler {
    store: Arc<dyn JobStore>,
    generator: Arc<dyn ImageGenerator>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn JobStore>, generator: Arc<dyn ImageGenerator>) -> Self {
        Self { store, generator }
    }

    /// Run the sweep loop until the token is cancelled.
    pub async fn run(self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(RECONCILE_INTERVAL);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Reconciler cancelled");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.sweep().await {
                        tracing::error!(error = %e, "Reconciliation sweep failed");
                    }
                }
            }
        }
    }

    /// One pass over all in-flight webhook jobs.
    ///
    /// Errors from the provider for individual predictions are logged and
    /// left for the next sweep; only store errors abort the pass.
    pub async fn sweep(&self) -> Result<(), StoreError> {
        let jobs = self.store.list().await?;

        for job in jobs
            .into_iter()
            .filter(|j| !j.is_terminal() && !j.submitted.is_empty())
        {
            if let Err(e) = self.reconcile_job(job).await {
                tracing::error!(error = %e, "Failed to reconcile job");
            }
        }
        Ok(())
    }

    /// Poll pending predictions for one job and finalize it if settled.
    async fn reconcile_job(&self, job: Job) -> Result<(), StoreError> {
        let job_id = job.job_id;
        let pending: Vec<_> = job
            .pending_submissions()
            .map(|s| (s.attempt_index, s.prediction_id.clone()))
            .collect();

        let mut current = job;
        for (attempt_index, prediction_id) in pending {
            // Stop polling as soon as the job no longer needs outcomes.
            if current.settled() {
                break;
            }

            match self.generator.check(&prediction_id).await {
                Ok(Some(outcome)) => {
                    tracing::info!(
                        %job_id,
                        attempt = attempt_index,
                        %prediction_id,
                        "Recovered outcome for missed callback"
                    );
                    current = self
                        .store
                        .record_attempt(job_id, attempt_index, outcome)
                        .await?;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        %job_id,
                        %prediction_id,
                        error = %e,
                        "Could not check prediction status"
                    );
                }
            }
        }

        if current.settled() {
            let finalized = self.store.finalize(job_id).await?;
            tracing::info!(
                %job_id,
                completed = finalized.completed_count,
                target = finalized.target_count,
                "Job finalized by reconciliation"
            );
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
