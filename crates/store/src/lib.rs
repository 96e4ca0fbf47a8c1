//! Persistence seam for job records.
//!
//! [`JobStore`] is a key-value abstraction over the job registry: one record
//! per job id, with per-key atomic application of attempt outcomes. The
//! in-memory implementation in [`memory`] backs the service and its tests;
//! a hosted key-value backend would implement the same trait with
//! conditional updates.

pub mod memory;

use async_trait::async_trait;

use atelier_core::job::{AttemptOutcome, Job, SubmittedAttempt};
use atelier_core::types::JobId;

pub use memory::MemoryJobStore;

/// Errors from the job store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Invalid update: {0}")]
    InvalidUpdate(#[from] atelier_core::error::CoreError),
}

/// Key-value registry of job records.
///
/// `record_attempt` and `mark_submitted` apply their mutation atomically for
/// the given key, so racing webhook deliveries for the same job cannot lose
/// results or double-count — the idempotence check inside
/// [`Job::record_attempt`] runs under the same exclusion as the write.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a freshly created job. The record must be visible to readers
    /// before the creating request returns.
    async fn insert(&self, job: Job) -> Result<(), StoreError>;

    /// Fetch a job by id, `None` if no such record exists.
    async fn get(&self, id: JobId) -> Result<Option<Job>, StoreError>;

    /// All jobs, newest first.
    async fn list(&self) -> Result<Vec<Job>, StoreError>;

    /// Atomically apply one attempt outcome and return the updated record.
    ///
    /// Duplicate `(id, attempt_index)` applications return the record
    /// unchanged.
    async fn record_attempt(
        &self,
        id: JobId,
        attempt_index: u32,
        outcome: AttemptOutcome,
    ) -> Result<Job, StoreError>;

    /// Register up-front prediction submissions (webhook delivery mode).
    async fn mark_submitted(
        &self,
        id: JobId,
        submissions: Vec<SubmittedAttempt>,
    ) -> Result<Job, StoreError>;

    /// Move the job to its terminal status and return the updated record.
    async fn finalize(&self, id: JobId) -> Result<Job, StoreError>;
}
