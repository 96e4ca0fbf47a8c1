//! In-memory [`JobStore`] backed by a `RwLock`-guarded map.
//!
//! Mutations take the write lock for the duration of the read-modify-write,
//! which is what gives the per-key atomicity the trait promises. Reads clone
//! the record, so observers never see a half-applied update.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use atelier_core::job::{AttemptOutcome, Job, SubmittedAttempt};
use atelier_core::types::JobId;

use crate::{JobStore, StoreError};

/// Process-local job registry.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: Job) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;
        jobs.insert(job.job_id, job);
        Ok(())
    }

    async fn get(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        let jobs = self.jobs.read().await;
        Ok(jobs.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Job>, StoreError> {
        let jobs = self.jobs.read().await;
        let mut all: Vec<Job> = jobs.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn record_attempt(
        &self,
        id: JobId,
        attempt_index: u32,
        outcome: AttemptOutcome,
    ) -> Result<Job, StoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(StoreError::JobNotFound(id))?;
        job.record_attempt(attempt_index, outcome)?;
        Ok(job.clone())
    }

    async fn mark_submitted(
        &self,
        id: JobId,
        submissions: Vec<SubmittedAttempt>,
    ) -> Result<Job, StoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(StoreError::JobNotFound(id))?;
        job.mark_submitted(submissions);
        Ok(job.clone())
    }

    async fn finalize(&self, id: JobId) -> Result<Job, StoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(StoreError::JobNotFound(id))?;
        job.finalize();
        Ok(job.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
