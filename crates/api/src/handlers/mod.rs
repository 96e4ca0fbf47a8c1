pub mod training_jobs;
pub mod webhooks;

use atelier_core::error::CoreError;
use atelier_core::job::Job;
use atelier_core::types::JobId;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Fetch a job by id, returning the full record or a 404-mapped error.
async fn find_job(state: &AppState, job_id: JobId) -> AppResult<Job> {
    state
        .store
        .get(job_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Job",
            id: job_id,
        }))
}
