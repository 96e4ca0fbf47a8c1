//! Handlers for the `/training-jobs` resource.
//!
//! Routes:
//! - `POST /training-jobs`        — start a training-image generation job
//! - `GET  /training-jobs`        — list job summaries
//! - `GET  /training-jobs/{id}`   — job progress snapshot

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use atelier_core::job::{Job, JobStatus};
use atelier_core::types::JobId;

use crate::config::DeliveryMode;
use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for starting a job.
#[derive(Debug, Deserialize)]
pub struct StartTrainingJob {
    pub character_name: String,
    pub character_description: String,
    /// Requested number of successful images. Defaults to 15.
    #[serde(default = "default_target_count")]
    pub target_count: u32,
}

fn default_target_count() -> u32 {
    15
}

/// Response for a freshly started job.
#[derive(Debug, Serialize)]
pub struct StartTrainingJobResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    pub target_count: u32,
    pub max_attempts: u32,
    pub current_attempt: u32,
    pub success_rate: f64,
}

/// Full progress snapshot of one job.
#[derive(Debug, Serialize)]
pub struct TrainingJobStatus {
    pub job_id: JobId,
    pub character_name: String,
    pub status: JobStatus,
    pub completed_count: u32,
    pub target_count: u32,
    pub current_attempt: u32,
    pub max_attempts: u32,
    pub success_rate: f64,
    pub result_urls: Vec<String>,
}

impl From<Job> for TrainingJobStatus {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.job_id,
            character_name: job.character_name,
            status: job.status,
            completed_count: job.completed_count,
            target_count: job.target_count,
            current_attempt: job.current_attempt,
            max_attempts: job.max_attempts,
            success_rate: job.success_rate,
            result_urls: job.result_urls,
        }
    }
}

/// Compact row for the job listing.
#[derive(Debug, Serialize)]
pub struct TrainingJobSummary {
    pub job_id: JobId,
    pub character_name: String,
    pub status: JobStatus,
    pub target_count: u32,
    pub completed_count: u32,
    pub success_rate: f64,
}

// ---------------------------------------------------------------------------
// POST /training-jobs
// ---------------------------------------------------------------------------

/// Start a training-image generation job.
///
/// Validates the request, persists the initial record (so progress readers
/// can find it immediately), then hands the job to the configured driver:
/// the in-process attempt loop in poll mode, or up-front prediction
/// submission in webhook mode. Returns 201 with the initial counters.
pub async fn start_training_job(
    State(state): State<AppState>,
    Json(input): Json<StartTrainingJob>,
) -> AppResult<impl IntoResponse> {
    if input.character_name.trim().is_empty() {
        return Err(AppError::BadRequest(
            "character_name must not be empty".to_string(),
        ));
    }
    if input.character_description.trim().is_empty() {
        return Err(AppError::BadRequest(
            "character_description must not be empty".to_string(),
        ));
    }

    // Rejects out-of-range targets before anything is persisted.
    let job = Job::new(
        input.character_name,
        input.character_description,
        input.target_count,
    )?;

    let response = StartTrainingJobResponse {
        job_id: job.job_id,
        status: job.status,
        target_count: job.target_count,
        max_attempts: job.max_attempts,
        current_attempt: job.current_attempt,
        success_rate: job.success_rate,
    };
    let job_id = job.job_id;

    state.store.insert(job).await?;

    spawn_job_driver(&state, job_id);

    tracing::info!(
        %job_id,
        target = response.target_count,
        max_attempts = response.max_attempts,
        delivery = ?state.config.generation.delivery,
        "Training job started"
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: response })))
}

/// Spawn the background driver that owns this job from here on.
///
/// Exactly one driver per job: the poll-mode loop is the record's sole
/// writer; in webhook mode the submission pass runs once and later writes
/// come through the callback handler and reconciler, which share the
/// idempotent record path.
fn spawn_job_driver(state: &AppState, job_id: JobId) {
    let store = Arc::clone(&state.store);
    let generator = Arc::clone(&state.generator);

    match state.config.generation.delivery {
        DeliveryMode::Poll => {
            let attempt_delay = state.config.generation.attempt_delay;
            tokio::spawn(async move {
                if let Err(e) =
                    atelier_worker::runner::run_attempt_loop(store, generator, job_id, attempt_delay)
                        .await
                {
                    tracing::error!(%job_id, error = %e, "Attempt loop aborted");
                }
            });
        }
        DeliveryMode::Webhook => {
            tokio::spawn(async move {
                if let Err(e) =
                    atelier_worker::runner::submit_webhook_attempts(store, generator, job_id).await
                {
                    tracing::error!(%job_id, error = %e, "Webhook submission aborted");
                }
            });
        }
    }
}

// ---------------------------------------------------------------------------
// GET /training-jobs/{id}
// ---------------------------------------------------------------------------

/// Progress snapshot for one job.
///
/// A pure read of the persisted record — all derived fields were computed
/// when the last attempt was recorded.
pub async fn get_training_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = super::find_job(&state, job_id).await?;
    Ok(Json(DataResponse {
        data: TrainingJobStatus::from(job),
    }))
}

// ---------------------------------------------------------------------------
// GET /training-jobs
// ---------------------------------------------------------------------------

/// List job summaries, newest first.
pub async fn list_training_jobs(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let jobs = state.store.list().await?;
    let summaries: Vec<TrainingJobSummary> = jobs
        .into_iter()
        .map(|job| TrainingJobSummary {
            job_id: job.job_id,
            character_name: job.character_name,
            status: job.status,
            target_count: job.target_count,
            completed_count: job.completed_count,
            success_rate: job.success_rate,
        })
        .collect();

    tracing::debug!(count = summaries.len(), "Listed training jobs");

    Ok(Json(DataResponse { data: summaries }))
}
