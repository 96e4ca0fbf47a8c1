//! Inbound provider callback for webhook-delivered jobs.
//!
//! Routes:
//! - `POST /webhooks/replicate?job_id=...&attempt_index=...` — record one
//!   prediction outcome
//!
//! The prediction metadata cannot carry arbitrary fields, so submissions
//! tag the callback URL with the job id and attempt index as query
//! parameters; the body is the provider's prediction payload. Deliveries
//! may arrive out of order, duplicated, or racing the reconciliation sweep
//! — all of that funnels into the store's idempotent record path, so the
//! same `(job_id, attempt_index)` can never double-count.
//!
//! Signature verification is handled at the gateway in front of this
//! service, not here.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use atelier_core::job::JobStatus;
use atelier_core::types::JobId;
use atelier_replicate::Prediction;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Query / response types
// ---------------------------------------------------------------------------

/// Identifies which attempt a callback reports on.
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub job_id: JobId,
    pub attempt_index: u32,
}

/// Acknowledgement returned for every accepted callback.
#[derive(Debug, Serialize)]
pub struct CallbackAck {
    pub job_id: JobId,
    pub attempt_index: u32,
    /// Whether this delivery changed the job (false for duplicates and
    /// non-terminal events).
    pub applied: bool,
    pub status: JobStatus,
}

// ---------------------------------------------------------------------------
// POST /webhooks/replicate
// ---------------------------------------------------------------------------

/// Record one prediction outcome reported by the provider.
///
/// Non-terminal events (`start`) are acknowledged without touching the job.
/// Terminal outcomes are recorded idempotently; once the job is settled —
/// target reached, budget exhausted, or every submission reported — it is
/// finalized.
pub async fn replicate_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
    Json(prediction): Json<Prediction>,
) -> AppResult<impl IntoResponse> {
    let job = super::find_job(&state, params.job_id).await?;

    // Callbacks only make sense for attempts this job actually submitted.
    if !job
        .submitted
        .iter()
        .any(|s| s.attempt_index == params.attempt_index)
    {
        return Err(AppError::BadRequest(format!(
            "attempt_index {} was not submitted for job {}",
            params.attempt_index, params.job_id
        )));
    }

    let Some(outcome) = prediction.outcome() else {
        tracing::debug!(
            job_id = %params.job_id,
            attempt = params.attempt_index,
            prediction_id = %prediction.id,
            "Ignoring non-terminal callback event"
        );
        return Ok(Json(DataResponse {
            data: CallbackAck {
                job_id: params.job_id,
                attempt_index: params.attempt_index,
                applied: false,
                status: job.status,
            },
        }));
    };

    let applied = !job.processed_attempts.contains(&params.attempt_index);
    let mut updated = state
        .store
        .record_attempt(params.job_id, params.attempt_index, outcome)
        .await?;

    if updated.settled() && !updated.is_terminal() {
        updated = state.store.finalize(params.job_id).await?;
    }

    tracing::info!(
        job_id = %params.job_id,
        attempt = params.attempt_index,
        applied,
        completed = updated.completed_count,
        target = updated.target_count,
        status = updated.status.as_str(),
        "Processed provider callback"
    );

    Ok(Json(DataResponse {
        data: CallbackAck {
            job_id: params.job_id,
            attempt_index: params.attempt_index,
            applied,
            status: updated.status,
        },
    }))
}
