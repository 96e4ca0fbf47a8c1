//! Drivers that move a job from `processing` to `completed`.
//!
//! [`run_attempt_loop`] is the synchronous/polling strategy: one generation
//! at a time, each outcome persisted before the next attempt starts. A job
//! has exactly one loop instance — the handler that creates the job spawns
//! it once, and nothing else writes to the record on this path.
//!
//! [`submit_webhook_attempts`] is the asynchronous strategy: every attempt
//! is submitted up front, tagged with the job id and attempt index, and the
//! inbound webhook handler records outcomes as they arrive.

use std::sync::Arc;
use std::time::Duration;

use atelier_core::generation::{evaluate_attempt_loop, LoopDecision};
use atelier_core::job::{AttemptOutcome, Job, SubmittedAttempt};
use atelier_core::prompts::prompt_for_attempt;
use atelier_core::types::JobId;
use atelier_replicate::ImageGenerator;
use atelier_store::{JobStore, StoreError};

/// Drive a job to completion, one attempt at a time.
///
/// Each iteration cycles to the next prompt variation, runs one generation
/// to a terminal result, and persists the outcome immediately — observers
/// polling the store see every attempt, not a batch at the end. A failed
/// attempt is not retried in place; it consumes budget and the loop moves
/// on. The loop halts as soon as the target is reached or the budget is
/// spent, then finalizes the job. `attempt_delay` paces attempts to stay
/// clear of provider rate limits; tests pass [`Duration::ZERO`].
pub async fn run_attempt_loop(
    store: Arc<dyn JobStore>,
    generator: Arc<dyn ImageGenerator>,
    job_id: JobId,
    attempt_delay: Duration,
) -> Result<Job, StoreError> {
    let mut job = store
        .get(job_id)
        .await?
        .ok_or(StoreError::JobNotFound(job_id))?;

    loop {
        let decision = evaluate_attempt_loop(
            job.completed_count,
            job.target_count,
            job.current_attempt,
            job.max_attempts,
        );
        if decision != LoopDecision::Continue {
            break;
        }

        let attempt_index = job.current_attempt + 1;
        let prompt = prompt_for_attempt(&job.character_description, attempt_index);

        tracing::info!(
            %job_id,
            attempt = attempt_index,
            max_attempts = job.max_attempts,
            completed = job.completed_count,
            target = job.target_count,
            "Starting generation attempt"
        );

        let outcome = generator.generate(&prompt).await;
        match &outcome {
            AttemptOutcome::Success { url } => {
                tracing::info!(%job_id, attempt = attempt_index, %url, "Attempt succeeded");
            }
            AttemptOutcome::Failure { reason } => {
                tracing::warn!(%job_id, attempt = attempt_index, %reason, "Attempt failed");
            }
        }

        job = store.record_attempt(job_id, attempt_index, outcome).await?;

        if !attempt_delay.is_zero() && !job.settled() {
            tokio::time::sleep(attempt_delay).await;
        }
    }

    let finalized = store.finalize(job_id).await?;
    tracing::info!(
        %job_id,
        completed = finalized.completed_count,
        target = finalized.target_count,
        attempts = finalized.current_attempt,
        success_rate = finalized.success_rate,
        "Attempt loop finished"
    );
    Ok(finalized)
}

/// Submit every attempt up front for webhook delivery.
///
/// One prediction per requested image, each tagged with `(job_id,
/// attempt_index)` so the inbound callback can be matched back. Submissions
/// that fail are logged and skipped — no outcome will ever arrive for them,
/// and the reconciliation sweep closes the job once the rest have reported.
/// If nothing could be submitted at all, the job is finalized on the spot.
pub async fn submit_webhook_attempts(
    store: Arc<dyn JobStore>,
    generator: Arc<dyn ImageGenerator>,
    job_id: JobId,
) -> Result<Job, StoreError> {
    let job = store
        .get(job_id)
        .await?
        .ok_or(StoreError::JobNotFound(job_id))?;

    let mut submissions = Vec::new();
    for attempt_index in 1..=job.target_count {
        let prompt = prompt_for_attempt(&job.character_description, attempt_index);
        match generator.submit(&prompt, job_id, attempt_index).await {
            Ok(prediction_id) => {
                submissions.push(SubmittedAttempt {
                    attempt_index,
                    prediction_id,
                    submitted_at: chrono::Utc::now(),
                });
            }
            Err(e) => {
                tracing::warn!(
                    %job_id,
                    attempt = attempt_index,
                    error = %e,
                    "Failed to submit prediction"
                );
            }
        }
    }

    if submissions.is_empty() {
        tracing::error!(%job_id, "No predictions could be submitted; closing job");
        return store.finalize(job_id).await;
    }

    let submitted_count = submissions.len();
    let updated = store.mark_submitted(job_id, submissions).await?;
    tracing::info!(
        %job_id,
        submitted = submitted_count,
        target = updated.target_count,
        "Submitted predictions for webhook delivery"
    );
    Ok(updated)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
