//! The training-image job record and its single mutation path.
//!
//! A [`Job`] tracks progress toward generating `target_count` images for one
//! character. Every state change — from the in-process attempt loop, an
//! inbound provider webhook, or the reconciliation sweep — goes through
//! [`Job::record_attempt`], which is idempotent per attempt index so
//! duplicate or racing deliveries cannot double-count.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::generation;
use crate::types::{JobId, Timestamp};

// ---------------------------------------------------------------------------
// Status and outcome types
// ---------------------------------------------------------------------------

/// Lifecycle status of a job. Transitions only forward.
///
/// There is deliberately no `failed` terminal state: a job that exhausts its
/// attempt budget short of the target still finalizes as `Completed`, and
/// callers compare `completed_count` against `target_count` to detect
/// under-delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Completed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
        }
    }
}

/// Terminal result of one generation attempt.
///
/// Provider payloads are converted to this at the boundary; nothing
/// loosely-typed flows further in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The provider produced an image at the given location.
    Success { url: String },
    /// The attempt failed (provider error, timeout, rejection). Consumed
    /// one attempt; never escalated beyond the job's own bookkeeping.
    Failure { reason: String },
}

/// One prediction submitted up-front in webhook delivery mode.
///
/// Kept on the job so inbound callbacks can be validated against what was
/// actually submitted, and so the reconciliation sweep can poll predictions
/// whose callbacks never arrived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedAttempt {
    pub attempt_index: u32,
    pub prediction_id: String,
    pub submitted_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Job record
// ---------------------------------------------------------------------------

/// Progress record for one training-image generation request.
///
/// Invariant: `completed_count <= current_attempt <= max_attempts`, and
/// `success_rate` is always recomputed from the two counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: JobId,
    pub character_name: String,
    pub character_description: String,
    /// Requested number of successful images.
    pub target_count: u32,
    /// Attempt budget fixed at creation; see [`generation::attempt_budget`].
    pub max_attempts: u32,
    /// Attempts with a recorded outcome, regardless of result.
    pub current_attempt: u32,
    /// Attempts that produced an image.
    pub completed_count: u32,
    /// `completed_count / current_attempt * 100`; `0` before the first attempt.
    pub success_rate: f64,
    pub status: JobStatus,
    /// Locations of successfully produced images, in recording order.
    pub result_urls: Vec<String>,
    /// Attempt indices already recorded — the idempotence guard.
    pub processed_attempts: BTreeSet<u32>,
    /// Predictions submitted up-front (webhook delivery mode only).
    pub submitted: Vec<SubmittedAttempt>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Job {
    /// Create a new job in `processing` state with zeroed counters.
    ///
    /// Fails with [`CoreError::Validation`] if `target_count` is outside the
    /// accepted range; no record comes into existence in that case.
    pub fn new(
        character_name: impl Into<String>,
        character_description: impl Into<String>,
        target_count: u32,
    ) -> Result<Self, CoreError> {
        generation::validate_target_count(target_count)?;

        let now = chrono::Utc::now();
        Ok(Self {
            job_id: uuid::Uuid::new_v4(),
            character_name: character_name.into(),
            character_description: character_description.into(),
            target_count,
            max_attempts: generation::attempt_budget(target_count),
            current_attempt: 0,
            completed_count: 0,
            success_rate: 0.0,
            status: JobStatus::Processing,
            result_urls: Vec::new(),
            processed_attempts: BTreeSet::new(),
            submitted: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Record the outcome of one attempt.
    ///
    /// Returns `Ok(true)` if the outcome was applied, `Ok(false)` if this
    /// attempt index was already recorded (duplicate delivery — counters and
    /// `result_urls` are left untouched). Indices outside `1..=max_attempts`
    /// are rejected.
    pub fn record_attempt(
        &mut self,
        attempt_index: u32,
        outcome: AttemptOutcome,
    ) -> Result<bool, CoreError> {
        if attempt_index == 0 || attempt_index > self.max_attempts {
            return Err(CoreError::Validation(format!(
                "attempt_index must be between 1 and {}, got {attempt_index}",
                self.max_attempts
            )));
        }

        if !self.processed_attempts.insert(attempt_index) {
            return Ok(false);
        }

        self.current_attempt += 1;
        if let AttemptOutcome::Success { url } = outcome {
            self.completed_count += 1;
            self.result_urls.push(url);
        }
        self.success_rate = generation::success_rate(self.completed_count, self.current_attempt);
        self.updated_at = chrono::Utc::now();
        Ok(true)
    }

    /// Register predictions submitted up-front for webhook delivery.
    pub fn mark_submitted(&mut self, submissions: Vec<SubmittedAttempt>) {
        self.submitted.extend(submissions);
        self.updated_at = chrono::Utc::now();
    }

    /// Mark the job terminal. Idempotent; the status only moves forward.
    pub fn finalize(&mut self) {
        if self.status != JobStatus::Completed {
            self.status = JobStatus::Completed;
            self.updated_at = chrono::Utc::now();
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status == JobStatus::Completed
    }

    /// Enough images were produced.
    pub fn target_reached(&self) -> bool {
        self.completed_count >= self.target_count
    }

    /// The attempt budget ran out.
    pub fn budget_exhausted(&self) -> bool {
        self.current_attempt >= self.max_attempts
    }

    /// Every submitted prediction has reported an outcome (webhook mode).
    ///
    /// False while nothing has been submitted, so a freshly created
    /// webhook-mode job is not considered settled before submission.
    pub fn all_outcomes_received(&self) -> bool {
        !self.submitted.is_empty()
            && self
                .submitted
                .iter()
                .all(|s| self.processed_attempts.contains(&s.attempt_index))
    }

    /// No further outcomes can change this job — it is ready to finalize.
    pub fn settled(&self) -> bool {
        self.target_reached() || self.budget_exhausted() || self.all_outcomes_received()
    }

    /// Submitted predictions still waiting for an outcome.
    pub fn pending_submissions(&self) -> impl Iterator<Item = &SubmittedAttempt> {
        self.submitted
            .iter()
            .filter(|s| !self.processed_attempts.contains(&s.attempt_index))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
