//! Replicate HTTP client library.
//!
//! Provides typed prediction payloads, the REST client for submitting and
//! polling predictions, and the [`ImageGenerator`] seam the worker and API
//! layers program against.

pub mod api;
pub mod client;

use async_trait::async_trait;

use atelier_core::job::AttemptOutcome;
use atelier_core::types::JobId;

pub use api::{Prediction, PredictionStatus, ReplicateError};
pub use client::ReplicateClient;

/// The remote single-image generation operation, abstracted over delivery
/// mechanism.
///
/// Implemented by [`ReplicateClient`] against the real provider and by
/// scripted doubles in tests. All three calls map to one attempt each.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Synchronous strategy: run one generation to a terminal result.
    ///
    /// Transport errors and timeouts surface as
    /// [`AttemptOutcome::Failure`] — one consumed attempt, never an error
    /// the caller has to unwind.
    async fn generate(&self, prompt: &str) -> AttemptOutcome;

    /// Webhook strategy: submit one generation tagged with the job id and
    /// attempt index, to be reported later via callback. Returns the
    /// provider's prediction id.
    async fn submit(
        &self,
        prompt: &str,
        job_id: JobId,
        attempt_index: u32,
    ) -> Result<String, ReplicateError>;

    /// Poll one previously submitted prediction. `None` means it is still
    /// running; `Some` carries the terminal outcome.
    async fn check(&self, prediction_id: &str) -> Result<Option<AttemptOutcome>, ReplicateError>;
}
