//! Wire types for the Replicate predictions API.
//!
//! The provider reports prediction output as either a list of URLs or a
//! bare URL string depending on the model; [`Prediction::first_output_url`]
//! absorbs that here so only the typed [`AttemptOutcome`] travels inward.

use serde::{Deserialize, Serialize};

use atelier_core::job::AttemptOutcome;

/// Model identifier submitted with every prediction.
pub const MODEL_VERSION: &str = "black-forest-labs/flux-dev";

/// Errors from the Replicate REST layer.
#[derive(Debug, thiserror::Error)]
pub enum ReplicateError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Replicate returned a non-2xx status code.
    #[error("Replicate API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A webhook submission was attempted without a configured callback URL.
    #[error("Webhook base URL not configured")]
    WebhookNotConfigured,
}

/// Generation parameters sent as the prediction `input`.
///
/// Fixed portrait-ratio settings tuned for training-image sets; only the
/// prompt varies between attempts.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionInput {
    pub prompt: String,
    pub aspect_ratio: &'static str,
    pub output_format: &'static str,
    pub output_quality: u8,
    pub num_inference_steps: u32,
    pub guidance_scale: f64,
    pub num_outputs: u32,
    pub disable_safety_checker: bool,
}

impl PredictionInput {
    /// Standard parameters with the given prompt.
    pub fn for_prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            aspect_ratio: "3:4",
            output_format: "jpg",
            output_quality: 100,
            num_inference_steps: 50,
            guidance_scale: 3.5,
            num_outputs: 1,
            disable_safety_checker: false,
        }
    }
}

/// Request body for `POST /v1/predictions`.
#[derive(Debug, Serialize)]
pub struct PredictionRequest {
    pub version: &'static str,
    pub input: PredictionInput,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_events_filter: Option<Vec<&'static str>>,
}

/// Prediction lifecycle states reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

impl PredictionStatus {
    /// Whether the prediction can no longer change state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PredictionStatus::Succeeded | PredictionStatus::Failed | PredictionStatus::Canceled
        )
    }
}

/// A prediction as returned by the create/get endpoints and webhook payloads.
#[derive(Debug, Clone, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub status: PredictionStatus,
    /// Output location(s); a list of URLs or a bare URL depending on model.
    #[serde(default)]
    pub output: Option<serde_json::Value>,
    /// Provider-reported error message for failed predictions.
    #[serde(default)]
    pub error: Option<String>,
}

impl Prediction {
    /// First output URL, whichever shape the provider chose.
    pub fn first_output_url(&self) -> Option<String> {
        match &self.output {
            Some(serde_json::Value::String(url)) => Some(url.clone()),
            Some(serde_json::Value::Array(items)) => items
                .first()
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            _ => None,
        }
    }

    /// Convert a terminal prediction into an attempt outcome.
    ///
    /// Returns `None` while the prediction is still running. A succeeded
    /// prediction with no usable output is a failure — the attempt produced
    /// nothing we can store.
    pub fn outcome(&self) -> Option<AttemptOutcome> {
        match self.status {
            PredictionStatus::Succeeded => Some(match self.first_output_url() {
                Some(url) => AttemptOutcome::Success { url },
                None => AttemptOutcome::Failure {
                    reason: "prediction succeeded without output".to_string(),
                },
            }),
            PredictionStatus::Failed | PredictionStatus::Canceled => {
                Some(AttemptOutcome::Failure {
                    reason: self
                        .error
                        .clone()
                        .unwrap_or_else(|| "image generation failed".to_string()),
                })
            }
            PredictionStatus::Starting | PredictionStatus::Processing => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
