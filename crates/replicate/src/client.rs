//! REST client for the Replicate predictions API.
//!
//! [`ReplicateClient`] wraps prediction submission, polling, and
//! webhook-tagged submission using [`reqwest`], and implements
//! [`ImageGenerator`] so the worker and API layers stay provider-agnostic.

use std::time::Duration;

use async_trait::async_trait;

use atelier_core::job::AttemptOutcome;
use atelier_core::types::JobId;

use crate::api::{
    Prediction, PredictionInput, PredictionRequest, ReplicateError, MODEL_VERSION,
};
use crate::ImageGenerator;

/// Default Replicate API base URL.
pub const DEFAULT_API_URL: &str = "https://api.replicate.com";

/// How often a synchronous generation polls the prediction.
const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Wall-clock cap per synchronous attempt. A prediction still running past
/// this point is treated as a failed attempt rather than blocking the loop.
const MAX_WAIT: Duration = Duration::from_secs(120);

/// Webhook events we ask the provider to deliver.
const WEBHOOK_EVENTS: &[&str] = &["start", "completed"];

/// HTTP client for the Replicate predictions API.
pub struct ReplicateClient {
    client: reqwest::Client,
    api_url: String,
    token: String,
    webhook_base: Option<String>,
}

impl ReplicateClient {
    /// Create a new client.
    ///
    /// * `api_url` - Base URL, e.g. `https://api.replicate.com`.
    /// * `token`   - API token sent as `Authorization: Token ...`.
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into(),
            token: token.into(),
            webhook_base: None,
        }
    }

    /// Set the public callback URL predictions are tagged with in webhook
    /// delivery mode (e.g. `https://host/api/v1/webhooks/replicate`).
    pub fn with_webhook_base(mut self, webhook_base: impl Into<String>) -> Self {
        self.webhook_base = Some(webhook_base.into());
        self
    }

    /// Submit a prediction.
    ///
    /// Sends `POST /v1/predictions` with the standard generation input and
    /// an optional webhook tag. Returns the provider's prediction record.
    pub async fn create_prediction(
        &self,
        input: PredictionInput,
        webhook: Option<String>,
    ) -> Result<Prediction, ReplicateError> {
        let body = PredictionRequest {
            version: MODEL_VERSION,
            input,
            webhook_events_filter: webhook.as_ref().map(|_| WEBHOOK_EVENTS.to_vec()),
            webhook,
        };

        let response = self
            .client
            .post(format!("{}/v1/predictions", self.api_url))
            .header("Authorization", format!("Token {}", self.token))
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch the current state of a prediction.
    ///
    /// Sends `GET /v1/predictions/{id}`.
    pub async fn get_prediction(&self, prediction_id: &str) -> Result<Prediction, ReplicateError> {
        let response = self
            .client
            .get(format!("{}/v1/predictions/{}", self.api_url, prediction_id))
            .header("Authorization", format!("Token {}", self.token))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the response
    /// unchanged on success, or a [`ReplicateError::Api`] containing the
    /// status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ReplicateError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ReplicateError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ReplicateError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

/// Build the callback URL for one attempt.
///
/// The provider's prediction metadata cannot carry arbitrary fields, so the
/// job id and attempt index ride along as query parameters instead.
fn webhook_callback_url(base: &str, job_id: JobId, attempt_index: u32) -> String {
    format!("{base}?job_id={job_id}&attempt_index={attempt_index}")
}

#[async_trait]
impl ImageGenerator for ReplicateClient {
    async fn generate(&self, prompt: &str) -> AttemptOutcome {
        let prediction = match self
            .create_prediction(PredictionInput::for_prompt(prompt), None)
            .await
        {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to create prediction");
                return AttemptOutcome::Failure {
                    reason: e.to_string(),
                };
            }
        };

        let deadline = tokio::time::Instant::now() + MAX_WAIT;
        loop {
            match self.get_prediction(&prediction.id).await {
                Ok(current) => {
                    if let Some(outcome) = current.outcome() {
                        return outcome;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        prediction_id = %prediction.id,
                        error = %e,
                        "Failed to poll prediction"
                    );
                    return AttemptOutcome::Failure {
                        reason: e.to_string(),
                    };
                }
            }

            if tokio::time::Instant::now() + POLL_INTERVAL > deadline {
                tracing::warn!(
                    prediction_id = %prediction.id,
                    "Timed out waiting for prediction"
                );
                return AttemptOutcome::Failure {
                    reason: format!("timed out after {}s", MAX_WAIT.as_secs()),
                };
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn submit(
        &self,
        prompt: &str,
        job_id: JobId,
        attempt_index: u32,
    ) -> Result<String, ReplicateError> {
        let base = self
            .webhook_base
            .as_deref()
            .ok_or(ReplicateError::WebhookNotConfigured)?;
        let webhook = webhook_callback_url(base, job_id, attempt_index);

        let prediction = self
            .create_prediction(PredictionInput::for_prompt(prompt), Some(webhook))
            .await?;

        tracing::debug!(
            prediction_id = %prediction.id,
            %job_id,
            attempt_index,
            "Submitted prediction with webhook"
        );
        Ok(prediction.id)
    }

    async fn check(&self, prediction_id: &str) -> Result<Option<AttemptOutcome>, ReplicateError> {
        let prediction = self.get_prediction(prediction_id).await?;
        Ok(prediction.outcome())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
