//! Shared helpers for API integration tests.
//!
//! Builds the full application router with the same middleware stack as
//! `main.rs`, backed by an in-memory store and a scripted generator standing
//! in for the remote provider.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use atelier_api::config::{DeliveryMode, GenerationConfig, ServerConfig};
use atelier_api::router::build_app_router;
use atelier_api::state::AppState;
use atelier_core::job::AttemptOutcome;
use atelier_core::types::JobId;
use atelier_replicate::{ImageGenerator, ReplicateError};
use atelier_store::{JobStore, MemoryJobStore};

/// Build a test `ServerConfig` with safe defaults and no attempt pacing.
pub fn test_config(delivery: DeliveryMode) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        generation: GenerationConfig {
            replicate_api_url: "http://replicate.test".to_string(),
            replicate_api_token: "test-token".to_string(),
            delivery,
            webhook_base_url: Some("http://atelier.test/api/v1/webhooks/replicate".to_string()),
            attempt_delay: Duration::ZERO,
        },
    }
}

/// Build the full application router plus a handle on its store.
///
/// This mirrors the router construction in `main.rs` so integration tests
/// exercise the same middleware stack (CORS, request ID, timeout, tracing,
/// panic recovery) that production uses.
pub fn build_test_app(
    delivery: DeliveryMode,
    generator: Arc<dyn ImageGenerator>,
) -> (Router, Arc<MemoryJobStore>) {
    let store = Arc::new(MemoryJobStore::new());
    let config = test_config(delivery);

    let state = AppState {
        store: Arc::clone(&store) as Arc<dyn JobStore>,
        generator,
        config: Arc::new(config.clone()),
    };

    (build_app_router(state, &config), store)
}

// ---------------------------------------------------------------------------
// Scripted generator
// ---------------------------------------------------------------------------

/// Stand-in for the remote provider.
///
/// `generate` replays a fixed outcome script and fails once it runs dry;
/// `submit` hands back deterministic prediction ids.
pub struct ScriptedGenerator {
    outcomes: Mutex<VecDeque<AttemptOutcome>>,
}

impl ScriptedGenerator {
    pub fn with_outcomes(outcomes: Vec<AttemptOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
        }
    }

    /// Every attempt succeeds with a deterministic URL.
    pub fn always_succeeding(count: u32) -> Self {
        Self::with_outcomes(
            (1..=count)
                .map(|i| AttemptOutcome::Success {
                    url: format!("https://images.test/img-{i:02}.jpg"),
                })
                .collect(),
        )
    }

    /// Every attempt fails.
    pub fn always_failing() -> Self {
        Self::with_outcomes(Vec::new())
    }
}

#[async_trait]
impl ImageGenerator for ScriptedGenerator {
    async fn generate(&self, _prompt: &str) -> AttemptOutcome {
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(AttemptOutcome::Failure {
                reason: "scripted failure".to_string(),
            })
    }

    async fn submit(
        &self,
        _prompt: &str,
        _job_id: JobId,
        attempt_index: u32,
    ) -> Result<String, ReplicateError> {
        Ok(format!("pred-{attempt_index}"))
    }

    async fn check(&self, _prediction_id: &str) -> Result<Option<AttemptOutcome>, ReplicateError> {
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

/// Issue a GET request against the app.
pub async fn get(app: &Router, uri: &str) -> Response {
    app.clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response")
}

/// Issue a POST request with a JSON body against the app.
pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
        )
        .await
        .expect("response")
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("valid JSON body")
}

/// Start a job and return its id, asserting the 201 response.
pub async fn start_job(app: &Router, target_count: u32) -> JobId {
    let response = post_json(
        app,
        "/api/v1/training-jobs",
        serde_json::json!({
            "character_name": "Mara",
            "character_description": "red-haired pirate captain",
            "target_count": target_count,
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    json["data"]["job_id"]
        .as_str()
        .expect("job_id in response")
        .parse()
        .expect("job_id is a UUID")
}

/// Poll the status endpoint until the job reaches the given status.
///
/// Background drivers run on the test runtime; yielding via `sleep` lets
/// them make progress. Panics if the status is not reached within ~2s.
pub async fn wait_for_status(app: &Router, job_id: JobId, status: &str) -> serde_json::Value {
    for _ in 0..200 {
        let response = get(app, &format!("/api/v1/training-jobs/{job_id}")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        if json["data"]["status"] == status {
            return json["data"].clone();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} never reached status {status}");
}
