//! Route table for the API.
//!
//! ```text
//! /health                                      service health (root level)
//!
//! /api/v1/training-jobs                        start, list (POST, GET)
//! /api/v1/training-jobs/{id}                   progress snapshot (GET)
//! /api/v1/webhooks/replicate                   provider callback (POST)
//! ```

pub mod health;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{training_jobs, webhooks};
use crate::state::AppState;

/// Routes mounted under `/api/v1`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/training-jobs",
            post(training_jobs::start_training_job).get(training_jobs::list_training_jobs),
        )
        .route("/training-jobs/{id}", get(training_jobs::get_training_job))
        .route("/webhooks/replicate", post(webhooks::replicate_callback))
}
