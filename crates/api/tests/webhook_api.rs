//! Integration tests for webhook delivery: up-front submission plus the
//! inbound callback endpoint.
//!
//! Callbacks are replayed against the real router exactly as the provider
//! would deliver them — including duplicates, out-of-order arrival, and
//! non-terminal events.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use common::{body_json, get, post_json, start_job, ScriptedGenerator};

use atelier_api::config::DeliveryMode;
use atelier_core::types::JobId;
use atelier_store::{JobStore, MemoryJobStore};

/// Wait until the up-front submission pass has registered all predictions.
async fn wait_for_submissions(store: &MemoryJobStore, job_id: JobId, count: usize) {
    for _ in 0..200 {
        let job = store.get(job_id).await.unwrap().expect("job exists");
        if job.submitted.len() == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} never registered {count} submissions");
}

/// Deliver one provider callback for `(job_id, attempt_index)`.
async fn deliver(
    app: &axum::Router,
    job_id: JobId,
    attempt_index: u32,
    body: serde_json::Value,
) -> axum::response::Response {
    post_json(
        app,
        &format!("/api/v1/webhooks/replicate?job_id={job_id}&attempt_index={attempt_index}"),
        body,
    )
    .await
}

fn succeeded(attempt_index: u32) -> serde_json::Value {
    serde_json::json!({
        "id": format!("pred-{attempt_index}"),
        "status": "succeeded",
        "output": [format!("https://images.test/img-{attempt_index:02}.jpg")],
    })
}

fn failed(attempt_index: u32) -> serde_json::Value {
    serde_json::json!({
        "id": format!("pred-{attempt_index}"),
        "status": "failed",
        "error": "NSFW content detected",
    })
}

// ---------------------------------------------------------------------------
// Test: starting a job submits one prediction per requested image
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_submits_all_attempts_up_front() {
    let (app, store) = common::build_test_app(
        DeliveryMode::Webhook,
        Arc::new(ScriptedGenerator::always_failing()),
    );

    let job_id = start_job(&app, 3).await;
    wait_for_submissions(&store, job_id, 3).await;

    let job = store.get(job_id).await.unwrap().expect("job exists");
    let indices: Vec<u32> = job.submitted.iter().map(|s| s.attempt_index).collect();
    assert_eq!(indices, vec![1, 2, 3]);
    // No outcome has arrived yet.
    assert_eq!(job.current_attempt, 0);
}

// ---------------------------------------------------------------------------
// Test: callbacks update counters and finalize once all have reported
// ---------------------------------------------------------------------------

#[tokio::test]
async fn callbacks_drive_the_job_to_completion() {
    let (app, store) = common::build_test_app(
        DeliveryMode::Webhook,
        Arc::new(ScriptedGenerator::always_failing()),
    );

    let job_id = start_job(&app, 3).await;
    wait_for_submissions(&store, job_id, 3).await;

    let response = deliver(&app, job_id, 1, succeeded(1)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["applied"], true);
    assert_eq!(json["data"]["status"], "processing");

    let response = deliver(&app, job_id, 2, failed(2)).await;
    assert_eq!(response.status(), StatusCode::OK);

    // Two of three reported: still processing.
    let status = body_json(get(&app, &format!("/api/v1/training-jobs/{job_id}")).await).await;
    assert_eq!(status["data"]["current_attempt"], 2);
    assert_eq!(status["data"]["completed_count"], 1);
    assert_eq!(status["data"]["status"], "processing");

    // The last outstanding attempt settles the job even though the target
    // was missed — partial delivery still finalizes as completed.
    let response = deliver(&app, job_id, 3, failed(3)).await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "completed");

    let status = body_json(get(&app, &format!("/api/v1/training-jobs/{job_id}")).await).await;
    assert_eq!(status["data"]["status"], "completed");
    assert_eq!(status["data"]["completed_count"], 1);
    assert_eq!(status["data"]["current_attempt"], 3);
    assert_eq!(
        status["data"]["result_urls"],
        serde_json::json!(["https://images.test/img-01.jpg"])
    );
}

// ---------------------------------------------------------------------------
// Test: duplicate deliveries are acknowledged but change nothing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn duplicate_callback_is_idempotent() {
    let (app, store) = common::build_test_app(
        DeliveryMode::Webhook,
        Arc::new(ScriptedGenerator::always_failing()),
    );

    let job_id = start_job(&app, 3).await;
    wait_for_submissions(&store, job_id, 3).await;

    let first = deliver(&app, job_id, 1, succeeded(1)).await;
    assert_eq!(body_json(first).await["data"]["applied"], true);

    let second = deliver(&app, job_id, 1, succeeded(1)).await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(body_json(second).await["data"]["applied"], false);

    let job = store.get(job_id).await.unwrap().expect("job exists");
    assert_eq!(job.completed_count, 1);
    assert_eq!(job.current_attempt, 1);
    assert_eq!(job.result_urls.len(), 1);
}

// ---------------------------------------------------------------------------
// Test: out-of-order delivery is accepted
// ---------------------------------------------------------------------------

#[tokio::test]
async fn out_of_order_callbacks_are_accepted() {
    let (app, store) = common::build_test_app(
        DeliveryMode::Webhook,
        Arc::new(ScriptedGenerator::always_failing()),
    );

    let job_id = start_job(&app, 3).await;
    wait_for_submissions(&store, job_id, 3).await;

    deliver(&app, job_id, 3, succeeded(3)).await;
    deliver(&app, job_id, 1, succeeded(1)).await;

    let job = store.get(job_id).await.unwrap().expect("job exists");
    assert_eq!(job.completed_count, 2);
    assert_eq!(job.current_attempt, 2);
}

// ---------------------------------------------------------------------------
// Test: early target hit finalizes before stragglers report
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reaching_the_target_finalizes_immediately() {
    let (app, store) = common::build_test_app(
        DeliveryMode::Webhook,
        Arc::new(ScriptedGenerator::always_failing()),
    );

    // target_count 1, but webhook submission still tags attempt 1 only.
    let job_id = start_job(&app, 1).await;
    wait_for_submissions(&store, job_id, 1).await;

    let response = deliver(&app, job_id, 1, succeeded(1)).await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "completed");

    // A straggling duplicate after finalization is still safe.
    let response = deliver(&app, job_id, 1, succeeded(1)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let job = store.get(job_id).await.unwrap().expect("job exists");
    assert_eq!(job.completed_count, 1);
}

// ---------------------------------------------------------------------------
// Test: non-terminal events are acknowledged without recording an attempt
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_events_do_not_consume_attempts() {
    let (app, store) = common::build_test_app(
        DeliveryMode::Webhook,
        Arc::new(ScriptedGenerator::always_failing()),
    );

    let job_id = start_job(&app, 2).await;
    wait_for_submissions(&store, job_id, 2).await;

    let response = deliver(
        &app,
        job_id,
        1,
        serde_json::json!({ "id": "pred-1", "status": "starting" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["applied"], false);

    let job = store.get(job_id).await.unwrap().expect("job exists");
    assert_eq!(job.current_attempt, 0);
}

// ---------------------------------------------------------------------------
// Test: callbacks for unknown jobs or unsubmitted attempts are rejected
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_job_or_attempt_is_rejected() {
    let (app, store) = common::build_test_app(
        DeliveryMode::Webhook,
        Arc::new(ScriptedGenerator::always_failing()),
    );

    let response = deliver(&app, uuid::Uuid::new_v4(), 1, succeeded(1)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let job_id = start_job(&app, 2).await;
    wait_for_submissions(&store, job_id, 2).await;

    let response = deliver(&app, job_id, 9, succeeded(9)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "BAD_REQUEST");

    let job = store.get(job_id).await.unwrap().expect("job exists");
    assert_eq!(job.current_attempt, 0);
}
