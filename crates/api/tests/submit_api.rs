//! Integration tests for the submission endpoint.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use common::{body_json, multipart_body, post_multipart};

use envio_broker::{Broker, BrokerError, ConnectBroker, MemoryBroker};
use envio_core::types::{queues, SubmissionTask, DEFAULT_CANDIDATE};

/// Connector that always fails, simulating an unreachable broker.
struct UnreachableConnector;

#[async_trait]
impl ConnectBroker for UnreachableConnector {
    async fn connect(&self) -> Result<Box<dyn Broker>, BrokerError> {
        Err(BrokerError::Connection("connection refused".to_string()))
    }
}

fn standard_fields() -> Vec<(&'static str, &'static str)> {
    vec![("nome", "Acme"), ("email", "a@a.com"), ("vaga", "Dev")]
}

// ---------------------------------------------------------------------------
// Test: valid submission publishes exactly one lossless task
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_with_attachment_enqueues_exactly_one_task() {
    let dir = tempfile::tempdir().unwrap();
    let broker = MemoryBroker::new();
    let app = common::build_test_app(
        Some(Arc::new(broker.clone())),
        dir.path().join("relatorio_envios.txt"),
        dir.path().join("uploads"),
    );

    let body = multipart_body(&standard_fields(), Some(("cv.txt", b"resume contents")));
    let response = post_multipart(app, "/submit", body).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "enqueued");

    assert_eq!(broker.publish_count(queues::SUBMISSIONS).await, 1);

    let published = broker.queued(queues::SUBMISSIONS).await;
    let task: SubmissionTask = serde_json::from_slice(&published[0]).unwrap();
    assert_eq!(task.company, "Acme");
    assert_eq!(task.email, "a@a.com");
    assert_eq!(task.job_title, "Dev");
    assert_eq!(task.candidate, DEFAULT_CANDIDATE);
    assert_eq!(task.attachment_name, "cv.txt");

    // The attachment was materialized at the recorded path and is left
    // in place for the worker.
    let saved = std::fs::read(&task.attachment_path).unwrap();
    assert_eq!(saved, b"resume contents");
}

// ---------------------------------------------------------------------------
// Test: candidate name is forwarded when provided
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_forwards_the_candidate_name() {
    let dir = tempfile::tempdir().unwrap();
    let broker = MemoryBroker::new();
    let app = common::build_test_app(
        Some(Arc::new(broker.clone())),
        dir.path().join("relatorio_envios.txt"),
        dir.path().join("uploads"),
    );

    let mut fields = standard_fields();
    fields.push(("candidato", "Maria Silva"));
    let body = multipart_body(&fields, Some(("cv.pdf", b"%PDF-")));
    let response = post_multipart(app, "/submit", body).await;

    assert_eq!(response.status(), StatusCode::OK);

    let published = broker.queued(queues::SUBMISSIONS).await;
    let task: SubmissionTask = serde_json::from_slice(&published[0]).unwrap();
    assert_eq!(task.candidate, "Maria Silva");
}

// ---------------------------------------------------------------------------
// Test: missing file -> 400 and zero publishes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_without_file_is_rejected_with_400() {
    let dir = tempfile::tempdir().unwrap();
    let broker = MemoryBroker::new();
    let app = common::build_test_app(
        Some(Arc::new(broker.clone())),
        dir.path().join("relatorio_envios.txt"),
        dir.path().join("uploads"),
    );

    let body = multipart_body(&standard_fields(), None);
    let response = post_multipart(app, "/submit", body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "INVALID_SUBMISSION");

    assert_eq!(broker.publish_count(queues::SUBMISSIONS).await, 0);
}

// ---------------------------------------------------------------------------
// Test: missing broker configuration -> 500
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_without_broker_config_is_a_server_error() {
    let dir = tempfile::tempdir().unwrap();
    let app = common::build_test_app(
        None,
        dir.path().join("relatorio_envios.txt"),
        dir.path().join("uploads"),
    );

    let body = multipart_body(&standard_fields(), Some(("cv.txt", b"resume")));
    let response = post_multipart(app, "/submit", body).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["code"], "CONFIGURATION_MISSING");
}

// ---------------------------------------------------------------------------
// Test: unreachable broker -> 500, surfaced, not retried
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_with_unreachable_broker_is_a_server_error() {
    let dir = tempfile::tempdir().unwrap();
    let app = common::build_test_app(
        Some(Arc::new(UnreachableConnector)),
        dir.path().join("relatorio_envios.txt"),
        dir.path().join("uploads"),
    );

    let body = multipart_body(&standard_fields(), Some(("cv.txt", b"resume")));
    let response = post_multipart(app, "/submit", body).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["code"], "BROKER_UNAVAILABLE");
}
