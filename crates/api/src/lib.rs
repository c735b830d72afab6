//! `envio-api` — HTTP intake service for résumé submissions.
//!
//! Accepts multipart submissions on `POST /submit`, materializes the
//! uploaded résumé under the upload directory, and publishes a
//! [`SubmissionTask`](envio_core::SubmissionTask) to the durable
//! submission queue — fire-and-forget, the caller only ever learns
//! "enqueued". `GET /status` exposes a read-only view over the audit
//! record file the logger maintains.

use std::time::Duration;

use axum::http::HeaderName;
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

pub mod config;
pub mod error;
pub mod producer;
pub mod routes;
pub mod state;

use state::AppState;

/// Build the full application router with the production middleware
/// stack. Shared between `main` and the integration tests so both
/// exercise the same request-id, tracing, timeout, and panic-recovery
/// layers.
pub fn app(state: AppState) -> Router {
    let request_id_header = HeaderName::from_static("x-request-id");
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    Router::new()
        .merge(routes::health::router())
        .merge(routes::api_routes())
        .layer(CatchPanicLayer::new())
        // Times out with 408 Request Timeout.
        .layer(TimeoutLayer::new(timeout))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .with_state(state)
}
