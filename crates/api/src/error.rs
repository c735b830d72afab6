use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use envio_broker::BrokerError;
use envio_core::error::CoreError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and [`BrokerError`] for broker
/// failures. Implements [`IntoResponse`] to produce consistent JSON
/// error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `envio_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A broker connection or publish failure.
    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::InvalidSubmission(msg) => (
                    StatusCode::BAD_REQUEST,
                    "INVALID_SUBMISSION",
                    msg.clone(),
                ),
                CoreError::ConfigurationMissing(name) => {
                    tracing::error!(setting = name, "Mandatory configuration missing");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "CONFIGURATION_MISSING",
                        format!("Server configuration missing: {name}"),
                    )
                }
                CoreError::Store(e) => {
                    tracing::error!(error = %e, "Audit store error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            // --- Broker errors ---
            AppError::Broker(e) => {
                tracing::error!(error = %e, "Broker error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "BROKER_UNAVAILABLE",
                    "Could not reach the message broker".to_string(),
                )
            }

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
