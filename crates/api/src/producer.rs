//! Intake producer: validates submissions and publishes them to the
//! durable submission queue.

use std::path::Path;
use std::time::Duration;

use envio_broker::ConnectBroker;
use envio_core::error::CoreError;
use envio_core::store::{self, AuditStore};
use envio_core::types::{queues, SubmissionTask};

use crate::error::AppError;

/// Grace window between a publish and the background close of the
/// fire-and-forget connection, letting the publish flush without
/// blocking the caller.
pub const CLOSE_GRACE: Duration = Duration::from_millis(500);

/// Validate and enqueue one submission.
///
/// The attachment must already be materialized at the task's recorded
/// path; a missing file rejects the submission and nothing is published.
/// A successful return means "enqueued", never "delivered" — the worker
/// owns everything from here, including the attachment file.
pub async fn submit(connector: &dyn ConnectBroker, task: &SubmissionTask) -> Result<(), AppError> {
    if !Path::new(&task.attachment_path).is_file() {
        return Err(CoreError::InvalidSubmission(
            "résumé attachment not found on disk".to_string(),
        )
        .into());
    }

    let broker = connector.connect().await?;
    broker.declare_queue(queues::SUBMISSIONS).await?;

    let body = serde_json::to_vec(task).map_err(|e| AppError::InternalError(e.to_string()))?;
    broker.publish(queues::SUBMISSIONS, &body).await?;

    tracing::info!(
        company = %task.company,
        job_title = %task.job_title,
        "Submission enqueued",
    );

    tokio::spawn(async move {
        tokio::time::sleep(CLOSE_GRACE).await;
        if let Err(e) = broker.close().await {
            tracing::debug!(error = %e, "Producer connection close failed");
        }
    });

    Ok(())
}

/// Ordered audit record lines for the dashboard, or the placeholder when
/// nothing has been recorded yet.
pub fn query_status(store: &AuditStore) -> Result<Vec<String>, AppError> {
    let lines = store.read_lines().map_err(AppError::from)?;
    if lines.is_empty() {
        Ok(vec![store::PLACEHOLDER.to_string()])
    } else {
        Ok(lines)
    }
}
