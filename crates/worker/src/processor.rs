//! Per-task processing and the worker's consume loop.
//!
//! [`handle_task`] makes the ack/retry decision for a single delivery
//! and returns it as a [`Disposition`]; [`run_session`] drives one
//! broker connection until it dies; [`run`] wraps the session in the
//! shared reconnect lifecycle.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use envio_broker::{supervise, AmqpBroker, Broker, BrokerConfig, BrokerError, Disposition, RetryPolicy};
use envio_core::types::{queues, AuditEvent, SubmissionTask};

use crate::mailer::{MailTransport, ResumeEmail};

// ---------------------------------------------------------------------------
// RetrySettings
// ---------------------------------------------------------------------------

/// Default delay before a rejected task is requeued.
const DEFAULT_RETRY_DELAY_SECS: u64 = 10;

/// Retry behaviour for rejected sends.
#[derive(Debug, Clone)]
pub struct RetrySettings {
    /// Delay before a rejected task is requeued for redelivery.
    pub retry_delay: Duration,
    /// Maximum send attempts this process makes for one task before
    /// discarding it. `None` retries forever — the default, matching the
    /// pipeline's observed production behaviour. The count is tracked
    /// per-process only; other workers count their own attempts.
    pub retry_limit: Option<u32>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
            retry_limit: None,
        }
    }
}

impl RetrySettings {
    /// Load retry settings from environment variables.
    ///
    /// | Variable           | Required | Default          |
    /// |--------------------|----------|------------------|
    /// | `RETRY_DELAY_SECS` | no       | `10`             |
    /// | `RETRY_LIMIT`      | no       | unlimited        |
    pub fn from_env() -> Self {
        let retry_delay = std::env::var("RETRY_DELAY_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_RETRY_DELAY_SECS));
        let retry_limit = std::env::var("RETRY_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok());
        Self {
            retry_delay,
            retry_limit,
        }
    }
}

// ---------------------------------------------------------------------------
// handle_task
// ---------------------------------------------------------------------------

/// Decide the fate of one submission delivery.
///
/// - Malformed payloads are discarded — a task that cannot deserialize
///   can never succeed on retry.
/// - On a successful send, the audit event publish and the attachment
///   delete are both best-effort: a failure in either is logged and the
///   task is still acknowledged.
/// - On a rejected send, the task is requeued after the configured
///   delay, with no attempt ceiling unless one is configured.
pub async fn handle_task(
    body: &[u8],
    mailer: &dyn MailTransport,
    broker: &dyn Broker,
    settings: &RetrySettings,
    attempts: &mut HashMap<u64, u32>,
) -> Disposition {
    let task: SubmissionTask = match serde_json::from_slice(body) {
        Ok(task) => task,
        Err(e) => {
            tracing::warn!(error = %e, "Discarding malformed submission task");
            return Disposition::Discard;
        }
    };

    match deliver(&task, mailer).await {
        Ok(()) => {
            tracing::info!(
                company = %task.company,
                email = %task.email,
                job_title = %task.job_title,
                "Résumé delivered",
            );

            publish_audit_event(&task, broker).await;
            remove_attachment(&task);

            attempts.remove(&fingerprint(body));
            Disposition::Ack
        }
        Err(e) => {
            tracing::error!(
                company = %task.company,
                email = %task.email,
                error = %e,
                "Send failed, scheduling redelivery",
            );

            let fp = fingerprint(body);
            let count = attempts.entry(fp).or_insert(0);
            *count += 1;

            if let Some(limit) = settings.retry_limit {
                if *count >= limit {
                    tracing::error!(
                        company = %task.company,
                        attempts = *count,
                        "Retry limit reached, discarding task",
                    );
                    attempts.remove(&fp);
                    return Disposition::Discard;
                }
            }

            Disposition::Requeue {
                delay: settings.retry_delay,
            }
        }
    }
}

/// Assemble and send the email for one task.
async fn deliver(task: &SubmissionTask, mailer: &dyn MailTransport) -> Result<(), crate::mailer::MailError> {
    let email = ResumeEmail::for_task(task)?;
    mailer.send(&email).await
}

/// Publish the success audit event. Best-effort: failure is logged and
/// must never block the ack of the original task.
async fn publish_audit_event(task: &SubmissionTask, broker: &dyn Broker) {
    let event = AuditEvent::sent(task);
    let payload = serde_json::to_vec(&event).expect("AuditEvent is always serialisable");

    if let Err(e) = broker.publish(queues::AUDIT, &payload).await {
        tracing::error!(
            company = %task.company,
            error = %e,
            "Failed to publish audit event",
        );
    }
}

/// Remove the delivered attachment. Best-effort: absence is not an error.
fn remove_attachment(task: &SubmissionTask) {
    match std::fs::remove_file(&task.attachment_path) {
        Ok(()) => tracing::debug!(path = %task.attachment_path, "Attachment removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(
            path = %task.attachment_path,
            error = %e,
            "Failed to remove attachment",
        ),
    }
}

/// Stable per-process key for counting attempts on a task body.
fn fingerprint(body: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    hasher.finish()
}

// ---------------------------------------------------------------------------
// run_session / run
// ---------------------------------------------------------------------------

/// Consume submissions on one broker connection until it dies.
///
/// Declares both pipeline queues (declare-if-absent), caps the channel
/// at one unacknowledged message, and settles every delivery with the
/// disposition [`handle_task`] returns.
pub async fn run_session(
    broker: &dyn Broker,
    mailer: &dyn MailTransport,
    settings: &RetrySettings,
    cancel: &CancellationToken,
) -> Result<(), BrokerError> {
    broker.declare_queue(queues::SUBMISSIONS).await?;
    broker.declare_queue(queues::AUDIT).await?;

    let mut consumer = broker.consume(queues::SUBMISSIONS, 1).await?;
    let mut attempts: HashMap<u64, u32> = HashMap::new();

    tracing::info!("Worker ready, waiting for submissions");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            next = consumer.next_delivery() => match next {
                Some(Ok(delivery)) => {
                    let disposition =
                        handle_task(&delivery.body, mailer, broker, settings, &mut attempts).await;
                    consumer.settle(&delivery, disposition).await?;
                }
                Some(Err(e)) => return Err(e),
                None => return Ok(()),
            }
        }
    }
}

/// Run the delivery worker until `cancel` fires.
///
/// Walks the shared connection lifecycle: connect, consume, and on any
/// connection loss wait out the policy delay and start over. Unsettled
/// deliveries are redelivered by the broker after the reconnect.
pub async fn run(
    config: BrokerConfig,
    mailer: Arc<dyn MailTransport>,
    settings: RetrySettings,
    policy: RetryPolicy,
    cancel: CancellationToken,
) {
    let session_cancel = cancel.clone();
    supervise(
        || AmqpBroker::connect(&config),
        move |broker| {
            let mailer = Arc::clone(&mailer);
            let settings = settings.clone();
            let cancel = session_cancel.clone();
            async move { run_session(&broker, mailer.as_ref(), &settings, &cancel).await }
        },
        &policy,
        &cancel,
    )
    .await;
}
