//! Audit event consumption and persistence.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use envio_broker::{supervise, AmqpBroker, Broker, BrokerConfig, BrokerError, Disposition, RetryPolicy};
use envio_core::store::AuditStore;
use envio_core::types::{queues, AuditEvent};

/// Decide the fate of one audit event delivery.
///
/// A malformed event is discarded permanently — it can never parse on
/// retry. A well-formed event is appended and flushed durably *before*
/// the `Ack` is returned; a crash in between makes the broker redeliver
/// and the line is appended again (duplicates are accepted, never
/// deduplicated). A store I/O failure leaves the event unacknowledged
/// and requeues it after `retry_delay`.
pub fn handle_event(store: &AuditStore, body: &[u8], retry_delay: Duration) -> Disposition {
    let event: AuditEvent = match serde_json::from_slice(body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "Discarding malformed audit event");
            return Disposition::Discard;
        }
    };

    match store.append_line(&event.log_line()) {
        Ok(()) => {
            tracing::info!(company = %event.company, status = %event.status, "Audit record written");
            Disposition::Ack
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to append audit record");
            Disposition::Requeue { delay: retry_delay }
        }
    }
}

/// Consume audit events on one broker connection until it dies.
pub async fn run_session(
    broker: &dyn Broker,
    store: &AuditStore,
    retry_delay: Duration,
    cancel: &CancellationToken,
) -> Result<(), BrokerError> {
    broker.declare_queue(queues::AUDIT).await?;

    let mut consumer = broker.consume(queues::AUDIT, 1).await?;

    tracing::info!(path = %store.path().display(), "Logger ready, waiting for audit events");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            next = consumer.next_delivery() => match next {
                Some(Ok(delivery)) => {
                    let disposition = handle_event(store, &delivery.body, retry_delay);
                    consumer.settle(&delivery, disposition).await?;
                }
                Some(Err(e)) => return Err(e),
                None => return Ok(()),
            }
        }
    }
}

/// Run the audit logger until `cancel` fires, reconnecting with the
/// policy's fixed delays whenever the broker connection drops.
pub async fn run(
    config: BrokerConfig,
    store: AuditStore,
    policy: RetryPolicy,
    cancel: CancellationToken,
) {
    let retry_delay = policy.transient_delay;
    let session_cancel = cancel.clone();
    supervise(
        || AmqpBroker::connect(&config),
        move |broker| {
            let store = store.clone();
            let cancel = session_cancel.clone();
            async move { run_session(&broker, &store, retry_delay, &cancel).await }
        },
        &policy,
        &cancel,
    )
    .await;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use envio_core::types::STATUS_SENT;

    fn temp_store() -> (tempfile::TempDir, AuditStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = AuditStore::new(dir.path().join("relatorio_envios.txt"));
        (dir, store)
    }

    fn sample_event() -> AuditEvent {
        AuditEvent {
            company: "Acme".to_string(),
            job_title: Some("Dev".to_string()),
            status: STATUS_SENT.to_string(),
            timestamp: "05/08/2026, 14:30:00".to_string(),
        }
    }

    #[test]
    fn well_formed_event_appends_one_line_and_acks() {
        let (_dir, store) = temp_store();
        let body = serde_json::to_vec(&sample_event()).unwrap();

        let disposition = handle_event(&store, &body, Duration::from_millis(5));

        assert_eq!(disposition, Disposition::Ack);
        let lines = store.read_lines().unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0], sample_event().log_line());
    }

    #[test]
    fn malformed_event_is_discarded_and_writes_nothing() {
        let (_dir, store) = temp_store();

        let disposition = handle_event(&store, b"{ not json", Duration::from_millis(5));

        assert_eq!(disposition, Disposition::Discard);
        assert!(store.read_lines().unwrap().is_empty());
    }

    #[test]
    fn redelivered_event_appends_a_duplicate_line() {
        let (_dir, store) = temp_store();
        let body = serde_json::to_vec(&sample_event()).unwrap();

        handle_event(&store, &body, Duration::from_millis(5));
        handle_event(&store, &body, Duration::from_millis(5));

        assert_eq!(store.read_lines().unwrap().len(), 2);
    }

    #[test]
    fn line_count_never_decreases() {
        let (_dir, store) = temp_store();
        let body = serde_json::to_vec(&sample_event()).unwrap();

        let mut previous = 0;
        for _ in 0..3 {
            handle_event(&store, &body, Duration::from_millis(5));
            let count = store.read_lines().unwrap().len();
            assert!(count > previous);
            previous = count;
        }
        handle_event(&store, b"garbage", Duration::from_millis(5));
        assert_eq!(store.read_lines().unwrap().len(), previous);
    }
}
