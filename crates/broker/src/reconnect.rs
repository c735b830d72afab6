//! Fixed-delay reconnection for the long-lived consumer processes.
//!
//! The worker and logger share one connection lifecycle:
//!
//! ```text
//! Disconnected → Connecting → Connected → (Errored | Closed) → Connecting …
//! ```
//!
//! On any failure the component waits out the policy delay and connects
//! again from scratch, re-declaring its queues (declare-if-absent is safe
//! to repeat). Messages left unacknowledged at disconnect time are
//! redelivered by the broker to whichever consumer reconnects first —
//! that redelivery is the pipeline's only crash-recovery mechanism.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::adapter::BrokerError;

// ---------------------------------------------------------------------------
// ConnectionState
// ---------------------------------------------------------------------------

/// Lifecycle state of a component's broker connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection and no attempt in progress.
    Disconnected,
    /// A connection attempt is in flight (or the last one failed).
    Connecting,
    /// Connected and consuming.
    Connected,
    /// An established connection failed.
    Errored,
    /// An established connection closed unexpectedly.
    Closed,
}

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// Delays applied between reconnection attempts.
///
/// Fixed values today; the policy is constructor-injected so a component
/// can swap in different pacing without touching its run loop.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay after an established connection errors or closes.
    pub transient_delay: Duration,
    /// Delay after a connection attempt fails outright.
    pub startup_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            transient_delay: Duration::from_secs(5),
            startup_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait before leaving the given failed state.
    pub fn delay_for(&self, state: ConnectionState) -> Duration {
        match state {
            ConnectionState::Errored | ConnectionState::Closed => self.transient_delay,
            _ => self.startup_delay,
        }
    }
}

// ---------------------------------------------------------------------------
// supervise
// ---------------------------------------------------------------------------

/// Drive `connect → session → delay` forever, until `cancel` fires.
///
/// `connect` opens a fresh broker connection; `session` consumes on it
/// until the connection dies (returning `Ok` when the delivery stream
/// ends, `Err` on a connection-level failure). The function never returns
/// under normal operation.
pub async fn supervise<Conn, ConnFut, B, Sess, SessFut>(
    mut connect: Conn,
    mut session: Sess,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) where
    Conn: FnMut() -> ConnFut,
    ConnFut: Future<Output = Result<B, BrokerError>>,
    Sess: FnMut(B) -> SessFut,
    SessFut: Future<Output = Result<(), BrokerError>>,
{
    loop {
        if cancel.is_cancelled() {
            return;
        }

        let mut state = ConnectionState::Connecting;
        tracing::info!("Connecting to broker");

        match connect().await {
            Ok(broker) => {
                state = ConnectionState::Connected;
                tracing::info!("Broker connected");

                match session(broker).await {
                    Ok(()) => {
                        if cancel.is_cancelled() {
                            return;
                        }
                        state = ConnectionState::Closed;
                        tracing::warn!("Broker session closed, reconnecting");
                    }
                    Err(e) => {
                        state = ConnectionState::Errored;
                        tracing::error!(error = %e, "Broker session failed, reconnecting");
                    }
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Broker connection failed");
            }
        }

        let delay = policy.delay_for(state);
        tracing::info!(delay_secs = delay.as_secs(), "Waiting before reconnect");
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_failures_use_the_short_delay() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.delay_for(ConnectionState::Errored),
            Duration::from_secs(5)
        );
        assert_eq!(
            policy.delay_for(ConnectionState::Closed),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn startup_failures_use_the_long_delay() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.delay_for(ConnectionState::Connecting),
            Duration::from_secs(10)
        );
        assert_eq!(
            policy.delay_for(ConnectionState::Disconnected),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn custom_delays_are_respected() {
        let policy = RetryPolicy {
            transient_delay: Duration::from_millis(100),
            startup_delay: Duration::from_millis(200),
        };
        assert_eq!(
            policy.delay_for(ConnectionState::Errored),
            Duration::from_millis(100)
        );
        assert_eq!(
            policy.delay_for(ConnectionState::Connecting),
            Duration::from_millis(200)
        );
    }

    #[tokio::test]
    async fn supervise_stops_when_cancelled_before_connect() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut attempts = 0u32;
        supervise(
            || {
                attempts += 1;
                async { Ok(()) }
            },
            |_unit| async { Ok(()) },
            &RetryPolicy::default(),
            &cancel,
        )
        .await;

        assert_eq!(attempts, 0, "no connection attempt after cancellation");
    }

    #[tokio::test]
    async fn supervise_reconnects_after_session_end() {
        let cancel = CancellationToken::new();
        let policy = RetryPolicy {
            transient_delay: Duration::from_millis(1),
            startup_delay: Duration::from_millis(1),
        };

        let mut sessions = 0u32;
        let cancel_clone = cancel.clone();
        supervise(
            || async { Ok(()) },
            |_unit| {
                sessions += 1;
                if sessions >= 3 {
                    cancel_clone.cancel();
                }
                async { Ok(()) }
            },
            &policy,
            &cancel,
        )
        .await;

        assert_eq!(sessions, 3);
    }
}
