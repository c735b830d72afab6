//! Broker and consumer traits with explicit per-message settlement.

use std::time::Duration;

use async_trait::async_trait;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for broker operations.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// Connection or channel-level failure.
    #[error("Broker connection error: {0}")]
    Connection(String),

    /// A publish was not accepted by the broker.
    #[error("Publish to '{queue}' failed: {reason}")]
    Publish { queue: String, reason: String },

    /// Consume or settlement failure on an open channel.
    #[error("Consume error: {0}")]
    Consume(String),
}

// ---------------------------------------------------------------------------
// Disposition
// ---------------------------------------------------------------------------

/// Outcome of handling one delivery, returned to the queue adapter.
///
/// Handlers decide; the adapter settles. This keeps ack/nack out of the
/// processing code entirely, so the same handler runs unchanged against
/// the AMQP binding and the in-memory broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Permanently remove the message from the queue.
    Ack,
    /// Redeliver to any available consumer after the given delay.
    Requeue {
        /// How long the adapter waits before issuing the requeue.
        delay: Duration,
    },
    /// Reject without requeue; the broker drops the message for good.
    Discard,
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

/// One message handed to a consumer.
///
/// The `tag` identifies the message to the consumer that produced it and
/// has no meaning anywhere else.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Settlement tag, scoped to the producing consumer.
    pub tag: u64,
    /// Raw message payload.
    pub body: Vec<u8>,
    /// True when the broker has delivered this message before.
    pub redelivered: bool,
}

// ---------------------------------------------------------------------------
// Broker / Consumer traits
// ---------------------------------------------------------------------------

/// A connection to the durable message broker.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Declare a durable queue. Safe to repeat (declare-if-absent).
    async fn declare_queue(&self, queue: &str) -> Result<(), BrokerError>;

    /// Publish a message with the persistent-delivery flag set, so it
    /// survives a broker restart once routed to a durable queue.
    async fn publish(&self, queue: &str, body: &[u8]) -> Result<(), BrokerError>;

    /// Start consuming from a queue with at most `prefetch`
    /// unacknowledged messages in flight.
    async fn consume(&self, queue: &str, prefetch: u16)
        -> Result<Box<dyn Consumer>, BrokerError>;

    /// Close the underlying connection. Any unsettled delivery is
    /// considered failed by the broker and will be redelivered.
    async fn close(&self) -> Result<(), BrokerError>;
}

/// A lazy, infinite sequence of deliveries from one queue.
///
/// The sequence is non-restartable: once
/// [`next_delivery`](Consumer::next_delivery) returns `None` the
/// connection is gone and the owner must reconnect and consume anew.
#[async_trait]
pub trait Consumer: Send {
    /// Wait for the next delivery. `None` means the connection is gone.
    async fn next_delivery(&mut self) -> Option<Result<Delivery, BrokerError>>;

    /// Settle a delivery according to the handler's decision.
    ///
    /// `Requeue` waits out its delay before the negative-acknowledge is
    /// issued, mirroring the delayed-redelivery behaviour the pipeline
    /// relies on for retry pacing.
    async fn settle(
        &mut self,
        delivery: &Delivery,
        disposition: Disposition,
    ) -> Result<(), BrokerError>;
}

/// Opens a fresh broker connection per fire-and-forget publish.
///
/// The intake producer connects, publishes, and closes per request; this
/// seam lets tests swap the AMQP connector for an in-memory broker.
#[async_trait]
pub trait ConnectBroker: Send + Sync {
    /// Open a new connection to the broker.
    async fn connect(&self) -> Result<Box<dyn Broker>, BrokerError>;
}
