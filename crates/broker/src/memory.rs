//! In-process broker with AMQP-like delivery semantics.
//!
//! [`MemoryBroker`] backs the test suites and brokerless local demos. It
//! models the parts of the broker contract the pipeline depends on:
//! durable named queues, per-message ack/nack, delayed requeue with the
//! redelivered flag set, and per-consumer prefetch limits.
//!
//! Queue state is shared between cloned handles; [`Broker::close`] only
//! invalidates the handle it is called on, mirroring one connection
//! closing while the broker itself keeps running.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use crate::adapter::{Broker, BrokerError, ConnectBroker, Consumer, Delivery, Disposition};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct QueuedMessage {
    tag: u64,
    body: Vec<u8>,
    redelivered: bool,
}

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<QueuedMessage>,
    unacked: HashMap<u64, QueuedMessage>,
    /// Total publishes ever routed to this queue.
    publishes: u64,
}

#[derive(Debug, Default)]
struct Shared {
    queues: Mutex<HashMap<String, QueueState>>,
    notify: Notify,
    next_tag: AtomicU64,
}

// ---------------------------------------------------------------------------
// MemoryBroker
// ---------------------------------------------------------------------------

/// In-process broker handle.
///
/// Cloning yields a new "connection" over the same queues.
#[derive(Debug)]
pub struct MemoryBroker {
    shared: Arc<Shared>,
    closed: Arc<AtomicBool>,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MemoryBroker {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl MemoryBroker {
    /// Create an empty broker with no queues.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    fn check_open(&self) -> Result<(), BrokerError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrokerError::Connection("connection closed".to_string()));
        }
        Ok(())
    }

    /// Number of messages currently ready for delivery on a queue.
    pub async fn queued_len(&self, queue: &str) -> usize {
        let queues = self.shared.queues.lock().await;
        queues.get(queue).map(|q| q.ready.len()).unwrap_or(0)
    }

    /// Bodies of the messages currently ready on a queue, in order.
    pub async fn queued(&self, queue: &str) -> Vec<Vec<u8>> {
        let queues = self.shared.queues.lock().await;
        queues
            .get(queue)
            .map(|q| q.ready.iter().map(|m| m.body.clone()).collect())
            .unwrap_or_default()
    }

    /// Number of deliveries handed out but not yet settled on a queue.
    pub async fn unacked_len(&self, queue: &str) -> usize {
        let queues = self.shared.queues.lock().await;
        queues.get(queue).map(|q| q.unacked.len()).unwrap_or(0)
    }

    /// Total publishes ever routed to a queue.
    pub async fn publish_count(&self, queue: &str) -> u64 {
        let queues = self.shared.queues.lock().await;
        queues.get(queue).map(|q| q.publishes).unwrap_or(0)
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn declare_queue(&self, queue: &str) -> Result<(), BrokerError> {
        self.check_open()?;
        let mut queues = self.shared.queues.lock().await;
        queues.entry(queue.to_string()).or_default();
        Ok(())
    }

    async fn publish(&self, queue: &str, body: &[u8]) -> Result<(), BrokerError> {
        self.check_open()?;
        let tag = self.shared.next_tag.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut queues = self.shared.queues.lock().await;
            let state = queues.entry(queue.to_string()).or_default();
            state.ready.push_back(QueuedMessage {
                tag,
                body: body.to_vec(),
                redelivered: false,
            });
            state.publishes += 1;
        }
        self.shared.notify.notify_waiters();
        Ok(())
    }

    async fn consume(
        &self,
        queue: &str,
        prefetch: u16,
    ) -> Result<Box<dyn Consumer>, BrokerError> {
        self.check_open()?;
        Ok(Box::new(MemoryConsumer {
            shared: Arc::clone(&self.shared),
            closed: Arc::clone(&self.closed),
            queue: queue.to_string(),
            prefetch: prefetch.max(1) as usize,
            in_flight: 0,
        }))
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.closed.store(true, Ordering::SeqCst);
        self.shared.notify.notify_waiters();
        Ok(())
    }
}

#[async_trait]
impl ConnectBroker for MemoryBroker {
    async fn connect(&self) -> Result<Box<dyn Broker>, BrokerError> {
        Ok(Box::new(self.clone()))
    }
}

// ---------------------------------------------------------------------------
// MemoryConsumer
// ---------------------------------------------------------------------------

struct MemoryConsumer {
    shared: Arc<Shared>,
    closed: Arc<AtomicBool>,
    queue: String,
    prefetch: usize,
    in_flight: usize,
}

impl MemoryConsumer {
    async fn try_take(&mut self) -> Option<Delivery> {
        if self.in_flight >= self.prefetch {
            return None;
        }
        let mut queues = self.shared.queues.lock().await;
        let state = queues.get_mut(&self.queue)?;
        let msg = state.ready.pop_front()?;
        let delivery = Delivery {
            tag: msg.tag,
            body: msg.body.clone(),
            redelivered: msg.redelivered,
        };
        state.unacked.insert(msg.tag, msg);
        self.in_flight += 1;
        Some(delivery)
    }
}

#[async_trait]
impl Consumer for MemoryConsumer {
    async fn next_delivery(&mut self) -> Option<Result<Delivery, BrokerError>> {
        loop {
            // Register for wakeups before checking state, so a publish
            // landing between the check and the await is not missed.
            let shared = Arc::clone(&self.shared);
            let notified = shared.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.closed.load(Ordering::SeqCst) {
                return None;
            }
            if let Some(delivery) = self.try_take().await {
                return Some(Ok(delivery));
            }
            notified.await;
        }
    }

    async fn settle(
        &mut self,
        delivery: &Delivery,
        disposition: Disposition,
    ) -> Result<(), BrokerError> {
        if let Disposition::Requeue { delay } = disposition {
            tokio::time::sleep(delay).await;
        }

        let mut queues = self.shared.queues.lock().await;
        let state = queues
            .get_mut(&self.queue)
            .ok_or_else(|| BrokerError::Consume(format!("unknown queue '{}'", self.queue)))?;
        let mut msg = state
            .unacked
            .remove(&delivery.tag)
            .ok_or_else(|| BrokerError::Consume(format!("unknown delivery tag {}", delivery.tag)))?;
        self.in_flight = self.in_flight.saturating_sub(1);

        match disposition {
            Disposition::Ack | Disposition::Discard => {}
            Disposition::Requeue { .. } => {
                msg.redelivered = true;
                state.ready.push_front(msg);
                drop(queues);
                self.shared.notify.notify_waiters();
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
