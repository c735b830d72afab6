//! Queue-adapter abstraction over the durable message broker.
//!
//! Every process in the pipeline talks to the broker through the
//! [`Broker`] and [`Consumer`] traits: declare-if-absent durable queues,
//! persistent publishes, and per-message settlement where the handler's
//! decision is an explicit [`Disposition`] value rather than a
//! side-effecting callback.
//!
//! Two implementations are provided:
//!
//! - [`AmqpBroker`] — the production RabbitMQ binding (`lapin`).
//! - [`MemoryBroker`] — an in-process broker with the same ack/nack and
//!   redelivery semantics, used by the test suites and brokerless demos.
//!
//! [`supervise`] drives the shared connect → session → reconnect
//! lifecycle used by the worker and logger processes.

pub mod adapter;
pub mod amqp;
pub mod config;
pub mod memory;
pub mod reconnect;

pub use adapter::{Broker, BrokerError, ConnectBroker, Consumer, Delivery, Disposition};
pub use amqp::{AmqpBroker, AmqpConnector};
pub use config::BrokerConfig;
pub use memory::MemoryBroker;
pub use reconnect::{supervise, ConnectionState, RetryPolicy};
