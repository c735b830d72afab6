//! RabbitMQ binding for the queue-adapter traits, built on `lapin`.

use async_trait::async_trait;
use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
    QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};

use crate::adapter::{Broker, BrokerError, ConnectBroker, Consumer, Delivery, Disposition};
use crate::config::BrokerConfig;

/// AMQP persistent-delivery mode (survives a broker restart).
const DELIVERY_MODE_PERSISTENT: u8 = 2;

// ---------------------------------------------------------------------------
// AmqpBroker
// ---------------------------------------------------------------------------

/// One AMQP connection with a single channel.
///
/// Each pipeline process holds exactly one of these at a time; the intake
/// producer additionally opens a short-lived one per submission.
pub struct AmqpBroker {
    connection: Connection,
    channel: Channel,
}

impl AmqpBroker {
    /// Open a connection and channel to the broker named by `config`.
    pub async fn connect(config: &BrokerConfig) -> Result<Self, BrokerError> {
        let connection = Connection::connect(&config.url, ConnectionProperties::default())
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;
        Ok(Self {
            connection,
            channel,
        })
    }
}

#[async_trait]
impl Broker for AmqpBroker {
    async fn declare_queue(&self, queue: &str) -> Result<(), BrokerError> {
        self.channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn publish(&self, queue: &str, body: &[u8]) -> Result<(), BrokerError> {
        self.channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                body,
                BasicProperties::default().with_delivery_mode(DELIVERY_MODE_PERSISTENT),
            )
            .await
            .map_err(|e| BrokerError::Publish {
                queue: queue.to_string(),
                reason: e.to_string(),
            })?
            .await
            .map_err(|e| BrokerError::Publish {
                queue: queue.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn consume(
        &self,
        queue: &str,
        prefetch: u16,
    ) -> Result<Box<dyn Consumer>, BrokerError> {
        self.channel
            .basic_qos(prefetch, BasicQosOptions::default())
            .await
            .map_err(|e| BrokerError::Consume(e.to_string()))?;

        let inner = self
            .channel
            .basic_consume(
                queue,
                "",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::Consume(e.to_string()))?;

        Ok(Box::new(AmqpConsumer {
            inner,
            pending: Vec::new(),
        }))
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.connection
            .close(200, "client shutdown")
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// AmqpConsumer
// ---------------------------------------------------------------------------

/// Consumer over a lapin delivery stream.
struct AmqpConsumer {
    inner: lapin::Consumer,
    /// Deliveries handed out but not yet settled, keyed by delivery tag.
    /// With prefetch = 1 this holds at most one entry.
    pending: Vec<(u64, lapin::acker::Acker)>,
}

#[async_trait]
impl Consumer for AmqpConsumer {
    async fn next_delivery(&mut self) -> Option<Result<Delivery, BrokerError>> {
        match self.inner.next().await? {
            Ok(delivery) => {
                let out = Delivery {
                    tag: delivery.delivery_tag,
                    body: delivery.data,
                    redelivered: delivery.redelivered,
                };
                self.pending.push((delivery.delivery_tag, delivery.acker));
                Some(Ok(out))
            }
            Err(e) => Some(Err(BrokerError::Consume(e.to_string()))),
        }
    }

    async fn settle(
        &mut self,
        delivery: &Delivery,
        disposition: Disposition,
    ) -> Result<(), BrokerError> {
        let idx = self
            .pending
            .iter()
            .position(|(tag, _)| *tag == delivery.tag)
            .ok_or_else(|| {
                BrokerError::Consume(format!("unknown delivery tag {}", delivery.tag))
            })?;
        let (_, acker) = self.pending.remove(idx);

        let result = match disposition {
            Disposition::Ack => acker.ack(BasicAckOptions::default()).await,
            Disposition::Requeue { delay } => {
                tokio::time::sleep(delay).await;
                acker
                    .nack(BasicNackOptions {
                        requeue: true,
                        ..Default::default()
                    })
                    .await
            }
            Disposition::Discard => {
                acker
                    .nack(BasicNackOptions {
                        requeue: false,
                        ..Default::default()
                    })
                    .await
            }
        };
        result.map_err(|e| BrokerError::Consume(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// AmqpConnector
// ---------------------------------------------------------------------------

/// Opens AMQP connections on demand for the intake producer.
pub struct AmqpConnector {
    config: BrokerConfig,
}

impl AmqpConnector {
    /// Create a connector for the given broker configuration.
    pub fn new(config: BrokerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ConnectBroker for AmqpConnector {
    async fn connect(&self) -> Result<Box<dyn Broker>, BrokerError> {
        Ok(Box::new(AmqpBroker::connect(&self.config).await?))
    }
}
