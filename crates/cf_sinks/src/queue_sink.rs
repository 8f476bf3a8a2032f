//! Queue Publisher (AMQP) — spec.md §4.5.
//!
//! Connect-on-construction: opens the AMQP connection, creates one channel,
//! declares the queue durable. Failure here is fatal for the Processor.

use cf_protocol::QueueType;
use lapin::options::{BasicPublishOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};

use crate::error::{SinkError, SinkResult};

const CONTENT_TYPE_JSON: &str = "application/json";
const DELIVERY_MODE_PERSISTENT: u8 = 2;

pub struct QueueSink {
    connection: Connection,
    channel: Channel,
    queue_name: String,
}

impl QueueSink {
    /// Connect, open a channel, and declare `queue_name` durable
    /// (non-exclusive, non-auto-delete). Only `rabbitmq` is implemented;
    /// every other queue type fails fast.
    pub async fn connect(
        queue_type: QueueType,
        broker_uri: &str,
        queue_name: impl Into<String>,
    ) -> SinkResult<Self> {
        if queue_type != QueueType::Rabbitmq {
            return Err(SinkError::NotImplemented(queue_type));
        }
        let queue_name = queue_name.into();

        let connection = Connection::connect(broker_uri, ConnectionProperties::default())
            .await
            .map_err(SinkError::BrokerConnect)?;
        let channel = connection
            .create_channel()
            .await
            .map_err(SinkError::BrokerConnect)?;

        channel
            .queue_declare(
                &queue_name,
                QueueDeclareOptions {
                    durable: true,
                    exclusive: false,
                    auto_delete: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|source| SinkError::QueueDeclare {
                queue: queue_name.clone(),
                source,
            })?;

        Ok(Self {
            connection,
            channel,
            queue_name,
        })
    }

    /// Publish `body` to the default exchange with the queue name as the
    /// routing key, persistent delivery, content type `application/json`.
    pub async fn publish(&self, body: &[u8]) -> SinkResult<()> {
        let properties = BasicProperties::default()
            .with_content_type(CONTENT_TYPE_JSON.into())
            .with_delivery_mode(DELIVERY_MODE_PERSISTENT);

        self.channel
            .basic_publish(
                "",
                &self.queue_name,
                BasicPublishOptions::default(),
                body,
                properties,
            )
            .await
            .map_err(|source| SinkError::Publish {
                queue: self.queue_name.clone(),
                source,
            })?
            .await
            .map_err(|source| SinkError::Publish {
                queue: self.queue_name.clone(),
                source,
            })?;

        Ok(())
    }

    pub async fn close(&self) {
        if let Err(err) = self.channel.close(200, "shutting down").await {
            tracing::warn!(queue = %self.queue_name, error = %err, "failed to close AMQP channel cleanly");
        }
        if let Err(err) = self.connection.close(200, "shutting down").await {
            tracing::warn!(queue = %self.queue_name, error = %err, "failed to close AMQP connection cleanly");
        }
    }
}
