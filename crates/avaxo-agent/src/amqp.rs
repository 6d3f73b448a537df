//! AMQP 0-9-1 transport backed by `lapin`
//!
//! Every channel is put in publisher-confirm mode so that a mandatory publish
//! the broker cannot route comes back as [`TransportError::Unroutable`]
//! instead of disappearing.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use lapin::options::{
    BasicConsumeOptions, BasicPublishOptions, ConfirmSelectOptions, QueueDeclareOptions,
};
use lapin::publisher_confirm::Confirmation;
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};

use avaxo_core::{
    BusChannel, BusConnection, Deliveries, Publish, QueueOptions, Transport, TransportError,
};

/// AMQP reply code for a normal close
const REPLY_SUCCESS: u16 = 200;

/// Dials AMQP brokers
#[derive(Debug, Clone, Default)]
pub struct AmqpTransport {
    /// Name reported to the broker in the connection properties
    connection_name: Option<String>,
}

impl AmqpTransport {
    /// Create a new AMQP transport
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `name` to the broker as the connection name
    pub fn with_connection_name(mut self, name: impl Into<String>) -> Self {
        self.connection_name = Some(name.into());
        self
    }
}

#[async_trait]
impl Transport for AmqpTransport {
    type Connection = AmqpConnection;

    async fn dial(&self, url: &str) -> Result<Self::Connection, TransportError> {
        let mut properties = ConnectionProperties::default();
        if let Some(name) = &self.connection_name {
            properties = properties.with_connection_name(name.clone().into());
        }

        let inner = Connection::connect(url, properties)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        tracing::debug!("Connected to broker");
        Ok(AmqpConnection { inner })
    }
}

/// A live AMQP connection
pub struct AmqpConnection {
    inner: Connection,
}

#[async_trait]
impl BusConnection for AmqpConnection {
    type Channel = AmqpChannel;

    async fn open_channel(&self) -> Result<Self::Channel, TransportError> {
        let inner = self
            .inner
            .create_channel()
            .await
            .map_err(|e| TransportError::Channel(e.to_string()))?;
        inner
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| TransportError::Channel(e.to_string()))?;
        Ok(AmqpChannel { inner })
    }

    async fn close(&self) -> Result<(), TransportError> {
        if !self.inner.status().connected() {
            return Ok(());
        }
        self.inner
            .close(REPLY_SUCCESS, "agent closing connection")
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))
    }
}

/// A channel on an AMQP connection
pub struct AmqpChannel {
    inner: Channel,
}

#[async_trait]
impl BusChannel for AmqpChannel {
    async fn declare_queue(
        &self,
        name: &str,
        options: QueueOptions,
    ) -> Result<String, TransportError> {
        let declare = QueueDeclareOptions {
            durable: options.durable,
            exclusive: options.exclusive,
            auto_delete: options.auto_delete,
            ..QueueDeclareOptions::default()
        };
        let queue = self
            .inner
            .queue_declare(name, declare, FieldTable::default())
            .await
            .map_err(|e| TransportError::Declare(e.to_string()))?;
        Ok(queue.name().as_str().to_string())
    }

    async fn publish(&self, message: Publish<'_>) -> Result<(), TransportError> {
        let publish_error = |e: lapin::Error| TransportError::Publish {
            routing_key: message.routing_key.to_string(),
            message: e.to_string(),
        };
        let options = BasicPublishOptions {
            mandatory: message.mandatory,
            ..BasicPublishOptions::default()
        };
        let properties =
            BasicProperties::default().with_content_type(message.content_type.to_string().into());

        let confirm = self
            .inner
            .basic_publish(
                message.exchange,
                message.routing_key,
                options,
                message.body,
                properties,
            )
            .await
            .map_err(publish_error)?
            .await
            .map_err(publish_error)?;

        match confirm {
            Confirmation::Ack(None) | Confirmation::NotRequested => Ok(()),
            Confirmation::Ack(Some(_)) | Confirmation::Nack(Some(_)) => {
                Err(TransportError::Unroutable {
                    routing_key: message.routing_key.to_string(),
                })
            }
            Confirmation::Nack(None) => Err(TransportError::Rejected {
                routing_key: message.routing_key.to_string(),
            }),
        }
    }

    async fn consume(&self, queue: &str, auto_ack: bool) -> Result<Deliveries, TransportError> {
        let options = BasicConsumeOptions {
            no_ack: auto_ack,
            ..BasicConsumeOptions::default()
        };
        let consumer_tag = format!("avaxo-agent-{}", std::process::id());
        let consumer = self
            .inner
            .basic_consume(queue, &consumer_tag, options, FieldTable::default())
            .await
            .map_err(|e| TransportError::Consume(e.to_string()))?;

        Ok(consumer
            .map(|delivery| {
                delivery
                    .map(|delivery| Bytes::from(delivery.data))
                    .map_err(|e| TransportError::Consume(e.to_string()))
            })
            .boxed())
    }

    async fn close(&self) -> Result<(), TransportError> {
        if !self.inner.status().connected() {
            return Ok(());
        }
        self.inner
            .close(REPLY_SUCCESS, "agent closing channel")
            .await
            .map_err(|e| TransportError::Channel(e.to_string()))
    }
}
