//! Message-bus abstraction
//!
//! The agent only needs a small slice of a broker's surface: dial, open
//! channels, declare a queue, publish, and consume. Everything above this
//! module is written against these traits so the production AMQP client and
//! the in-memory bus used by tests are interchangeable.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use avaxo_protocol::CONTENT_TYPE;

use crate::error::TransportError;

/// Bodies of delivered messages, in delivery order.
///
/// The stream is infinite until the channel or connection it was consumed
/// from closes, and cannot be restarted once it ends.
pub type Deliveries = BoxStream<'static, Result<Bytes, TransportError>>;

/// Properties of a declared queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueOptions {
    /// Survive broker restarts
    pub durable: bool,
    /// Usable only by the declaring connection
    pub exclusive: bool,
    /// Deleted once its last consumer goes away
    pub auto_delete: bool,
}

impl QueueOptions {
    /// Private, short-lived queue for replies addressed to this connection
    pub fn reply_queue() -> Self {
        Self {
            durable: false,
            exclusive: true,
            auto_delete: true,
        }
    }
}

/// An outgoing message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Publish<'a> {
    /// Exchange to publish to; empty for the default exchange
    pub exchange: &'a str,
    /// Routing key, which is the queue name on the default exchange
    pub routing_key: &'a str,
    /// Fail instead of silently dropping the message when it cannot be routed
    pub mandatory: bool,
    /// MIME type of `body`
    pub content_type: &'a str,
    /// Message body
    pub body: &'a [u8],
}

impl<'a> Publish<'a> {
    /// Mandatory, non-persistent JSON message sent straight to `queue`
    pub fn json_to_queue(queue: &'a str, body: &'a [u8]) -> Self {
        Self {
            exchange: "",
            routing_key: queue,
            mandatory: true,
            content_type: CONTENT_TYPE,
            body,
        }
    }
}

/// Entry point to a broker
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connection type produced by this transport
    type Connection: BusConnection;

    /// Open a connection to the broker at `url`
    async fn dial(&self, url: &str) -> Result<Self::Connection, TransportError>;
}

/// A live broker connection
///
/// Shared by reference between concurrent tasks; each task that needs to
/// publish opens its own channel.
#[async_trait]
pub trait BusConnection: Send + Sync + 'static {
    /// Channel type opened on this connection
    type Channel: BusChannel;

    /// Open a new channel
    async fn open_channel(&self) -> Result<Self::Channel, TransportError>;

    /// Close the connection and every channel on it
    async fn close(&self) -> Result<(), TransportError>;
}

/// A channel on a broker connection
///
/// Not assumed safe for concurrent publishing; do not share across tasks.
#[async_trait]
pub trait BusChannel: Send + Sync {
    /// Declare a queue and return its name.
    ///
    /// An empty `name` asks the broker to generate one.
    async fn declare_queue(
        &self,
        name: &str,
        options: QueueOptions,
    ) -> Result<String, TransportError>;

    /// Publish a message
    async fn publish(&self, message: Publish<'_>) -> Result<(), TransportError>;

    /// Start consuming `queue`.
    ///
    /// With `auto_ack` every message counts as delivered the moment it is
    /// received.
    async fn consume(&self, queue: &str, auto_ack: bool) -> Result<Deliveries, TransportError>;

    /// Close the channel
    async fn close(&self) -> Result<(), TransportError>;
}
