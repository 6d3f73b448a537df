//! Settings handshake
//!
//! The agent greets the control plane on [`GREETINGS_QUEUE`], naming a private
//! reply queue, and waits for exactly one [`AgentSettings`] message on it.
//! One call is one attempt; retrying is the caller's job.

use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;

use avaxo_core::{BusChannel, BusConnection, Publish, QueueOptions, Transport, TransportError};
use avaxo_protocol::{decode, encode, AgentSettings, Greeting, ProtocolError, GREETINGS_QUEUE};

use crate::bus::{close_channel, close_connection};

/// Errors from a single handshake attempt
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// The bus failed while greeting or waiting
    #[error("Transport error during handshake: {0}")]
    Transport(#[from] TransportError),

    /// No settings arrived in time
    #[error("No settings received within {0:?}")]
    Timeout(Duration),

    /// The greeting could not be serialized
    #[error("Failed to encode greeting: {0}")]
    Encode(#[source] ProtocolError),

    /// The reply was not a valid settings document
    #[error("Invalid settings reply: {0}")]
    Decode(#[source] ProtocolError),
}

/// Obtain this agent's settings from the control plane.
///
/// The connection and channel opened here are closed on every path out of
/// the call, and the reply queue goes away with them.
pub async fn obtain_settings<T: Transport>(
    transport: &T,
    agent_name: &str,
    broker_url: &str,
    reply_timeout: Duration,
) -> Result<AgentSettings, HandshakeError> {
    let connection = transport.dial(broker_url).await?;
    let result = greet_on_connection(&connection, agent_name, reply_timeout).await;
    close_connection(&connection).await;
    result
}

async fn greet_on_connection<C: BusConnection>(
    connection: &C,
    agent_name: &str,
    reply_timeout: Duration,
) -> Result<AgentSettings, HandshakeError> {
    let channel = connection.open_channel().await?;
    let result = greet(&channel, agent_name, reply_timeout).await;
    close_channel(&channel).await;
    result
}

async fn greet<C: BusChannel>(
    channel: &C,
    agent_name: &str,
    reply_timeout: Duration,
) -> Result<AgentSettings, HandshakeError> {
    let callback_queue = channel
        .declare_queue("", QueueOptions::reply_queue())
        .await?;
    tracing::debug!("Declared reply queue {}", callback_queue);

    let greeting = Greeting {
        from: agent_name.to_string(),
        callback_queue: callback_queue.clone(),
    };
    let body = encode(&greeting).map_err(HandshakeError::Encode)?;
    channel
        .publish(Publish::json_to_queue(GREETINGS_QUEUE, &body))
        .await?;
    tracing::debug!("Greeting sent as '{}'", agent_name);

    let mut replies = channel.consume(&callback_queue, true).await?;
    let reply = match tokio::time::timeout(reply_timeout, replies.next()).await {
        Ok(Some(reply)) => reply?,
        Ok(None) => return Err(TransportError::StreamClosed.into()),
        Err(_) => return Err(HandshakeError::Timeout(reply_timeout)),
    };

    let settings: AgentSettings = decode(&reply).map_err(HandshakeError::Decode)?;
    tracing::info!(
        "Settings received: id={} commands={} heartbeats={}",
        settings.id,
        settings.command_queue,
        settings.heartbeat_queue
    );
    Ok(settings)
}
