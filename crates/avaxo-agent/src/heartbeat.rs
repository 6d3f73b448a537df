//! Heartbeat responder

use thiserror::Error;

use avaxo_core::{BusChannel, BusConnection, Publish, TransportError};
use avaxo_protocol::{encode, AgentSettings, Heartbeat, ProtocolError};

use crate::bus::close_channel;

/// Errors from answering a status probe
///
/// A missed heartbeat is not fatal; callers log these and carry on.
#[derive(Debug, Error)]
pub enum HeartbeatError {
    /// Channel could not be opened or the publish failed
    #[error("Failed to publish heartbeat: {0}")]
    Transport(#[from] TransportError),

    /// Heartbeat could not be serialized
    #[error("Failed to encode heartbeat: {0}")]
    Encode(#[source] ProtocolError),
}

/// Publish one heartbeat identifying this agent to its heartbeat queue.
///
/// Opens a dedicated channel on `connection` and closes it afterwards, so
/// concurrent responders never share a channel.
pub async fn respond_heartbeat<C: BusConnection>(
    connection: &C,
    settings: &AgentSettings,
) -> Result<(), HeartbeatError> {
    let channel = connection.open_channel().await?;
    let result = publish_heartbeat(&channel, settings).await;
    close_channel(&channel).await;
    result
}

async fn publish_heartbeat<C: BusChannel>(
    channel: &C,
    settings: &AgentSettings,
) -> Result<(), HeartbeatError> {
    let heartbeat = Heartbeat {
        agent_id: settings.id,
    };
    let body = encode(&heartbeat).map_err(HeartbeatError::Encode)?;
    channel
        .publish(Publish::json_to_queue(&settings.heartbeat_queue, &body))
        .await?;
    tracing::debug!("Heartbeat sent to {}", settings.heartbeat_queue);
    Ok(())
}
