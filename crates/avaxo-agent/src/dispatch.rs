//! Command dispatcher
//!
//! Consumes the agent's command queue for as long as the bus stays up and
//! hands every decoded command to its own task, so a slow or hung forward
//! never holds up the next command.
//!
//! Commands are auto-acknowledged: they count as delivered the moment they
//! arrive, and a command whose handler dies is lost.

use std::convert::Infallible;
use std::sync::Arc;

use futures::StreamExt;
use thiserror::Error;

use avaxo_core::{BusChannel, BusConnection, Transport, TransportError};
use avaxo_protocol::{decode, AgentSettings, Command, CommandMessage};

use crate::bus::{close_channel, close_connection};
use crate::forward::ForwardEngine;
use crate::heartbeat::respond_heartbeat;
use crate::spawner::TaskSpawner;

/// Reasons the command loop stopped
#[derive(Debug, Error)]
pub enum ListenError {
    /// The bus failed
    #[error("Transport error while listening for commands: {0}")]
    Transport(#[from] TransportError),

    /// The command stream ended
    #[error("Command stream ended")]
    StreamEnded,
}

/// Listens for commands addressed to this agent
#[derive(Debug, Clone)]
pub struct CommandListener {
    /// Settings obtained by the handshake, shared read-only with handlers
    settings: Arc<AgentSettings>,
    /// Opens relays for forward commands
    engine: ForwardEngine,
    /// Launches per-command handler tasks
    spawner: TaskSpawner,
}

impl CommandListener {
    /// Create a new command listener
    pub fn new(settings: Arc<AgentSettings>, engine: ForwardEngine, spawner: TaskSpawner) -> Self {
        Self {
            settings,
            engine,
            spawner,
        }
    }

    /// Settings this listener was built with
    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    /// Consume the command queue until the bus drops.
    ///
    /// Never returns `Ok`; the error tells the caller why listening stopped
    /// so it can reconnect.
    pub async fn listen<T: Transport>(
        &self,
        transport: &T,
        broker_url: &str,
    ) -> Result<Infallible, ListenError> {
        let connection = Arc::new(transport.dial(broker_url).await?);
        let result = self.listen_on_connection(&connection).await;
        close_connection(connection.as_ref()).await;
        result
    }

    async fn listen_on_connection<C: BusConnection>(
        &self,
        connection: &Arc<C>,
    ) -> Result<Infallible, ListenError> {
        let channel = connection.open_channel().await?;
        let result = self.consume(&channel, connection).await;
        close_channel(&channel).await;
        result
    }

    async fn consume<C: BusConnection>(
        &self,
        channel: &C::Channel,
        connection: &Arc<C>,
    ) -> Result<Infallible, ListenError> {
        let mut deliveries = channel.consume(&self.settings.command_queue, true).await?;
        tracing::info!("Listening for commands on {}", self.settings.command_queue);

        let dispatcher = Dispatcher {
            connection: Arc::clone(connection),
            settings: Arc::clone(&self.settings),
            engine: self.engine.clone(),
            spawner: self.spawner.clone(),
        };
        while let Some(delivery) = deliveries.next().await {
            dispatcher.dispatch(&delivery?);
        }

        Err(ListenError::StreamEnded)
    }
}

/// Routes decoded commands to their handlers
struct Dispatcher<C> {
    connection: Arc<C>,
    settings: Arc<AgentSettings>,
    engine: ForwardEngine,
    spawner: TaskSpawner,
}

impl<C: BusConnection> Dispatcher<C> {
    /// Decode one message and launch its handler without waiting for it
    fn dispatch(&self, body: &[u8]) {
        let command = match decode::<CommandMessage>(body) {
            Ok(message) => message.into_command(),
            Err(e) => {
                tracing::warn!("Dropping malformed command: {}", e);
                return;
            }
        };

        match command {
            Some(Command::StatusProbe) => {
                let connection = Arc::clone(&self.connection);
                let settings = Arc::clone(&self.settings);
                self.spawner
                    .spawn(tracing::info_span!("heartbeat"), async move {
                        if let Err(e) = respond_heartbeat(connection.as_ref(), &settings).await {
                            tracing::warn!("Heartbeat not sent: {}", e);
                        }
                    });
            }
            Some(Command::Forward(request)) => self.engine.start(request),
            None => tracing::debug!("Ignoring message without a command"),
        }
    }
}
