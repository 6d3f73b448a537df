//! Message types for the Avaxo control protocol
//!
//! All payloads travel as JSON bodies on the message bus.
//!
//! # Message Flow
//!
//! 1. Agent declares a private reply queue and publishes a [`Greeting`] to
//!    [`GREETINGS_QUEUE`] naming it
//! 2. Control plane answers on the reply queue with [`AgentSettings`]
//! 3. Control plane publishes commands on `AgentSettings::command_queue`
//! 4. A status probe is answered with a [`Heartbeat`] on
//!    `AgentSettings::heartbeat_queue`
//! 5. A forward command asks the agent to splice two TCP endpoints together

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::agent_id::AgentId;

/// Well-known queue the control plane reads greetings from
pub const GREETINGS_QUEUE: &str = "avaxo.greetings";

/// Greeting sent by the agent to request its settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Greeting {
    /// Agent display name
    pub from: String,
    /// Reply queue the settings must be published to
    pub callback_queue: String,
}

/// Per-agent settings assigned by the control plane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSettings {
    /// Identifier of this agent
    pub id: AgentId,
    /// Queue the agent consumes commands from
    pub command_queue: String,
    /// Queue the agent publishes heartbeats to
    pub heartbeat_queue: String,
}

/// Liveness message published in response to a status probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Heartbeat {
    /// Identifier of the responding agent
    pub agent_id: AgentId,
}

/// A TCP endpoint named in a forward command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Hostname or IP address
    pub host: String,
    /// Port as sent by the control plane (a signed 32-bit integer)
    pub port: i32,
}

impl Endpoint {
    /// Create a new endpoint
    pub fn new(host: impl Into<String>, port: i32) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// The port as a TCP port number, if it is in range
    pub fn tcp_port(&self) -> Option<u16> {
        u16::try_from(self.port).ok().filter(|port| *port != 0)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Request to relay traffic between a target and a manager endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardRequest {
    /// Endpoint the agent relays traffic to
    pub target: Endpoint,
    /// Endpoint of the party driving the relay
    pub manager: Endpoint,
}

/// Raw command document as it arrives on the command queue.
///
/// Both fields are optional on the wire; use [`CommandMessage::into_command`]
/// to resolve which command, if any, the message carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandMessage {
    /// Status probe marker; any non-empty value asks for a heartbeat
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Forward request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward: Option<ForwardRequest>,
}

/// A decoded command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Liveness probe, answered with a heartbeat
    StatusProbe,
    /// Open a relay between two endpoints
    Forward(ForwardRequest),
}

impl CommandMessage {
    /// Resolve the command carried by this message.
    ///
    /// A non-empty status takes precedence over a forward request. Returns
    /// `None` when the message carries neither.
    pub fn into_command(self) -> Option<Command> {
        match (self.status, self.forward) {
            (Some(status), _) if !status.is_empty() => Some(Command::StatusProbe),
            (_, Some(forward)) => Some(Command::Forward(forward)),
            _ => None,
        }
    }
}

impl From<Command> for CommandMessage {
    fn from(command: Command) -> Self {
        match command {
            Command::StatusProbe => Self {
                status: Some("alive".to_string()),
                forward: None,
            },
            Command::Forward(forward) => Self {
                status: None,
                forward: Some(forward),
            },
        }
    }
}
