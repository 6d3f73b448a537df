//! Dialing both ends of a relay

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpStream;

use avaxo_protocol::{Endpoint, ForwardRequest};

use super::relay::{Relay, RelayHandle};
use crate::spawner::TaskSpawner;

/// Which end of a relay an endpoint is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The endpoint traffic is relayed to
    Target,
    /// The endpoint driving the relay
    Manager,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Target => write!(f, "target"),
            Role::Manager => write!(f, "manager"),
        }
    }
}

/// Errors that abort a forward before any traffic flows
#[derive(Debug, Error)]
pub enum ForwardError {
    /// Endpoint does not name a usable TCP port
    #[error("Invalid {role} endpoint {endpoint}")]
    InvalidEndpoint { role: Role, endpoint: Endpoint },

    /// Dial was refused or failed
    #[error("Can't connect to {role} {address}: {source}")]
    ConnectFailed {
        role: Role,
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Dial did not complete in time
    #[error("Timed out connecting to {role} {address} after {timeout:?}")]
    ConnectTimeout {
        role: Role,
        address: String,
        timeout: Duration,
    },
}

impl ForwardError {
    /// The end of the relay that failed
    pub fn role(&self) -> Role {
        match self {
            ForwardError::InvalidEndpoint { role, .. }
            | ForwardError::ConnectFailed { role, .. }
            | ForwardError::ConnectTimeout { role, .. } => *role,
        }
    }
}

/// Opens relays for forward commands
#[derive(Debug, Clone)]
pub struct ForwardEngine {
    /// Timeout applied to each dial
    connect_timeout: Duration,
    /// Launches the relay's copy tasks
    spawner: TaskSpawner,
}

impl ForwardEngine {
    /// Create a new forwarding engine
    pub fn new(connect_timeout: Duration, spawner: TaskSpawner) -> Self {
        Self {
            connect_timeout,
            spawner,
        }
    }

    /// Open a relay in the background and return immediately.
    ///
    /// Failures are logged; nothing is reported back to the caller.
    pub fn start(&self, request: ForwardRequest) {
        let engine = self.clone();
        let span = tracing::info_span!(
            "forward",
            target_addr = %request.target,
            manager_addr = %request.manager
        );
        self.spawner.spawn(span, async move {
            if let Err(e) = engine.forward(request).await {
                tracing::warn!("Forward aborted: {}", e);
            }
        });
    }

    /// Dial the target, then the manager, and splice them together.
    ///
    /// If the target dial fails the manager is never dialed. If the manager
    /// dial fails, or its port is unusable, the target connection is closed
    /// and no copy task starts.
    /// On success the relay is already running when this returns; dropping
    /// the handle detaches it.
    pub async fn forward(&self, request: ForwardRequest) -> Result<RelayHandle, ForwardError> {
        tracing::info!(
            "Start forwarding {} <-> {}",
            request.manager,
            request.target
        );
        let target = self.dial(Role::Target, &request.target).await?;
        let manager = match self.dial(Role::Manager, &request.manager).await {
            Ok(manager) => manager,
            Err(e) => {
                drop(target);
                return Err(e);
            }
        };

        Ok(Relay::new(target, manager).splice(&self.spawner))
    }

    async fn dial(&self, role: Role, endpoint: &Endpoint) -> Result<TcpStream, ForwardError> {
        let port = tcp_port(role, endpoint)?;
        let connect = TcpStream::connect((endpoint.host.as_str(), port));
        match tokio::time::timeout(self.connect_timeout, connect).await {
            Ok(Ok(stream)) => {
                tracing::debug!("Connected to {} {}", role, endpoint);
                Ok(stream)
            }
            Ok(Err(source)) => Err(ForwardError::ConnectFailed {
                role,
                address: endpoint.to_string(),
                source,
            }),
            Err(_) => Err(ForwardError::ConnectTimeout {
                role,
                address: endpoint.to_string(),
                timeout: self.connect_timeout,
            }),
        }
    }
}

fn tcp_port(role: Role, endpoint: &Endpoint) -> Result<u16, ForwardError> {
    endpoint
        .tcp_port()
        .ok_or_else(|| ForwardError::InvalidEndpoint {
            role,
            endpoint: endpoint.clone(),
        })
}
