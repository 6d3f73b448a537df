//! avaxo-agent: Remotely controlled TCP relay agent
//!
//! The agent greets its control plane over a message bus, receives its
//! settings, then serves commands from its command queue: status probes are
//! answered with heartbeats and forward commands open TCP relays between a
//! target and a manager endpoint.

pub mod amqp;
pub mod dispatch;
pub mod forward;
pub mod handshake;
pub mod heartbeat;
pub mod reconnect;
pub mod spawner;

mod bus;

pub use amqp::AmqpTransport;
pub use dispatch::{CommandListener, ListenError};
pub use forward::{ForwardEngine, ForwardError, RelayHandle};
pub use handshake::{obtain_settings, HandshakeError};
pub use heartbeat::{respond_heartbeat, HeartbeatError};
pub use reconnect::ExponentialBackoff;
pub use spawner::TaskSpawner;
