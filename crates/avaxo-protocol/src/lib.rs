//! avaxo-protocol: Wire payloads for the Avaxo agent
//!
//! Every message exchanged with the control plane over the message bus is a
//! JSON document. This crate defines those documents and the codec used to
//! move them in and out of message bodies.

pub mod agent_id;
pub mod codec;
pub mod error;
pub mod message;

pub use agent_id::AgentId;
pub use codec::{decode, encode, CONTENT_TYPE};
pub use error::ProtocolError;
pub use message::{
    AgentSettings, Command, CommandMessage, Endpoint, ForwardRequest, Greeting, Heartbeat,
    GREETINGS_QUEUE,
};
