//! avaxo-core: Core abstractions and configuration for the Avaxo agent
//!
//! This crate provides the message-bus abstraction the agent is written
//! against, the shared error types, and the agent configuration.

pub mod config;
pub mod error;
pub mod traits;

pub use error::{ConfigError, TransportError};
pub use traits::{BusChannel, BusConnection, Deliveries, Publish, QueueOptions, Transport};
