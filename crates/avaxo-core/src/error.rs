//! Core error types for the Avaxo agent

use std::path::PathBuf;
use thiserror::Error;

/// Message-bus errors
///
/// Every failure of the bus itself surfaces as one of these and is returned to
/// the immediate caller; nothing inside the agent retries them.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection to the broker could not be established
    #[error("Failed to connect to broker: {0}")]
    Connect(String),

    /// Channel could not be opened or failed
    #[error("Channel error: {0}")]
    Channel(String),

    /// Queue declaration failed
    #[error("Failed to declare queue: {0}")]
    Declare(String),

    /// Publish could not be handed to the broker
    #[error("Failed to publish to {routing_key}: {message}")]
    Publish {
        routing_key: String,
        message: String,
    },

    /// Mandatory publish had no queue to route to
    #[error("Message to {routing_key} was unroutable")]
    Unroutable { routing_key: String },

    /// Broker negatively acknowledged a publish
    #[error("Broker rejected message to {routing_key}")]
    Rejected { routing_key: String },

    /// Consumer could not be started or failed mid-stream
    #[error("Consumer error: {0}")]
    Consume(String),

    /// Delivery stream ended because the channel or connection closed
    #[error("Delivery stream closed")]
    StreamClosed,
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
}
