//! Protocol error types

use thiserror::Error;

/// Errors that can occur while encoding or decoding wire payloads
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Payload could not be serialized
    #[error("Failed to encode payload: {0}")]
    Encode(#[source] serde_json::Error),

    /// Payload was not valid JSON or had the wrong shape
    #[error("Failed to decode payload: {0}")]
    Decode(#[source] serde_json::Error),
}
