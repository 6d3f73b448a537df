//! JSON codec for message bodies

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ProtocolError;

/// Content type attached to every payload the agent publishes
pub const CONTENT_TYPE: &str = "application/json";

/// Serialize a payload into a message body
pub fn encode<T: Serialize>(payload: &T) -> Result<Vec<u8>, ProtocolError> {
    serde_json::to_vec(payload).map_err(ProtocolError::Encode)
}

/// Deserialize a message body into a payload
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ProtocolError> {
    serde_json::from_slice(body).map_err(ProtocolError::Decode)
}
