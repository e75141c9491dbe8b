// Event codec: JSON serialization with a typed error.
//
// Translates between `Event` values and the byte payload carried inside a
// frame (`framing.rs`). The two failure modes are kept distinct: `Encode`
// means a value could not be serialized, a programming defect, and the
// caller drops the event; `MalformedPayload` means received bytes do not
// decode to a known event, and the caller tears down the connection.

use thiserror::Error;

use crate::event::Event;

/// Errors from `encode` / `decode`.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The event could not be serialized.
    #[error("event not encodable: {0}")]
    Encode(serde_json::Error),
    /// The bytes do not correspond to a known event variant, or are
    /// truncated.
    #[error("malformed event payload: {0}")]
    MalformedPayload(serde_json::Error),
}

/// Serialize an event to its wire payload.
pub fn encode(event: &Event) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(event).map_err(CodecError::Encode)
}

/// Recover an event from a wire payload.
pub fn decode(bytes: &[u8]) -> Result<Event, CodecError> {
    serde_json::from_slice(bytes).map_err(CodecError::MalformedPayload)
}
