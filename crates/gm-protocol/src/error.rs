//! Protocol error types

use thiserror::Error;

/// Errors raised while turning an inbound text frame into an [`InboundFrame`].
///
/// A decode error never reaches the status store: the connection loop logs it
/// and drops the frame.
///
/// [`InboundFrame`]: crate::message::InboundFrame
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Frame is not valid JSON
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// Frame is JSON but not an object
    #[error("Frame is not a JSON object")]
    NotAnObject,

    /// Frame has no string `tp` discriminator
    #[error("Frame has no `tp` field")]
    MissingType,

    /// A known frame type carried a field of the wrong shape or range
    #[error("Invalid `{tp}` frame: {source}")]
    InvalidFields {
        tp: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors that can occur during protocol operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Inbound frame could not be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Outbound command has an unknown tag, a missing field, or an
    /// out-of-range value. This is a local programming defect.
    #[error("Malformed command: {0}")]
    MalformedCommand(String),

    /// Value outside the range of a wire enum
    #[error("Invalid {field}: {value}")]
    OutOfRange { field: &'static str, value: u8 },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
