//! Error types for the protocol layer.
//!
//! Every variant here is a *recoverable* error: callers log it and drop
//! the offending line. Nothing in this enum should ever tear down a
//! session, since the next snapshot is never more than one tick away.

/// Errors that can occur while encoding or decoding wire payloads.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into payload text).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, missing fields, wrong types.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The payload parsed but breaks a protocol rule, e.g. a ragged board
    /// grid or an attack row whose columns disagree on the width.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The line carries a prefix this decoder does not handle.
    #[error("unknown prefix in line {0:?}")]
    UnknownPrefix(String),
}
