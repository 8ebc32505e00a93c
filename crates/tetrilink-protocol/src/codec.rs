//! Codec trait and implementations for payload text.
//!
//! Structured payloads (snapshots, attack rows) travel as single-line text
//! after their prefix. The [`Codec`] trait hides how that text is produced
//! so the rest of the stack only deals in Rust values.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes values into single-line payload text and back.
///
/// Implementations must never emit a newline: the transport frames lines
/// on `\n` and would split the payload.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into payload text.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value cannot be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError>;

    /// Parses payload text back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the text is malformed or does not
    /// match the expected shape.
    fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses compact JSON (via `serde_json`).
///
/// `serde_json::to_string` never inserts newlines (string contents are
/// escaped), so the output is always safe to put on one line.
///
/// ## Example
///
/// ```rust
/// use tetrilink_protocol::{AttackBlockPacket, Codec, JsonCodec};
///
/// let codec = JsonCodec;
/// let row = AttackBlockPacket::new(
///     vec![true, false, true],
///     vec![1, 0, 2],
///     vec![0, 0, 0],
/// ).unwrap();
///
/// let text = codec.encode(&row).unwrap();
/// assert!(!text.contains('\n'));
/// let back: AttackBlockPacket = codec.decode(&text).unwrap();
/// assert_eq!(row, back);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::GameStateSnapshot;

    #[test]
    fn test_encode_snapshot_is_single_line() {
        let snapshot = GameStateSnapshot::empty(10, 20);
        let text = JsonCodec.encode(&snapshot).unwrap();
        assert!(!text.contains('\n'));
    }

    #[test]
    fn test_decode_garbage_returns_decode_error() {
        let result: Result<GameStateSnapshot, _> = JsonCodec.decode("{not json");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_decode_missing_fields_returns_decode_error() {
        let result: Result<GameStateSnapshot, _> = JsonCodec.decode("{\"score\":3}");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
