//! Error types for the match layer.

use tetrilink_session::DisconnectReason;

/// Errors returned by match operations.
///
/// Malformed messages received during a match are not errors of any
/// operation: they are logged and dropped where they arrive. Encoding
/// failures on outgoing events surface as
/// [`ProtocolError`](tetrilink_protocol::ProtocolError) from the event
/// channel itself.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    /// The session ended before the operation could finish.
    #[error("session disconnected: {0}")]
    Disconnected(DisconnectReason),

    /// `start()` was called on a match that is already running.
    #[error("match already started")]
    AlreadyStarted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnected_names_the_reason() {
        let err = MatchError::Disconnected(DisconnectReason::HeartbeatTimeout);
        assert_eq!(err.to_string(), "session disconnected: heartbeat timeout");
    }

    #[test]
    fn test_already_started_message() {
        assert_eq!(MatchError::AlreadyStarted.to_string(), "match already started");
    }
}
