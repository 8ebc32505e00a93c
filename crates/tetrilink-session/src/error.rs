//! Error types for the session layer.

use tetrilink_transport::TransportError;

/// Errors returned by session operations.
///
/// Link failures during a running session are not errors: they end the
/// session and reach the disconnect handler as a
/// [`DisconnectReason`](crate::DisconnectReason).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Opening or starting the underlying connection failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The session was already disconnected (or released) when the
    /// operation ran.
    #[error("session already disconnected")]
    Closed,

    /// `start()` was called on a session that is already running.
    #[error("session already started")]
    AlreadyStarted,
}
