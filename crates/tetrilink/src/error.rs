//! Unified error type for Tetrilink.

use tetrilink_match::MatchError;
use tetrilink_protocol::ProtocolError;
use tetrilink_session::{Role, SessionError};
use tetrilink_transport::TransportError;

/// Top-level error that wraps every crate-specific error, so users of the
/// `tetrilink` crate deal with one type and `?` converts the rest.
#[derive(Debug, thiserror::Error)]
pub enum TetrilinkError {
    /// Binding, connecting or accepting failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A payload could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    /// The handshake failed or the match ended early.
    #[error(transparent)]
    Match(#[from] MatchError),

    /// The builder was not given a local board.
    #[error("no board source configured")]
    MissingBoard,

    /// A host builder was asked to connect, or a joining one to bind.
    #[error("operation needs a {expected:?} builder")]
    WrongRole { expected: Role },
}
