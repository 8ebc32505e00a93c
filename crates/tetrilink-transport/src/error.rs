/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was already closed when the operation ran.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Connecting to the remote peer failed.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// Binding the listening socket failed.
    #[error("bind failed: {0}")]
    BindFailed(#[source] std::io::Error),

    /// Accepting an incoming connection failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// A receive loop is already running for this connection.
    #[error("receive loop already started for {0}")]
    AlreadyReceiving(crate::ConnectionId),
}
