//! `ClientBuilder`: the entry point for hosting or joining a match.
//!
//! Ties the layers together: transport → session → match.

use std::net::SocketAddr;
use std::sync::Arc;

use tetrilink_match::{
    BoardSink, BoardSource, Match, MatchConfig, MatchObserver, NoopObserver, NoopSink,
};
use tetrilink_session::{Role, Session, SessionConfig};
use tetrilink_transport::LineListener;

use crate::TetrilinkError;

enum Endpoint {
    Host(String),
    Join(String),
}

/// Builder for one side of a match.
///
/// # Example
///
/// ```rust,ignore
/// use tetrilink::prelude::*;
///
/// let lobby = ClientBuilder::host("0.0.0.0:7777")
///     .board(my_board.clone())
///     .observer(my_ui.clone())
///     .bind()
///     .await?;
/// let game = lobby.accept().await?;
/// let mode = game.start(1).await?;
/// ```
pub struct ClientBuilder {
    endpoint: Endpoint,
    session_config: SessionConfig,
    match_config: MatchConfig,
    source: Option<Arc<dyn BoardSource>>,
    sink: Arc<dyn BoardSink>,
    observer: Arc<dyn MatchObserver>,
}

impl ClientBuilder {
    fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            session_config: SessionConfig::default(),
            match_config: MatchConfig::default(),
            source: None,
            sink: Arc::new(NoopSink),
            observer: Arc::new(NoopObserver),
        }
    }

    /// Hosts a match: listens on `addr` and waits for one peer.
    pub fn host(addr: &str) -> Self {
        Self::new(Endpoint::Host(addr.to_string()))
    }

    /// Joins a match hosted at `addr`.
    pub fn join(addr: &str) -> Self {
        Self::new(Endpoint::Join(addr.to_string()))
    }

    /// Sets the heartbeat configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Sets handshake, sync and latency configuration.
    pub fn match_config(mut self, config: MatchConfig) -> Self {
        self.match_config = config;
        self
    }

    /// The local board to broadcast. Required.
    pub fn board(mut self, source: Arc<dyn BoardSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Where the opponent's board goes. Defaults to nowhere; the match's
    /// own mirror is always kept.
    pub fn sink(mut self, sink: Arc<dyn BoardSink>) -> Self {
        self.sink = sink;
        self
    }

    /// UI notifications. Defaults to none.
    pub fn observer(mut self, observer: Arc<dyn MatchObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Host side: binds the listener.
    ///
    /// # Errors
    /// - [`TetrilinkError::MissingBoard`] without a board.
    /// - [`TetrilinkError::WrongRole`] on a builder made with [`join`](Self::join).
    /// - [`TetrilinkError::Transport`] if binding fails.
    pub async fn bind(self) -> Result<Lobby, TetrilinkError> {
        let Endpoint::Host(addr) = &self.endpoint else {
            return Err(TetrilinkError::WrongRole {
                expected: Role::Host,
            });
        };
        let source = self.source.ok_or(TetrilinkError::MissingBoard)?;
        let listener = LineListener::bind(addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "waiting for peer");
        Ok(Lobby {
            listener,
            session_config: self.session_config,
            match_config: self.match_config,
            source,
            sink: self.sink,
            observer: self.observer,
        })
    }

    /// Joining side: dials the host and returns the match, ready for
    /// [`Match::start`].
    ///
    /// # Errors
    /// - [`TetrilinkError::MissingBoard`] without a board.
    /// - [`TetrilinkError::WrongRole`] on a builder made with [`host`](Self::host).
    /// - [`TetrilinkError::Session`] if the host cannot be reached.
    pub async fn connect(self) -> Result<Match, TetrilinkError> {
        let Endpoint::Join(addr) = &self.endpoint else {
            return Err(TetrilinkError::WrongRole {
                expected: Role::Peer,
            });
        };
        let source = self.source.ok_or(TetrilinkError::MissingBoard)?;
        let session = Session::connect(addr, self.session_config).await?;
        tracing::info!(conn_id = %session.id(), "joined host");
        Ok(Match::new(
            session,
            self.match_config,
            source,
            self.sink,
            self.observer,
        ))
    }
}

/// A bound host waiting for its peer.
pub struct Lobby {
    listener: LineListener,
    session_config: SessionConfig,
    match_config: MatchConfig,
    source: Arc<dyn BoardSource>,
    sink: Arc<dyn BoardSink>,
    observer: Arc<dyn MatchObserver>,
}

impl Lobby {
    /// The address peers should dial.
    pub fn local_addr(&self) -> Result<SocketAddr, TetrilinkError> {
        Ok(self.listener.local_addr()?)
    }

    /// Waits for the peer and returns the match, ready for
    /// [`Match::start`].
    pub async fn accept(self) -> Result<Match, TetrilinkError> {
        let session = Session::accept(&self.listener, self.session_config).await?;
        tracing::info!(conn_id = %session.id(), peer = ?session.peer_addr(), "peer joined");
        Ok(Match::new(
            session,
            self.match_config,
            self.source,
            self.sink,
            self.observer,
        ))
    }
}
