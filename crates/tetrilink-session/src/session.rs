//! The peer session: one connection, its router and its heartbeat.
//!
//! Host and peer run the same code; [`Role`] only decides who listens and
//! who drives the mode choice later in the handshake.
//!
//! ```text
//!   Connecting ──start()──→ Connected ──(any trigger)──→ Disconnected
//!        │                                                    ▲
//!        └──────────────────release()─────────────────────────┘
//! ```
//!
//! Every way a session can end (heartbeat timeout, end of stream, I/O
//! failure, sustained lag, `release()`) goes through one single-fire
//! routine guarded by a compare-and-set flag. The first trigger tears the
//! session down and runs the disconnect handler; later triggers do nothing.

use std::fmt;
use std::net::SocketAddr;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tetrilink_protocol::{Probe, prefix};
use tetrilink_transport::{CloseReason, ConnectionId, LineConnection, LineListener};
use tokio::sync::watch;

use crate::heartbeat::{ActivityClock, HeartbeatSupervisor, RoundTrip};
use crate::router::MessageRouter;
use crate::SessionError;

// ---------------------------------------------------------------------------
// Configuration and state
// ---------------------------------------------------------------------------

/// Session timing.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Time between pings. Default: 500 ms.
    pub heartbeat_interval: Duration,
    /// Silence after which the session is declared dead. Default: 5000 ms.
    pub heartbeat_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_millis(500),
            heartbeat_timeout: Duration::from_millis(5_000),
        }
    }
}

/// Which end of the link this session is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Accepted the connection; picks the game mode.
    Host,
    /// Dialed the host.
    Peer,
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Nothing was received for longer than the heartbeat timeout.
    HeartbeatTimeout,
    /// The peer closed the stream.
    PeerClosed,
    /// Reading from the socket failed.
    ReadFailed(String),
    /// Writing to the socket failed.
    WriteFailed(String),
    /// Round trips stayed above the lag threshold.
    SustainedLag,
    /// The local side called `release()`.
    Released,
}

impl DisconnectReason {
    /// `true` for reasons that mean the link is too slow rather than gone.
    pub fn is_lag(&self) -> bool {
        matches!(self, Self::SustainedLag)
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HeartbeatTimeout => f.write_str("heartbeat timeout"),
            Self::PeerClosed => f.write_str("peer closed the connection"),
            Self::ReadFailed(e) => write!(f, "read failed: {e}"),
            Self::WriteFailed(e) => write!(f, "write failed: {e}"),
            Self::SustainedLag => f.write_str("sustained lag"),
            Self::Released => f.write_str("released"),
        }
    }
}

impl From<CloseReason> for DisconnectReason {
    fn from(reason: CloseReason) -> Self {
        match reason {
            CloseReason::PeerClosed => Self::PeerClosed,
            CloseReason::ReadFailed(e) => Self::ReadFailed(e),
            CloseReason::WriteFailed(e) => Self::WriteFailed(e),
            CloseReason::LocalClose => Self::Released,
        }
    }
}

/// Lifecycle state. `Disconnected` is terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Connected,
    Disconnected(DisconnectReason),
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

type DisconnectHandler = Box<dyn FnOnce(DisconnectReason) + Send>;
type RoundTripHandler = Arc<dyn Fn(RoundTrip) + Send + Sync>;

struct SessionInner {
    role: Role,
    config: SessionConfig,
    conn: LineConnection,
    router: MessageRouter,
    clock: Arc<ActivityClock>,
    state: watch::Sender<SessionState>,
    started: AtomicBool,
    is_handling_error: AtomicBool,
    heartbeat: Mutex<Option<HeartbeatSupervisor>>,
    on_disconnect: Mutex<Option<DisconnectHandler>>,
    on_round_trip: Mutex<Option<RoundTripHandler>>,
}

/// A live link to the other player.
///
/// Cloning is cheap and every clone refers to the same session. Background
/// tasks only hold weak references, so dropping the last clone tears the
/// link down.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Wraps an open connection. The session stays `Connecting` until
    /// [`start`](Self::start).
    pub fn new(conn: LineConnection, role: Role, config: SessionConfig) -> Self {
        let (state, _) = watch::channel(SessionState::Connecting);
        Self {
            inner: Arc::new(SessionInner {
                role,
                config,
                conn,
                router: MessageRouter::new(),
                clock: Arc::new(ActivityClock::new()),
                state,
                started: AtomicBool::new(false),
                is_handling_error: AtomicBool::new(false),
                heartbeat: Mutex::new(None),
                on_disconnect: Mutex::new(None),
                on_round_trip: Mutex::new(None),
            }),
        }
    }

    /// Dials a host and starts a [`Role::Peer`] session.
    pub async fn connect(addr: &str, config: SessionConfig) -> Result<Self, SessionError> {
        let conn = LineConnection::connect(addr).await?;
        let session = Self::new(conn, Role::Peer, config);
        session.start()?;
        Ok(session)
    }

    /// Accepts the next peer and starts a [`Role::Host`] session.
    pub async fn accept(
        listener: &LineListener,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let conn = listener.accept().await?;
        let session = Self::new(conn, Role::Host, config);
        session.start()?;
        Ok(session)
    }

    /// Starts the receive loop and the heartbeat and moves to `Connected`.
    ///
    /// # Errors
    /// - [`SessionError::Closed`] if the session was already released.
    /// - [`SessionError::AlreadyStarted`] on a second call.
    /// - [`SessionError::Transport`] if the receive loop cannot start.
    pub fn start(&self) -> Result<(), SessionError> {
        let inner = &self.inner;
        if inner.is_handling_error.load(Ordering::Acquire) {
            return Err(SessionError::Closed);
        }
        if inner.started.swap(true, Ordering::AcqRel) {
            return Err(SessionError::AlreadyStarted);
        }

        self.register_probe_handlers();

        let on_line = {
            let weak = Arc::downgrade(inner);
            move |line: String| {
                let Some(inner) = weak.upgrade() else { return };
                inner.clock.touch();
                inner.router.dispatch(&line);
            }
        };
        let on_closed = {
            let weak = Arc::downgrade(inner);
            move |reason: CloseReason| {
                if let Some(inner) = weak.upgrade() {
                    inner.handle_failure(reason.into());
                }
            }
        };
        inner.conn.receive_loop(on_line, on_closed)?;

        let heartbeat = {
            let send_weak = Arc::downgrade(inner);
            let timeout_weak = Arc::downgrade(inner);
            HeartbeatSupervisor::start(
                &inner.config,
                Arc::clone(&inner.clock),
                move |line| {
                    if let Some(inner) = send_weak.upgrade() {
                        inner.conn.send(line);
                    }
                },
                move |_idle| {
                    if let Some(inner) = timeout_weak.upgrade() {
                        inner.handle_failure(DisconnectReason::HeartbeatTimeout);
                    }
                },
            )
        };
        *inner.heartbeat.lock() = Some(heartbeat);

        // A failure may have raced the startup; never resurrect the state.
        let connected = inner.state.send_if_modified(|state| {
            if *state == SessionState::Connecting {
                *state = SessionState::Connected;
                true
            } else {
                false
            }
        });
        if connected {
            tracing::info!(conn_id = %inner.conn.id(), role = ?inner.role, "session connected");
        } else if let Some(hb) = inner.heartbeat.lock().take() {
            hb.stop();
        }
        Ok(())
    }

    fn register_probe_handlers(&self) {
        let weak = Arc::downgrade(&self.inner);
        self.inner.router.add(
            prefix::PING,
            Arc::new(move |payload: &str| {
                let Some(inner) = weak.upgrade() else { return };
                match Probe::parse(payload) {
                    Ok(probe) => inner.conn.send(&probe.pong_line()),
                    Err(e) => tracing::warn!(error = %e, "malformed ping dropped"),
                }
            }),
        );

        let weak = Arc::downgrade(&self.inner);
        self.inner.router.add(
            prefix::PONG,
            Arc::new(move |payload: &str| {
                let Some(inner) = weak.upgrade() else { return };
                let probe = match Probe::parse(payload) {
                    Ok(probe) => probe,
                    Err(e) => {
                        tracing::warn!(error = %e, "malformed pong dropped");
                        return;
                    }
                };
                let round_trip = RoundTrip::from_echo(probe, &inner.clock);
                tracing::trace!(tick = round_trip.tick, rtt_ms = round_trip.millis(), "pong");
                let handler = inner.on_round_trip.lock().clone();
                if let Some(handler) = handler {
                    handler(round_trip);
                }
            }),
        );
    }

    // -- Messaging ---------------------------------------------------------

    /// Registers a handler for lines starting with `prefix`. The handler
    /// receives the rest of the line. Re-registering a prefix replaces the
    /// previous handler.
    pub fn add_callback<F>(&self, prefix: impl Into<String>, handler: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.inner.router.add(prefix, Arc::new(handler));
    }

    /// Removes the handler for `prefix`. Returns whether one existed.
    pub fn remove_callback(&self, prefix: &str) -> bool {
        self.inner.router.remove(prefix)
    }

    /// Sends one line to the peer. Fire and forget: on a disconnected
    /// session the line is dropped.
    pub fn send(&self, line: &str) {
        if self.is_disconnected() {
            tracing::debug!(conn_id = %self.inner.conn.id(), "send on disconnected session dropped");
            return;
        }
        self.inner.conn.send(line);
    }

    // -- Lifecycle ---------------------------------------------------------

    /// Sets the handler that runs once when the session ends. If the session
    /// has already ended and nobody was notified, it runs immediately.
    pub fn set_on_disconnect<F>(&self, handler: F)
    where
        F: FnOnce(DisconnectReason) + Send + 'static,
    {
        *self.inner.on_disconnect.lock() = Some(Box::new(handler));
        if let SessionState::Disconnected(reason) = self.state() {
            let handler = self.inner.on_disconnect.lock().take();
            if let Some(handler) = handler {
                run_disconnect_handler(handler, reason);
            }
        }
    }

    /// Sets the handler that receives every measured heartbeat round trip.
    pub fn set_on_round_trip<F>(&self, handler: F)
    where
        F: Fn(RoundTrip) + Send + Sync + 'static,
    {
        *self.inner.on_round_trip.lock() = Some(Arc::new(handler));
    }

    /// Ends the session locally. Safe to call any number of times, before
    /// or after the session started.
    pub fn release(&self) {
        self.inner.handle_failure(DisconnectReason::Released);
    }

    /// Ends the session with an explicit reason, e.g.
    /// [`DisconnectReason::SustainedLag`] from a latency monitor. Returns
    /// `false` if the session had already ended.
    pub fn terminate(&self, reason: DisconnectReason) -> bool {
        self.inner.handle_failure(reason)
    }

    /// Waits until the session ends and returns why.
    pub async fn disconnected(&self) -> DisconnectReason {
        let mut rx = self.inner.state.subscribe();
        let result = rx
            .wait_for(|state| matches!(state, SessionState::Disconnected(_)))
            .await
            .map(|state| state.clone());
        match result {
            Ok(SessionState::Disconnected(reason)) => reason,
            // The sender lives as long as `self`, so this is unreachable in
            // practice.
            _ => DisconnectReason::Released,
        }
    }

    /// Subscribes to state changes.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    // -- Accessors ---------------------------------------------------------

    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        *self.inner.state.borrow() == SessionState::Connected
    }

    pub fn is_disconnected(&self) -> bool {
        matches!(*self.inner.state.borrow(), SessionState::Disconnected(_))
    }

    pub fn role(&self) -> Role {
        self.inner.role
    }

    pub fn id(&self) -> ConnectionId {
        self.inner.conn.id()
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.inner.conn.peer_addr()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Milliseconds on the session's monotonic clock.
    pub fn clock_millis(&self) -> u64 {
        self.inner.clock.now_millis()
    }

    /// A handle that does not keep the session alive. Use it in callbacks
    /// the session itself stores.
    pub fn downgrade(&self) -> WeakSession {
        WeakSession {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

/// Non-owning session handle, see [`Session::downgrade`].
#[derive(Clone)]
pub struct WeakSession {
    inner: Weak<SessionInner>,
}

impl WeakSession {
    pub fn upgrade(&self) -> Option<Session> {
        self.inner.upgrade().map(|inner| Session { inner })
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.conn.id())
            .field("role", &self.inner.role)
            .field("state", &*self.inner.state.borrow())
            .finish()
    }
}

impl SessionInner {
    /// The single teardown path. Returns `true` for the call that actually
    /// tore the session down.
    fn handle_failure(&self, reason: DisconnectReason) -> bool {
        if self
            .is_handling_error
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::trace!(conn_id = %self.conn.id(), ?reason, "disconnect already handled");
            return false;
        }

        match &reason {
            DisconnectReason::Released => {
                tracing::info!(conn_id = %self.conn.id(), role = ?self.role, "session released")
            }
            other => tracing::warn!(
                conn_id = %self.conn.id(),
                role = ?self.role,
                reason = %other,
                "session disconnected"
            ),
        }

        let heartbeat = self.heartbeat.lock().take();
        if let Some(heartbeat) = heartbeat {
            heartbeat.stop();
        }
        self.conn.close();
        self.router.clear();
        self.on_round_trip.lock().take();
        self.state
            .send_replace(SessionState::Disconnected(reason.clone()));

        let handler = self.on_disconnect.lock().take();
        if let Some(handler) = handler {
            run_disconnect_handler(handler, reason);
        }
        true
    }
}

fn run_disconnect_handler(handler: DisconnectHandler, reason: DisconnectReason) {
    if catch_unwind(AssertUnwindSafe(|| handler(reason))).is_err() {
        tracing::error!("disconnect handler panicked");
    }
}
