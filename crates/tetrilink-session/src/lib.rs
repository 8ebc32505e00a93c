//! Peer sessions for Tetrilink.
//!
//! This crate turns a raw line connection into a match-ready link:
//!
//! 1. **Routing**: received lines go to the handler registered for their
//!    longest matching prefix ([`MessageRouter`]).
//! 2. **Liveness**: a [`HeartbeatSupervisor`] pings every 500 ms, measures
//!    round trips and declares the peer dead after 5 s of silence.
//! 3. **Teardown**: every failure funnels into one single-fire disconnect,
//!    reported once with a [`DisconnectReason`].
//!
//! # How it fits in the stack
//!
//! ```text
//! Match Layer (above)    ← handshake, state sync, events, latency
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Transport Layer (below) ← LineConnection
//! ```

mod error;
mod heartbeat;
mod router;
mod session;

pub use error::SessionError;
pub use heartbeat::{ActivityClock, HeartbeatSupervisor, RoundTrip};
pub use router::{Handler, MessageRouter};
pub use session::{DisconnectReason, Role, Session, SessionConfig, SessionState, WeakSession};
