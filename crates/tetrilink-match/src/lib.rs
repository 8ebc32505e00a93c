//! Versus-match layer for Tetrilink.
//!
//! Everything that happens on an established session between two players:
//!
//! - [`HandshakeCoordinator`]: ready, mode select and start barriers that
//!   survive dropped lines.
//! - [`StateSyncChannel`]: full board snapshots every sync tick, mirrored
//!   into a read-only [`MirroredBoard`].
//! - [`EventChannel`]: attack rows, timed items and pause toggles.
//! - [`LatencyMonitor`]: tiers, a rolling window and the sustained-lag rule.
//! - [`Match`]: wires all of the above to one [`Session`](tetrilink_session::Session)
//!   and to the game through the traits in [`board`].

pub mod board;
mod config;
mod error;
mod events;
mod handshake;
mod latency;
mod state_sync;
mod versus;

pub use board::{BoardSink, BoardSource, MatchObserver, NoopObserver, NoopSink};
pub use config::{HandshakeConfig, LatencyConfig, MatchConfig, SyncConfig};
pub use error::MatchError;
pub use events::{EventChannel, EventState};
pub use handshake::HandshakeCoordinator;
pub use latency::{LatencyMonitor, LatencyReport, LatencySample, LatencyTier};
pub use state_sync::{MirroredBoard, OpponentFlags, SnapshotReceiver, StateSyncChannel};
pub use versus::Match;
