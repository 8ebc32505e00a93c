//! Interfaces to the local game.
//!
//! The match layer never simulates anything. It reads the local player's
//! state from a [`BoardSource`], hands the opponent's state to a
//! [`BoardSink`] and reports everything the UI cares about to a
//! [`MatchObserver`].
//!
//! All three are called from network tasks. Implementations that drive a
//! UI must marshal onto their own thread.

use tetrilink_protocol::{AttackBlockPacket, GameStateSnapshot, ItemEffect};
use tetrilink_session::DisconnectReason;

/// The authoritative local board.
pub trait BoardSource: Send + Sync + 'static {
    /// Captures the current visible state. Called once per sync tick; the
    /// capture time is stamped by the caller.
    fn read_local_snapshot(&self) -> GameStateSnapshot;
}

/// Receiver of the opponent's mirrored board.
pub trait BoardSink: Send + Sync + 'static {
    /// Replaces the opponent view with `snapshot`. Never a merge.
    fn apply_remote_snapshot(&self, snapshot: GameStateSnapshot);
}

/// UI-facing notifications. Every method defaults to doing nothing.
pub trait MatchObserver: Send + Sync + 'static {
    /// Rolling-average latency, in milliseconds, after each new sample.
    fn on_latency_update(&self, _average_ms: u64) {}

    /// The session ended. Called once.
    fn on_disconnected(&self, _reason: &DisconnectReason) {}

    /// The handshake finished and gameplay begins.
    fn on_match_started(&self, _mode: u32) {}

    /// The opponent paused (`true`) or resumed (`false`).
    fn on_opponent_paused(&self, _paused: bool) {}

    /// The opponent's game ended.
    fn on_opponent_game_over(&self) {}

    /// The opponent activated a timed item.
    fn on_item(&self, _effect: ItemEffect) {}

    /// A penalty row was queued for the local board.
    fn on_attack_received(&self, _packet: &AttackBlockPacket) {}
}

/// An observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl MatchObserver for NoopObserver {}

/// A sink that drops snapshots, for matches that only read the mirror.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl BoardSink for NoopSink {
    fn apply_remote_snapshot(&self, _snapshot: GameStateSnapshot) {}
}
