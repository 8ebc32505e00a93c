//! Snapshot broadcast and the mirrored opponent view.
//!
//! Each side runs one channel. The sending half reads the local board every
//! sync tick and sends the whole thing as `board:<json>`. The receiving
//! half replaces its mirror with every snapshot that decodes, records the
//! snapshot's age as a latency sample and turns the `paused` and
//! `game_over` flags into edge notifications.

use std::sync::Arc;

use parking_lot::Mutex;
use tetrilink_protocol::{
    Envelope, GameStateSnapshot, JsonCodec, ProtocolError, prefix, unix_millis,
};
use tetrilink_session::Session;
use tetrilink_tick::{PeriodicTask, TickConfig, TickFlow};

use crate::{BoardSink, BoardSource, MatchObserver, SyncConfig};

// ---------------------------------------------------------------------------
// MirroredBoard
// ---------------------------------------------------------------------------

/// Read-only copy of the opponent's latest state.
#[derive(Debug, Clone, Default)]
pub struct MirroredBoard {
    current: Option<GameStateSnapshot>,
    applied: u64,
}

impl MirroredBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the mirror wholesale. Nothing of the previous snapshot
    /// survives.
    pub fn replace(&mut self, snapshot: GameStateSnapshot) {
        self.current = Some(snapshot);
        self.applied += 1;
    }

    pub fn current(&self) -> Option<&GameStateSnapshot> {
        self.current.as_ref()
    }

    /// Number of snapshots applied so far.
    pub fn applied_count(&self) -> u64 {
        self.applied
    }
}

// ---------------------------------------------------------------------------
// OpponentFlags
// ---------------------------------------------------------------------------

/// Edge detector for the opponent's pause and game-over flags.
///
/// Shared between the snapshot path and the `pause:` event so that the two
/// sources of the same fact produce one notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpponentFlags {
    paused: bool,
    game_over: bool,
}

impl OpponentFlags {
    /// Returns the new value if `paused` differs from the last known one.
    pub fn update_paused(&mut self, paused: bool) -> Option<bool> {
        if self.paused == paused {
            return None;
        }
        self.paused = paused;
        Some(paused)
    }

    /// Returns `true` on the rising edge of `game_over` only.
    pub fn update_game_over(&mut self, game_over: bool) -> bool {
        let rising = game_over && !self.game_over;
        self.game_over = game_over;
        rising
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }
}

// ---------------------------------------------------------------------------
// Receiving half
// ---------------------------------------------------------------------------

/// Applies received snapshots. Independent of the network so it can be
/// driven directly.
pub struct SnapshotReceiver {
    mirror: Mutex<MirroredBoard>,
    flags: Arc<Mutex<OpponentFlags>>,
    sink: Arc<dyn BoardSink>,
    observer: Arc<dyn MatchObserver>,
}

impl SnapshotReceiver {
    pub fn new(
        flags: Arc<Mutex<OpponentFlags>>,
        sink: Arc<dyn BoardSink>,
        observer: Arc<dyn MatchObserver>,
    ) -> Self {
        Self {
            mirror: Mutex::new(MirroredBoard::new()),
            flags,
            sink,
            observer,
        }
    }

    /// Decodes and applies one `board:` payload received at `now_millis`.
    /// Returns the snapshot's age in milliseconds (0 if the sender's clock
    /// is ahead).
    ///
    /// # Errors
    /// Decode or validation errors; the mirror is left untouched.
    pub fn handle_payload(&self, payload: &str, now_millis: u64) -> Result<u64, ProtocolError> {
        let snapshot: GameStateSnapshot =
            Envelope::new(prefix::BOARD, payload).decode(&JsonCodec)?;
        snapshot.validate()?;
        Ok(self.apply(snapshot, now_millis))
    }

    /// Applies an already-decoded snapshot.
    pub fn apply(&self, snapshot: GameStateSnapshot, now_millis: u64) -> u64 {
        let age = now_millis.saturating_sub(snapshot.capture_time_millis);

        let (paused_edge, game_over_edge) = {
            let mut flags = self.flags.lock();
            (
                flags.update_paused(snapshot.pause_flag),
                flags.update_game_over(snapshot.game_over_flag),
            )
        };

        self.mirror.lock().replace(snapshot.clone());
        self.sink.apply_remote_snapshot(snapshot);

        if let Some(paused) = paused_edge {
            self.observer.on_opponent_paused(paused);
        }
        if game_over_edge {
            self.observer.on_opponent_game_over();
        }
        age
    }

    pub fn mirror(&self) -> MirroredBoard {
        self.mirror.lock().clone()
    }
}

// ---------------------------------------------------------------------------
// StateSyncChannel
// ---------------------------------------------------------------------------

type SampleHandler = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Both halves of the snapshot exchange over one session.
///
/// Dropping the channel stops the broadcast and unregisters `board:`.
pub struct StateSyncChannel {
    session: Session,
    config: SyncConfig,
    receiver: Arc<SnapshotReceiver>,
    broadcast: Mutex<Option<PeriodicTask>>,
}

impl StateSyncChannel {
    pub fn new(session: Session, config: SyncConfig, receiver: SnapshotReceiver) -> Self {
        Self {
            session,
            config,
            receiver: Arc::new(receiver),
            broadcast: Mutex::new(None),
        }
    }

    /// Starts sending the local board every sync interval. Replaces a
    /// broadcast that is already running.
    pub fn start_broadcast(&self, source: Arc<dyn BoardSource>) {
        let session = self.session.downgrade();
        let task = PeriodicTask::spawn(
            "state-sync",
            TickConfig::every(self.config.interval).with_jitter(self.config.interval / 10),
            move |info| {
                let Some(session) = session.upgrade() else {
                    return TickFlow::Stop;
                };
                if session.is_disconnected() {
                    return TickFlow::Stop;
                }
                let snapshot = source.read_local_snapshot().stamped(unix_millis());
                match Envelope::encode(&JsonCodec, prefix::BOARD, &snapshot) {
                    Ok(env) => {
                        tracing::trace!(tick = info.tick, "board snapshot sent");
                        session.send(&env.to_line());
                    }
                    Err(e) => tracing::warn!(error = %e, "snapshot encode failed"),
                }
                TickFlow::Continue
            },
        );
        let previous = self.broadcast.lock().replace(task);
        if let Some(previous) = previous {
            previous.stop();
        }
    }

    /// Registers the `board:` handler. `on_sample` receives
    /// `(snapshots_received, age_ms)` for each applied snapshot.
    pub fn start_mirror<F>(&self, on_sample: F)
    where
        F: Fn(u64, u64) + Send + Sync + 'static,
    {
        let receiver = Arc::clone(&self.receiver);
        let on_sample: SampleHandler = Box::new(on_sample);
        self.session.add_callback(prefix::BOARD, move |payload| {
            match receiver.handle_payload(payload, unix_millis()) {
                Ok(age) => on_sample(receiver.mirror.lock().applied_count(), age),
                Err(e) => tracing::warn!(error = %e, "malformed snapshot dropped"),
            }
        });
    }

    /// Stops broadcasting and mirroring. Idempotent.
    pub fn stop(&self) {
        let task = self.broadcast.lock().take();
        if let Some(task) = task {
            task.stop();
        }
        self.session.remove_callback(prefix::BOARD);
    }

    pub fn is_broadcasting(&self) -> bool {
        self.broadcast
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// A copy of the current opponent mirror.
    pub fn mirror(&self) -> MirroredBoard {
        self.receiver.mirror()
    }
}

impl Drop for StateSyncChannel {
    fn drop(&mut self) {
        self.stop();
    }
}
