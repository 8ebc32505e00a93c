//! The match: one session plus everything that runs on top of it.
//!
//! ```text
//!   Match::new ──▶ start(mode) ──▶ handshake ──▶ sync + events + latency
//!                                                       │
//!           on_disconnected ◀── session ends ◀──────────┘ (sustained lag,
//!                                                          timeout, EOF...)
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tetrilink_session::{DisconnectReason, Session};

use crate::{
    BoardSink, BoardSource, EventChannel, EventState, HandshakeCoordinator, LatencyMonitor,
    LatencyReport, MatchConfig, MatchError, MatchObserver, MirroredBoard, OpponentFlags,
    SnapshotReceiver, StateSyncChannel,
};

/// A running versus match between this client and its peer.
pub struct Match {
    session: Session,
    source: Arc<dyn BoardSource>,
    observer: Arc<dyn MatchObserver>,
    handshake: HandshakeCoordinator,
    sync: StateSyncChannel,
    events: EventChannel,
    latency: Arc<Mutex<LatencyMonitor>>,
    started: AtomicBool,
    mode: OnceLock<u32>,
}

impl Match {
    /// Wires every channel to `session`. Event handlers are live right away;
    /// snapshots start flowing after [`start`](Self::start).
    pub fn new(
        session: Session,
        config: MatchConfig,
        source: Arc<dyn BoardSource>,
        sink: Arc<dyn BoardSink>,
        observer: Arc<dyn MatchObserver>,
    ) -> Self {
        let flags = Arc::new(Mutex::new(OpponentFlags::default()));
        let latency = Arc::new(Mutex::new(LatencyMonitor::new(config.latency.clone())));

        let handshake = HandshakeCoordinator::new(session.clone(), config.handshake.clone());
        let sync = StateSyncChannel::new(
            session.clone(),
            config.sync.clone(),
            SnapshotReceiver::new(Arc::clone(&flags), sink, Arc::clone(&observer)),
        );
        let events = EventChannel::new(
            session.clone(),
            EventState::new(flags, Arc::clone(&observer)),
        );

        let on_disconnect = Arc::clone(&observer);
        session.set_on_disconnect(move |reason| on_disconnect.on_disconnected(&reason));

        let weak = session.downgrade();
        let (monitor, obs) = (Arc::clone(&latency), Arc::clone(&observer));
        session.set_on_round_trip(move |rt| {
            if let Some(session) = weak.upgrade() {
                record_sample(&session, &monitor, obs.as_ref(), rt.tick, rt.millis());
            }
        });

        Self {
            session,
            source,
            observer,
            handshake,
            sync,
            events,
            latency,
            started: AtomicBool::new(false),
            mode: OnceLock::new(),
        }
    }

    /// Runs the handshake, then starts snapshot sync. Returns the agreed
    /// mode; the host's `preferred_mode` wins.
    ///
    /// # Errors
    /// - [`MatchError::AlreadyStarted`] on a second call.
    /// - [`MatchError::Disconnected`] if the session ends first.
    pub async fn start(&self, preferred_mode: u32) -> Result<u32, MatchError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(MatchError::AlreadyStarted);
        }

        let mode = self.handshake.negotiate(preferred_mode).await?;
        let _ = self.mode.set(mode);

        let weak = self.session.downgrade();
        let (monitor, obs) = (Arc::clone(&self.latency), Arc::clone(&self.observer));
        self.sync.start_mirror(move |tick, age_ms| {
            if let Some(session) = weak.upgrade() {
                record_sample(&session, &monitor, obs.as_ref(), tick, age_ms);
            }
        });
        self.sync.start_broadcast(Arc::clone(&self.source));

        tracing::info!(conn_id = %self.session.id(), role = ?self.session.role(), mode, "match started");
        self.observer.on_match_started(mode);
        Ok(mode)
    }

    /// Ends the match and the session.
    pub fn release(&self) {
        self.sync.stop();
        self.session.release();
    }

    /// Waits until the session ends.
    pub async fn finished(&self) -> DisconnectReason {
        self.session.disconnected().await
    }

    pub fn events(&self) -> &EventChannel {
        &self.events
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn handshake(&self) -> &HandshakeCoordinator {
        &self.handshake
    }

    /// The agreed mode, once started.
    pub fn mode(&self) -> Option<u32> {
        self.mode.get().copied()
    }

    pub fn opponent(&self) -> MirroredBoard {
        self.sync.mirror()
    }

    /// The latency window's current average and tier, if any sample exists.
    pub fn latency(&self) -> Option<LatencyReport> {
        self.latency.lock().report()
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }
}

impl Drop for Match {
    fn drop(&mut self) {
        self.release();
    }
}

/// Feeds one sample to the monitor, reports it, and ends the session on
/// sustained lag.
fn record_sample(
    session: &Session,
    monitor: &Mutex<LatencyMonitor>,
    observer: &dyn MatchObserver,
    tick: u64,
    millis: u64,
) {
    let report = monitor.lock().record(tick, millis);
    observer.on_latency_update(report.average_ms);
    if report.sustained_lag {
        tracing::warn!(
            conn_id = %session.id(),
            latest_ms = report.latest_ms,
            avg_ms = report.average_ms,
            "sustained lag, ending session"
        );
        session.terminate(DisconnectReason::SustainedLag);
    }
}
