//! Liveness probing.
//!
//! The supervisor sends `ping:<tick>:<millis>` on a fixed interval, where
//! `millis` is read from the session's own [`ActivityClock`]. The peer
//! echoes the payload back as `pong:`, so the round trip is measured on a
//! single clock and wall-clock skew between the two machines never matters.
//!
//! Any received line, not just a pong, counts as activity. The supervisor
//! fires its timeout callback once, on the first tick where the link has
//! been silent for longer than the configured timeout, and then stops.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tetrilink_protocol::Probe;
use tetrilink_tick::{PeriodicTask, TickConfig, TickFlow};
use tokio::time::Instant;

use crate::SessionConfig;

// ---------------------------------------------------------------------------
// ActivityClock
// ---------------------------------------------------------------------------

/// Monotonic clock with a "last heard from the peer" mark.
///
/// Readings are milliseconds since the clock was created. Built on
/// `tokio::time::Instant` so paused-time tests can drive it.
#[derive(Debug)]
pub struct ActivityClock {
    origin: Instant,
    last_activity: AtomicU64,
}

impl ActivityClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            last_activity: AtomicU64::new(0),
        }
    }

    /// Milliseconds since the clock was created.
    pub fn now_millis(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    /// Records activity at the current instant.
    pub fn touch(&self) {
        self.last_activity.fetch_max(self.now_millis(), Ordering::AcqRel);
    }

    /// Time since the last recorded activity (or since creation).
    pub fn idle_for(&self) -> Duration {
        let last = self.last_activity.load(Ordering::Acquire);
        Duration::from_millis(self.now_millis().saturating_sub(last))
    }
}

impl Default for ActivityClock {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// RoundTrip
// ---------------------------------------------------------------------------

/// One measured ping/pong round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundTrip {
    /// The heartbeat tick the ping was sent on.
    pub tick: u64,
    pub rtt: Duration,
}

impl RoundTrip {
    /// Computes the round trip for an echoed probe, using the same clock
    /// that stamped it. A probe stamped in the future yields zero.
    pub fn from_echo(probe: Probe, clock: &ActivityClock) -> Self {
        Self {
            tick: probe.tick,
            rtt: Duration::from_millis(clock.now_millis().saturating_sub(probe.sent_at_millis)),
        }
    }

    pub fn millis(&self) -> u64 {
        self.rtt.as_millis() as u64
    }
}

// ---------------------------------------------------------------------------
// HeartbeatSupervisor
// ---------------------------------------------------------------------------

/// Periodic ping sender and silence detector.
pub struct HeartbeatSupervisor {
    task: PeriodicTask,
}

impl HeartbeatSupervisor {
    /// Starts probing.
    ///
    /// `send` is called with each ping line. `on_timeout` runs at most once,
    /// after which the supervisor stops on its own.
    pub fn start<S, T>(
        config: &SessionConfig,
        clock: Arc<ActivityClock>,
        send: S,
        on_timeout: T,
    ) -> Self
    where
        S: Fn(&str) + Send + 'static,
        T: FnOnce(Duration) + Send + 'static,
    {
        let timeout = config.heartbeat_timeout;
        let mut on_timeout = Some(on_timeout);

        let task = PeriodicTask::spawn(
            "heartbeat",
            TickConfig::every(config.heartbeat_interval)
                .with_jitter(config.heartbeat_interval / 10),
            move |info| {
                let idle = clock.idle_for();
                if idle > timeout {
                    tracing::warn!(idle_ms = idle.as_millis() as u64, "peer silent past heartbeat timeout");
                    if let Some(on_timeout) = on_timeout.take() {
                        on_timeout(idle);
                    }
                    return TickFlow::Stop;
                }
                let probe = Probe {
                    tick: info.tick,
                    sent_at_millis: clock.now_millis(),
                };
                tracing::trace!(tick = info.tick, "ping");
                send(&probe.ping_line());
                TickFlow::Continue
            },
        );

        Self { task }
    }

    /// Stops probing. Idempotent.
    pub fn stop(&self) {
        self.task.stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.task.is_finished()
    }
}
