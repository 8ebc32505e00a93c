//! Fixed-interval tickers for Tetrilink.
//!
//! Everything periodic in a match runs on this crate, never on a GUI timer:
//!
//! - heartbeats (500 ms)
//! - board snapshot broadcasts (100 ms)
//! - handshake retries (100 ms)
//!
//! [`Ticker`] is the low-level piece: an async `wait_for_tick` meant to sit
//! in a `tokio::select!` loop. [`PeriodicTask`] wraps a ticker and a
//! closure into a spawned task with an idempotent `stop()`.
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         _ = resolved.changed() => break,
//!         _ = ticker.wait_for_tick() => session.send("ready"),
//!     }
//! }
//! ```

mod periodic;

pub use periodic::{PeriodicTask, TickFlow};

use std::time::{Duration, Instant};

use rand::Rng;
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Full configuration for a ticker.
///
/// A late tick is never made up for: the next one is scheduled one interval
/// after the late one fired. Only the newest heartbeat or snapshot matters.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Time between ticks.
    pub interval: Duration,
    /// Fraction of the interval (0.0–1.0) after which the work done in a
    /// tick logs a warning. Default: 0.80.
    pub budget_warn_threshold: f64,
    /// Random delay (0–max µs) added to the first tick so that tickers
    /// created together do not fire in lockstep.
    pub initial_jitter_us: u64,
    /// When `true`, the first tick fires immediately instead of one
    /// interval after creation.
    pub fire_immediately: bool,
}

impl TickConfig {
    /// Shortest interval accepted; anything below is clamped up.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

    /// A config that ticks every `interval`.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            budget_warn_threshold: 0.80,
            initial_jitter_us: 0,
            fire_immediately: false,
        }
    }

    /// Same config, but the first tick fires right away.
    pub fn immediate(mut self) -> Self {
        self.fire_immediately = true;
        self
    }

    /// Same config, with up to `max` of random delay before the first tick.
    pub fn with_jitter(mut self, max: Duration) -> Self {
        self.initial_jitter_us = u64::try_from(max.as_micros()).unwrap_or(u64::MAX);
        self
    }

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`Ticker::new`]:
    /// - `interval` raised to [`Self::MIN_INTERVAL`] (a zero interval would spin).
    /// - `budget_warn_threshold` clamped to `0.0..=1.0`.
    pub fn validated(mut self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            warn!(interval = ?self.interval, "tick interval below minimum, clamping");
            self.interval = Self::MIN_INTERVAL;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self
    }
}

// ---------------------------------------------------------------------------
// Tick info and metrics
// ---------------------------------------------------------------------------

/// Information about a fired tick, returned by [`Ticker::wait_for_tick`].
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Monotonically increasing tick number (starts at 1).
    pub tick: u64,
    /// `true` if this tick fired more than 10% of an interval late.
    pub overrun: bool,
    /// Whole intervals skipped because of lateness.
    pub ticks_skipped: u64,
}

/// Runtime counters for a ticker.
#[derive(Debug, Clone, Default)]
pub struct TickMetrics {
    pub total_ticks: u64,
    pub total_overruns: u64,
    pub total_skipped: u64,
    /// Longest work duration reported through [`Ticker::record_tick_end`].
    pub max_tick_time: Duration,
}

impl TickMetrics {
    fn count(&mut self, info: &TickInfo) {
        self.total_ticks += 1;
        self.total_overruns += u64::from(info.overrun);
        self.total_skipped += info.ticks_skipped;
    }

    fn observe_work(&mut self, elapsed: Duration) {
        self.max_tick_time = self.max_tick_time.max(elapsed);
    }
}

// ---------------------------------------------------------------------------
// Ticker
// ---------------------------------------------------------------------------

/// Fixed-interval ticker.
pub struct Ticker {
    config: TickConfig,
    tick_count: u64,
    next_tick: TokioInstant,
    tick_start: Option<Instant>,
    metrics: TickMetrics,
}

impl Ticker {
    /// Creates a ticker. The first tick is one interval (plus jitter) from
    /// now, or immediate when `fire_immediately` is set.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let delay = first_delay(&config);
        debug!(
            interval_ms = config.interval.as_secs_f64() * 1000.0,
            first_ms = delay.as_secs_f64() * 1000.0,
            "ticker created"
        );

        Self {
            next_tick: TokioInstant::now() + delay,
            config,
            tick_count: 0,
            tick_start: None,
            metrics: TickMetrics::default(),
        }
    }

    /// Shorthand for `Ticker::new(TickConfig::every(interval))`.
    pub fn every(interval: Duration) -> Self {
        Self::new(TickConfig::every(interval))
    }

    /// Waits until the next tick is due. Cancel-safe: dropping the future
    /// before it resolves leaves the schedule untouched.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let next = self.next_tick;
        let interval = self.config.interval;

        time::sleep_until(next).await;

        let now = TokioInstant::now();
        self.tick_count += 1;
        self.tick_start = Some(Instant::now());

        let late_by = now.saturating_duration_since(next);
        let overrun = late_by > interval / 10;
        let mut ticks_skipped = 0u64;

        self.next_tick = if overrun {
            ticks_skipped = (late_by.as_nanos() / interval.as_nanos()) as u64;
            if ticks_skipped > 0 {
                warn!(
                    tick = self.tick_count,
                    skipped = ticks_skipped,
                    late_ms = late_by.as_secs_f64() * 1000.0,
                    "tick late, skipping ahead"
                );
            }
            now + interval
        } else {
            next + interval
        };

        let info = TickInfo {
            tick: self.tick_count,
            overrun,
            ticks_skipped,
        };
        self.metrics.count(&info);
        trace!(tick = info.tick, overrun, "tick fired");
        info
    }

    /// Records that the work for the current tick finished, for budget
    /// warnings and `max_tick_time`. A call without a preceding tick is a
    /// no-op.
    pub fn record_tick_end(&mut self) {
        let Some(start) = self.tick_start.take() else {
            return;
        };
        let spent = start.elapsed();
        self.metrics.observe_work(spent);

        let interval = self.config.interval;
        if spent.as_secs_f64() >= interval.as_secs_f64() * self.config.budget_warn_threshold {
            warn!(
                tick = self.tick_count,
                spent_us = spent.as_micros() as u64,
                interval_ms = interval.as_millis() as u64,
                "tick work approaching interval"
            );
        }
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }

    pub fn interval(&self) -> Duration {
        self.config.interval
    }
}

/// Delay before the first tick: one interval (or none when firing
/// immediately) plus the configured random jitter.
fn first_delay(config: &TickConfig) -> Duration {
    let base = if config.fire_immediately {
        Duration::ZERO
    } else {
        config.interval
    };
    let jitter = match config.initial_jitter_us {
        0 => Duration::ZERO,
        max => Duration::from_micros(rand::rng().random_range(0..max)),
    };
    base + jitter
}
