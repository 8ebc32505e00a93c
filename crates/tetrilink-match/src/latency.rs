//! Round-trip classification and the sustained-lag decision.
//!
//! Samples come from two places: the age of each received snapshot and
//! heartbeat ping/pong round trips. The monitor keeps the newest few in a
//! ring buffer and decides whether the link is merely spiking or genuinely
//! too slow to play on.

use std::collections::VecDeque;
use std::fmt;

use crate::config::LatencyConfig;

/// Coarse latency bands, as shown to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LatencyTier {
    /// 0..=100 ms
    Normal,
    /// 101..=150 ms
    Elevated,
    /// 151..=200 ms
    Degraded,
    /// 201..=300 ms
    Poor,
    /// above 300 ms
    Critical,
}

impl LatencyTier {
    pub fn from_millis(ms: u64) -> Self {
        match ms {
            0..=100 => Self::Normal,
            101..=150 => Self::Elevated,
            151..=200 => Self::Degraded,
            201..=300 => Self::Poor,
            _ => Self::Critical,
        }
    }
}

impl fmt::Display for LatencyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Normal => "normal",
            Self::Elevated => "elevated",
            Self::Degraded => "degraded",
            Self::Poor => "poor",
            Self::Critical => "critical",
        })
    }
}

/// One observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencySample {
    pub observed_at_tick: u64,
    pub round_trip_millis: u64,
}

/// The monitor's view right after a sample was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyReport {
    pub latest_ms: u64,
    pub average_ms: u64,
    pub tier: LatencyTier,
    pub sustained_lag: bool,
}

/// Rolling latency window.
#[derive(Debug, Clone)]
pub struct LatencyMonitor {
    config: LatencyConfig,
    samples: VecDeque<LatencySample>,
}

impl LatencyMonitor {
    pub fn new(config: LatencyConfig) -> Self {
        let config = config.validated();
        Self {
            samples: VecDeque::with_capacity(config.window),
            config,
        }
    }

    /// Adds a sample, evicting the oldest one when the window is full.
    pub fn record(&mut self, observed_at_tick: u64, round_trip_millis: u64) -> LatencyReport {
        if self.samples.len() == self.config.window {
            self.samples.pop_front();
        }
        self.samples.push_back(LatencySample {
            observed_at_tick,
            round_trip_millis,
        });

        let report = LatencyReport {
            latest_ms: round_trip_millis,
            average_ms: self.average_millis(),
            tier: LatencyTier::from_millis(round_trip_millis),
            sustained_lag: self.is_sustained_lag(),
        };
        tracing::trace!(
            tick = observed_at_tick,
            rtt_ms = round_trip_millis,
            avg_ms = report.average_ms,
            tier = %report.tier,
            "latency sample"
        );
        report
    }

    /// The current view, or `None` before the first sample.
    pub fn report(&self) -> Option<LatencyReport> {
        let latest = self.samples.back()?;
        Some(LatencyReport {
            latest_ms: latest.round_trip_millis,
            average_ms: self.average_millis(),
            tier: LatencyTier::from_millis(latest.round_trip_millis),
            sustained_lag: self.is_sustained_lag(),
        })
    }

    /// Integer mean of the window, 0 when empty.
    pub fn average_millis(&self) -> u64 {
        if self.samples.is_empty() {
            return 0;
        }
        let sum: u64 = self.samples.iter().map(|s| s.round_trip_millis).sum();
        sum / self.samples.len() as u64
    }

    /// Lag counts as sustained only when the newest sample and the average
    /// both exceed the poor boundary and the window holds enough samples.
    /// A single spike can never satisfy all three.
    pub fn is_sustained_lag(&self) -> bool {
        let Some(latest) = self.samples.back() else {
            return false;
        };
        let boundary = self.config.poor_boundary_ms;
        self.samples.len() >= self.config.min_samples
            && latest.round_trip_millis > boundary
            && self.average_millis() > boundary
    }

    /// Tier of the newest sample.
    pub fn tier(&self) -> Option<LatencyTier> {
        self.samples
            .back()
            .map(|s| LatencyTier::from_millis(s.round_trip_millis))
    }

    pub fn latest(&self) -> Option<LatencySample> {
        self.samples.back().copied()
    }

    pub fn samples(&self) -> impl Iterator<Item = &LatencySample> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl Default for LatencyMonitor {
    fn default() -> Self {
        Self::new(LatencyConfig::default())
    }
}
