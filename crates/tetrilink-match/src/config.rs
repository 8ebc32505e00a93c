//! Match configuration.
//!
//! Every periodic behavior of a match has its interval here. The defaults
//! are the reference values both clients are expected to run with.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Per-component configs
// ---------------------------------------------------------------------------

/// Handshake barrier timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeConfig {
    /// How often an unacknowledged checkpoint is resent. Default: 100 ms.
    pub retry_interval: Duration,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_millis(100),
        }
    }
}

/// Snapshot broadcast timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Time between two `board:` snapshots. Default: 100 ms.
    pub interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
        }
    }
}

/// Latency classification and the sustained-lag rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencyConfig {
    /// Samples kept in the rolling window. Default: 10.
    pub window: usize,
    /// Lag is sustained only when both the newest sample and the rolling
    /// average exceed this. Default: 200 ms (the start of the poor tier).
    pub poor_boundary_ms: u64,
    /// Fewest samples before sustained lag may be declared. Default: 3.
    pub min_samples: usize,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            window: 10,
            poor_boundary_ms: 200,
            min_samples: 3,
        }
    }
}

impl LatencyConfig {
    /// Clamps values that would make the monitor meaningless.
    pub fn validated(mut self) -> Self {
        self.window = self.window.max(1);
        self.min_samples = self.min_samples.clamp(1, self.window);
        self
    }
}

// ---------------------------------------------------------------------------
// MatchConfig
// ---------------------------------------------------------------------------

/// Everything a [`Match`](crate::Match) needs besides its session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchConfig {
    pub handshake: HandshakeConfig,
    pub sync: SyncConfig,
    pub latency: LatencyConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_reference_values() {
        let cfg = MatchConfig::default();
        assert_eq!(cfg.handshake.retry_interval, Duration::from_millis(100));
        assert_eq!(cfg.sync.interval, Duration::from_millis(100));
        assert_eq!(cfg.latency.window, 10);
        assert_eq!(cfg.latency.poor_boundary_ms, 200);
        assert_eq!(cfg.latency.min_samples, 3);
    }

    #[test]
    fn test_latency_validated_clamps_min_samples() {
        let cfg = LatencyConfig {
            window: 0,
            min_samples: 7,
            ..Default::default()
        }
        .validated();
        assert_eq!(cfg.window, 1);
        assert_eq!(cfg.min_samples, 1);
    }
}
