//! Control-plane messages: handshake checkpoints and heartbeat probes.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::envelope::prefix;
use crate::ProtocolError;

/// Current wall-clock time in Unix millis. Returns 0 if the clock is set
/// before 1970.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Checkpoint
// ---------------------------------------------------------------------------

/// A named pre-game rendezvous point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Checkpoint {
    /// Both players are in the room.
    Ready,
    /// The host picked a game mode (carries the mode index).
    Mode,
    /// Both players enter gameplay.
    Start,
}

impl Checkpoint {
    /// The checkpoint's name as used in `ack:<name>`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Mode => "mode",
            Self::Start => "start",
        }
    }

    /// Parses a name produced by [`name`](Self::name).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ready" => Some(Self::Ready),
            "mode" => Some(Self::Mode),
            "start" => Some(Self::Start),
            _ => None,
        }
    }

    /// The prefix requests for this checkpoint arrive under.
    pub fn request_prefix(self) -> &'static str {
        match self {
            Self::Ready => prefix::READY,
            Self::Mode => prefix::MODE,
            Self::Start => prefix::START,
        }
    }

    /// The request line, e.g. `ready` or `mode:1`.
    pub fn request_line(self, value: Option<u32>) -> String {
        match value {
            Some(v) => format!("{}{v}", self.request_prefix()),
            None => self.request_prefix().to_owned(),
        }
    }

    /// The acknowledgement line, e.g. `ack:ready`.
    pub fn ack_line(self) -> String {
        format!("{}{}", prefix::ACK, self.name())
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Probe
// ---------------------------------------------------------------------------

/// Heartbeat probe payload: the sender's tick number and its own monotonic
/// clock reading. The peer echoes it verbatim in a `pong`, so the round trip
/// is computed entirely on the sender's clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probe {
    pub tick: u64,
    pub sent_at_millis: u64,
}

impl Probe {
    /// `ping:<tick>:<millis>`
    pub fn ping_line(&self) -> String {
        format!("{}{}:{}", prefix::PING, self.tick, self.sent_at_millis)
    }

    /// `pong:<tick>:<millis>`
    pub fn pong_line(&self) -> String {
        format!("{}{}:{}", prefix::PONG, self.tick, self.sent_at_millis)
    }

    /// Parses the payload after `ping:` or `pong:`.
    pub fn parse(payload: &str) -> Result<Self, ProtocolError> {
        let invalid = || ProtocolError::InvalidMessage(format!("bad probe payload {payload:?}"));
        let (tick, sent) = payload.split_once(':').ok_or_else(invalid)?;
        Ok(Self {
            tick: tick.parse().map_err(|_| invalid())?,
            sent_at_millis: sent.parse().map_err(|_| invalid())?,
        })
    }
}
