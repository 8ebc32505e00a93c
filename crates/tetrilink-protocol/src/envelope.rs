//! Envelopes and the reserved line prefixes.
//!
//! A line on the wire is `prefix + payload`. Prefixes that carry a payload
//! end in `:` (`board:`, `mode:`); checkpoint prefixes such as `ready` are
//! the whole line.

use std::fmt;

use serde::{Serialize, de::DeserializeOwned};

use crate::{Codec, ProtocolError};

/// Reserved prefixes used by the core.
pub mod prefix {
    /// Handshake checkpoint: both sides are in the room.
    pub const READY: &str = "ready";
    /// Handshake checkpoint: both sides enter gameplay.
    pub const START: &str = "start";
    /// Host to guest: selected game mode, `mode:<index>`.
    pub const MODE: &str = "mode:";
    /// Acknowledges a handshake checkpoint, `ack:<name>`.
    pub const ACK: &str = "ack:";
    /// Full board snapshot, `board:<json>`.
    pub const BOARD: &str = "board:";
    /// One penalty row for the opponent, `attack-generate:<json>`.
    pub const ATTACK_GENERATE: &str = "attack-generate:";
    /// The opponent consumed its queued penalty rows.
    pub const ATTACK_APPLY: &str = "attack-apply";
    /// Timed item: opponent falls faster, `item:speed-up:<millis>`.
    pub const ITEM_SPEED_UP: &str = "item:speed-up:";
    /// Timed item: own pieces fall slower, `item:speed-down:<millis>`.
    pub const ITEM_SPEED_DOWN: &str = "item:speed-down:";
    /// Timed item: opponent's view is obscured, `item:vision-block:<millis>`.
    pub const ITEM_VISION_BLOCK: &str = "item:vision-block:";
    /// Pause toggle notification, `pause:<0|1>`.
    pub const PAUSE: &str = "pause:";
    /// Heartbeat probe, `ping:<tick>:<millis>`.
    pub const PING: &str = "ping:";
    /// Heartbeat echo, `pong:<tick>:<millis>`.
    pub const PONG: &str = "pong:";
}

/// A single transmitted unit: prefix plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// The prefix, including its trailing `:` when it carries a payload.
    pub prefix: String,
    /// Everything after the prefix. Empty for bare checkpoints.
    pub payload: String,
}

impl Envelope {
    /// Creates an envelope from a prefix and a payload.
    pub fn new(prefix: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            payload: payload.into(),
        }
    }

    /// Creates a payload-less envelope such as `ready`.
    pub fn bare(prefix: impl Into<String>) -> Self {
        Self::new(prefix, String::new())
    }

    /// Encodes `value` with `codec` and puts it behind `prefix`.
    pub fn encode<C: Codec, T: Serialize>(
        codec: &C,
        prefix: &str,
        value: &T,
    ) -> Result<Self, ProtocolError> {
        Ok(Self::new(prefix, codec.encode(value)?))
    }

    /// Decodes the payload with `codec`.
    pub fn decode<C: Codec, T: DeserializeOwned>(
        &self,
        codec: &C,
    ) -> Result<T, ProtocolError> {
        codec.decode(&self.payload)
    }

    /// Splits `line` on `prefix` if the line starts with it.
    pub fn split(line: &str, prefix: &str) -> Option<Self> {
        line.strip_prefix(prefix)
            .map(|payload| Self::new(prefix, payload))
    }

    /// The line as it travels on the wire (without the newline).
    pub fn to_line(&self) -> String {
        let mut line = String::with_capacity(self.prefix.len() + self.payload.len());
        line.push_str(&self.prefix);
        line.push_str(&self.payload);
        line
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prefix, self.payload)
    }
}
