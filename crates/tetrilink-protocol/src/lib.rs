//! Wire protocol for Tetrilink.
//!
//! This crate defines what two clients say to each other:
//!
//! - **Envelopes and prefixes** ([`Envelope`], [`prefix`]): every line is a
//!   reserved prefix plus an optional payload.
//! - **State** ([`GameStateSnapshot`], [`AttackBlockPacket`]): the
//!   structured payloads behind `board:` and `attack-generate:`.
//! - **Events** ([`GameEvent`], [`ItemEffect`]): one-shot gameplay events.
//! - **Control** ([`Checkpoint`], [`Probe`]): handshake and heartbeat lines.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): payload text encoding.
//!
//! # Architecture
//!
//! ```text
//! Transport (lines) → Protocol (Envelope, payloads) → Session (routing)
//! ```
//!
//! Nothing here touches sockets or clocks other than [`unix_millis`].

mod codec;
mod control;
mod envelope;
mod error;
mod event;
mod snapshot;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use control::{Checkpoint, Probe, unix_millis};
pub use envelope::{Envelope, prefix};
pub use error::ProtocolError;
pub use event::{GameEvent, ItemEffect};
pub use snapshot::{
    AttackBlockPacket, BOARD_HEIGHT, BOARD_WIDTH, Cell, GameStateSnapshot, ItemTag,
    PieceOverlay,
};
