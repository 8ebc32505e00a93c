//! # Tetrilink
//!
//! Peer-to-peer versus play for falling-block games.
//!
//! One client hosts, the other joins. Once connected, the two sides agree on
//! a game mode through a small retrying handshake, then stream full board
//! snapshots to each other and exchange one-shot events (attack rows, items,
//! pause toggles). Heartbeats and snapshot ages feed a latency monitor that
//! ends the match when lag is sustained rather than momentary.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tetrilink::prelude::*;
//!
//! struct Board;
//!
//! impl BoardSource for Board {
//!     fn read_local_snapshot(&self) -> GameStateSnapshot {
//!         GameStateSnapshot::empty(BOARD_WIDTH, BOARD_HEIGHT)
//!     }
//! }
//!
//! # async fn run() -> Result<(), TetrilinkError> {
//! tetrilink::logging::init();
//!
//! let lobby = ClientBuilder::host("0.0.0.0:7777")
//!     .board(Arc::new(Board))
//!     .bind()
//!     .await?;
//! let game = lobby.accept().await?;
//! let mode = game.start(1).await?;
//! let reason = game.finished().await;
//! # let _ = (mode, reason);
//! # Ok(())
//! # }
//! ```
//!
//! ## Crates
//!
//! | crate | concern |
//! |-------|---------|
//! | `tetrilink-transport` | newline-framed TCP |
//! | `tetrilink-protocol` | prefixes, payloads, codec |
//! | `tetrilink-tick` | fixed-interval ticking |
//! | `tetrilink-session` | routing, heartbeat, teardown |
//! | `tetrilink-match` | handshake, sync, events, latency |

mod client;
mod error;
pub mod logging;

pub use client::{ClientBuilder, Lobby};
pub use error::TetrilinkError;

pub use tetrilink_match as versus;
pub use tetrilink_protocol as protocol;
pub use tetrilink_session as session;
pub use tetrilink_tick as tick;
pub use tetrilink_transport as transport;

/// Everything a game client usually needs.
pub mod prelude {
    pub use crate::{ClientBuilder, Lobby, TetrilinkError};
    pub use tetrilink_match::{
        BoardSink, BoardSource, LatencyReport, LatencyTier, Match, MatchConfig, MatchObserver,
        MirroredBoard,
    };
    pub use tetrilink_protocol::{
        AttackBlockPacket, BOARD_HEIGHT, BOARD_WIDTH, Cell, GameEvent, GameStateSnapshot,
        ItemEffect,
    };
    pub use tetrilink_session::{DisconnectReason, Role, SessionConfig};
}
