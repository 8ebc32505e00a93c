//! Transport layer for Tetrilink.
//!
//! Provides [`LineListener`] and [`LineConnection`]: a TCP socket wrapped
//! into newline-framed UTF-8 text lines. Everything above this crate
//! (routing, heartbeats, snapshots) only ever sees whole lines.
//!
//! # Guarantees
//!
//! - [`LineConnection::send`] never fails and never blocks. On a closed
//!   connection it logs and drops the line.
//! - [`LineConnection::receive_loop`] runs on its own Tokio task and calls
//!   its `on_closed` callback exactly once, whatever ended the loop.
//! - [`LineConnection::close`] is idempotent.

mod error;
mod line;

pub use error::TransportError;
pub use line::{CloseReason, LineConnection, LineListener};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique label for one TCP link, used in log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocates the next id. Ids start at 1 and are never reused.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link#{}", self.0)
    }
}
