//! One-shot gameplay events: attack rows, timed items and pause toggles.
//!
//! Attack rows use a small bookkeeping protocol on top of the link:
//!
//! ```text
//!   sender                                 receiver
//!   send_attack ─ attack-generate:<row> ─▶ incoming queue
//!   (keeps a copy)                         take_incoming_garbage()
//!   drops copies  ◀──── attack-apply ───── (only when rows were taken)
//! ```
//!
//! A duplicate `attack-apply` finds nothing to drop and is a no-op.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tetrilink_protocol::{
    AttackBlockPacket, Cell, Envelope, GameEvent, ItemEffect, JsonCodec, ProtocolError,
};
use tetrilink_session::Session;

use crate::{MatchObserver, OpponentFlags};

/// Queues and side effects shared with the receive handlers.
pub struct EventState {
    outgoing: Mutex<VecDeque<AttackBlockPacket>>,
    incoming: Mutex<VecDeque<AttackBlockPacket>>,
    flags: Arc<Mutex<OpponentFlags>>,
    observer: Arc<dyn MatchObserver>,
}

impl EventState {
    pub fn new(flags: Arc<Mutex<OpponentFlags>>, observer: Arc<dyn MatchObserver>) -> Self {
        Self {
            outgoing: Mutex::new(VecDeque::new()),
            incoming: Mutex::new(VecDeque::new()),
            flags,
            observer,
        }
    }

    /// Applies one received event. Every event kind is handled here.
    pub fn handle(&self, event: GameEvent) {
        match event {
            GameEvent::AttackGenerated(packet) => {
                self.incoming.lock().push_back(packet.clone());
                tracing::debug!(width = packet.board_width, "attack row queued");
                self.observer.on_attack_received(&packet);
            }
            GameEvent::AttackApplied => {
                let dropped = {
                    let mut outgoing = self.outgoing.lock();
                    let n = outgoing.len();
                    outgoing.clear();
                    n
                };
                tracing::debug!(dropped, "opponent applied our attack rows");
            }
            GameEvent::Item(effect) => {
                tracing::debug!(?effect, "item received");
                self.observer.on_item(effect);
            }
            GameEvent::PauseToggled(paused) => {
                let edge = self.flags.lock().update_paused(paused);
                if let Some(paused) = edge {
                    self.observer.on_opponent_paused(paused);
                }
            }
        }
    }

    fn handle_line(&self, prefix: &str, payload: &str) {
        let env = Envelope::new(prefix, payload);
        match GameEvent::from_envelope(&env, &JsonCodec) {
            Ok(event) => self.handle(event),
            Err(e) => tracing::warn!(prefix, error = %e, "malformed event dropped"),
        }
    }
}

/// Sends and receives [`GameEvent`]s over a session.
///
/// Dropping the channel unregisters its handlers.
pub struct EventChannel {
    session: Session,
    state: Arc<EventState>,
}

impl EventChannel {
    /// Registers a handler for every event prefix.
    pub fn new(session: Session, state: EventState) -> Self {
        let state = Arc::new(state);
        for prefix in GameEvent::PREFIXES {
            let state = Arc::clone(&state);
            session.add_callback(prefix, move |payload| state.handle_line(prefix, payload));
        }
        Self { session, state }
    }

    /// Sends an event as is, without bookkeeping.
    pub fn send(&self, event: &GameEvent) -> Result<(), ProtocolError> {
        let env = event.to_envelope(&JsonCodec)?;
        self.session.send(&env.to_line());
        Ok(())
    }

    /// Sends a penalty row and keeps a copy until the opponent applies it.
    pub fn send_attack(&self, packet: AttackBlockPacket) -> Result<(), ProtocolError> {
        packet.validate()?;
        self.send(&GameEvent::AttackGenerated(packet.clone()))?;
        self.state.outgoing.lock().push_back(packet);
        Ok(())
    }

    /// Sends `row` as an attack if `lines_cleared` is large enough. Returns
    /// whether an attack went out.
    pub fn send_attack_for_clear(
        &self,
        lines_cleared: usize,
        row: &[Cell],
    ) -> Result<bool, ProtocolError> {
        if lines_cleared < AttackBlockPacket::MIN_LINES_FOR_ATTACK {
            return Ok(false);
        }
        self.send_attack(AttackBlockPacket::from_cells(row))?;
        Ok(true)
    }

    /// Drains the queued incoming rows for the local board and, if there
    /// were any, tells the opponent they were applied.
    pub fn take_incoming_garbage(&self) -> Vec<AttackBlockPacket> {
        let rows: Vec<_> = self.state.incoming.lock().drain(..).collect();
        if !rows.is_empty() {
            if let Err(e) = self.send(&GameEvent::AttackApplied) {
                tracing::warn!(error = %e, "attack-apply not sent");
            }
        }
        rows
    }

    pub fn send_item(&self, effect: ItemEffect) -> Result<(), ProtocolError> {
        self.send(&GameEvent::Item(effect))
    }

    pub fn send_pause(&self, paused: bool) -> Result<(), ProtocolError> {
        self.send(&GameEvent::PauseToggled(paused))
    }

    /// Rows sent but not yet applied by the opponent.
    pub fn pending_outgoing(&self) -> usize {
        self.state.outgoing.lock().len()
    }

    /// Rows received but not yet taken by the local board.
    pub fn pending_incoming(&self) -> usize {
        self.state.incoming.lock().len()
    }
}

impl Drop for EventChannel {
    fn drop(&mut self) {
        for prefix in GameEvent::PREFIXES {
            self.session.remove_callback(prefix);
        }
    }
}
