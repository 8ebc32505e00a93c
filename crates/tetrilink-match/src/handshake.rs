//! Pre-game rendezvous.
//!
//! The link is best effort from the handshake's point of view: a line can
//! be lost to a restart on the other side or simply arrive before anyone
//! listens for it. Each checkpoint is therefore a retry-until-acknowledged
//! barrier:
//!
//! ```text
//!   host                              peer
//!   ready ─────────────────────────▶  (handler not yet registered, dropped)
//!   ready ─────────────────────────▶  ack:ready, resolve
//!   resolve  ◀──────────────────────  ack:ready
//!   mode:1 ────────────────────────▶  ack:mode, resolve(1)
//!   resolve  ◀──────────────────────  ack:mode
//!   start ◀──────────────────────────▶ start / ack:start
//! ```
//!
//! A barrier resolves on the peer's own request or on its acknowledgement
//! of ours, whichever comes first, and then stops sending. The request
//! handler keeps acknowledging for as long as the coordinator lives, so a
//! lost acknowledgement only costs the peer one more retry. Acknowledgements
//! are never answered.

use std::sync::Arc;

use parking_lot::Mutex;
use tetrilink_protocol::{Checkpoint, prefix};
use tetrilink_session::{Role, Session, SessionState};
use tetrilink_tick::{TickConfig, Ticker};
use tokio::sync::watch;

use crate::{HandshakeConfig, MatchError};

/// Resolution slots, one per checkpoint. The value is the checkpoint's
/// payload (the mode index), or 0 for bare checkpoints.
struct Barriers {
    ready: watch::Sender<Option<u32>>,
    mode: watch::Sender<Option<u32>>,
    start: watch::Sender<Option<u32>>,
    offered_mode: Mutex<Option<u32>>,
}

impl Barriers {
    fn new() -> Self {
        Self {
            ready: watch::channel(None).0,
            mode: watch::channel(None).0,
            start: watch::channel(None).0,
            offered_mode: Mutex::new(None),
        }
    }

    fn slot(&self, checkpoint: Checkpoint) -> &watch::Sender<Option<u32>> {
        match checkpoint {
            Checkpoint::Ready => &self.ready,
            Checkpoint::Mode => &self.mode,
            Checkpoint::Start => &self.start,
        }
    }

    /// Resolves `checkpoint` with `value` unless it is already resolved.
    /// Returns whether this call resolved it.
    fn resolve(&self, checkpoint: Checkpoint, value: u32) -> bool {
        let resolved = self.slot(checkpoint).send_if_modified(|v| {
            if v.is_none() {
                *v = Some(value);
                true
            } else {
                false
            }
        });
        if resolved {
            tracing::info!(%checkpoint, value, "handshake checkpoint resolved");
        }
        resolved
    }

    fn value(&self, checkpoint: Checkpoint) -> Option<u32> {
        *self.slot(checkpoint).borrow()
    }
}

/// Runs the ready / mode / start exchange over a session.
///
/// Dropping the coordinator unregisters its handlers.
pub struct HandshakeCoordinator {
    session: Session,
    config: HandshakeConfig,
    barriers: Arc<Barriers>,
}

impl HandshakeCoordinator {
    pub fn new(session: Session, config: HandshakeConfig) -> Self {
        let barriers = Arc::new(Barriers::new());

        let acks = Arc::clone(&barriers);
        session.add_callback(prefix::ACK, move |name| {
            match Checkpoint::from_name(name) {
                Some(Checkpoint::Mode) => {
                    let offered = *acks.offered_mode.lock();
                    if let Some(mode) = offered {
                        acks.resolve(Checkpoint::Mode, mode);
                    }
                }
                Some(cp) => {
                    acks.resolve(cp, 0);
                }
                None => tracing::warn!(name, "acknowledgement for unknown checkpoint dropped"),
            }
        });

        Self {
            session,
            config,
            barriers,
        }
    }

    /// Runs the full exchange for this session's role and returns the agreed
    /// mode. The host's `preferred_mode` wins; a peer's is ignored.
    pub async fn negotiate(&self, preferred_mode: u32) -> Result<u32, MatchError> {
        self.barrier(Checkpoint::Ready).await?;
        let mode = match self.session.role() {
            Role::Host => {
                self.offer_mode(preferred_mode).await?;
                preferred_mode
            }
            Role::Peer => self.await_mode().await?,
        };
        self.barrier(Checkpoint::Start).await?;
        Ok(mode)
    }

    /// A symmetric barrier (`ready` or `start`): resolves once both sides
    /// reached it. Returns immediately if it already resolved.
    pub async fn barrier(&self, checkpoint: Checkpoint) -> Result<(), MatchError> {
        if self.barriers.value(checkpoint).is_some() {
            return Ok(());
        }

        let session = self.session.downgrade();
        let barriers = Arc::clone(&self.barriers);
        self.session.add_callback(checkpoint.request_prefix(), move |_| {
            if let Some(session) = session.upgrade() {
                session.send(&checkpoint.ack_line());
            }
            barriers.resolve(checkpoint, 0);
        });

        self.retry_until_resolved(checkpoint, &checkpoint.request_line(None))
            .await
            .map(|_| ())
    }

    /// Host side of the mode checkpoint: sends `mode:<index>` until the
    /// peer acknowledges it.
    pub async fn offer_mode(&self, mode: u32) -> Result<(), MatchError> {
        *self.barriers.offered_mode.lock() = Some(mode);
        self.retry_until_resolved(Checkpoint::Mode, &Checkpoint::Mode.request_line(Some(mode)))
            .await
            .map(|_| ())
    }

    /// Peer side of the mode checkpoint: waits for the host's choice,
    /// acknowledging every copy that arrives.
    pub async fn await_mode(&self) -> Result<u32, MatchError> {
        let session = self.session.downgrade();
        let barriers = Arc::clone(&self.barriers);
        self.session.add_callback(prefix::MODE, move |payload| {
            let Ok(mode) = payload.trim().parse::<u32>() else {
                tracing::warn!(payload, "malformed mode dropped");
                return;
            };
            if let Some(session) = session.upgrade() {
                session.send(&Checkpoint::Mode.ack_line());
            }
            barriers.resolve(Checkpoint::Mode, mode);
        });

        self.wait_resolved(Checkpoint::Mode, None).await
    }

    /// Whether `checkpoint` has resolved.
    pub fn is_resolved(&self, checkpoint: Checkpoint) -> bool {
        self.barriers.value(checkpoint).is_some()
    }

    async fn retry_until_resolved(
        &self,
        checkpoint: Checkpoint,
        line: &str,
    ) -> Result<u32, MatchError> {
        let ticker = Ticker::new(TickConfig::every(self.config.retry_interval).immediate());
        self.wait_resolved(checkpoint, Some((ticker, line))).await
    }

    /// Waits for `checkpoint`, resending `line` on every tick if given.
    async fn wait_resolved(
        &self,
        checkpoint: Checkpoint,
        mut resend: Option<(Ticker, &str)>,
    ) -> Result<u32, MatchError> {
        let mut resolved = self.barriers.slot(checkpoint).subscribe();
        let mut state = self.session.watch_state();

        loop {
            if let Some(value) = *resolved.borrow_and_update() {
                return Ok(value);
            }
            if let SessionState::Disconnected(reason) = &*state.borrow_and_update() {
                return Err(MatchError::Disconnected(reason.clone()));
            }

            tokio::select! {
                biased;
                _ = resolved.changed() => {}
                _ = state.changed() => {}
                _ = tick(&mut resend) => {
                    if let Some((ticker, line)) = &resend {
                        tracing::debug!(%checkpoint, attempt = ticker.tick_count(), "sending checkpoint");
                        self.session.send(line);
                    }
                }
            }
        }
    }
}

/// Waits for the next resend tick, or forever when there is nothing to
/// resend.
async fn tick(resend: &mut Option<(Ticker, &str)>) {
    match resend {
        Some((ticker, _)) => {
            ticker.wait_for_tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

impl Drop for HandshakeCoordinator {
    fn drop(&mut self) {
        self.session.remove_callback(prefix::ACK);
        self.session.remove_callback(prefix::READY);
        self.session.remove_callback(prefix::START);
        if self.session.role() == Role::Peer {
            self.session.remove_callback(prefix::MODE);
        }
    }
}
