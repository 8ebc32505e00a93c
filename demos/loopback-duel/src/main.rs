//! Two clients in one process, talking over localhost.
//!
//! The host and the joiner each get a toy board. They agree on a mode,
//! stream snapshots, trade an attack row, an item and a pause, then the
//! host leaves.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tetrilink::prelude::*;

// ---------------------------------------------------------------------------
// Toy board
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ToyBoard {
    score: AtomicU64,
    paused: AtomicBool,
}

impl ToyBoard {
    /// Pretends `n` lines were cleared and returns the row that would be
    /// sent as an attack.
    fn clear_lines(&self, n: u64) -> Vec<Cell> {
        self.score.fetch_add(100 * n * n, Ordering::SeqCst);
        (0..BOARD_WIDTH)
            .map(|x| {
                if x % 3 == 1 {
                    Cell::default()
                } else {
                    Cell::filled(8, 0)
                }
            })
            .collect()
    }
}

impl BoardSource for ToyBoard {
    fn read_local_snapshot(&self) -> GameStateSnapshot {
        let mut s = GameStateSnapshot::empty(BOARD_WIDTH, BOARD_HEIGHT);
        s.score = self.score.load(Ordering::SeqCst);
        s.pause_flag = self.paused.load(Ordering::SeqCst);
        s
    }
}

// ---------------------------------------------------------------------------
// Console UI
// ---------------------------------------------------------------------------

struct Console {
    name: &'static str,
}

impl MatchObserver for Console {
    fn on_match_started(&self, mode: u32) {
        tracing::info!(side = self.name, mode, "match started");
    }

    fn on_latency_update(&self, average_ms: u64) {
        tracing::debug!(side = self.name, average_ms, "latency");
    }

    fn on_opponent_paused(&self, paused: bool) {
        tracing::info!(side = self.name, paused, "opponent pause toggled");
    }

    fn on_item(&self, effect: ItemEffect) {
        tracing::info!(side = self.name, ?effect, "item hit");
    }

    fn on_attack_received(&self, packet: &AttackBlockPacket) {
        let filled = packet.occupancy_pattern.iter().filter(|&&b| b).count();
        tracing::info!(side = self.name, filled, "attack row incoming");
    }

    fn on_disconnected(&self, reason: &DisconnectReason) {
        tracing::info!(side = self.name, %reason, "disconnected");
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

async fn duel() -> Result<(), TetrilinkError> {
    let host_board = Arc::new(ToyBoard::default());
    let peer_board = Arc::new(ToyBoard::default());

    let lobby = ClientBuilder::host("127.0.0.1:0")
        .board(host_board.clone())
        .observer(Arc::new(Console { name: "host" }))
        .bind()
        .await?;
    let addr = lobby.local_addr()?.to_string();

    let join = ClientBuilder::join(&addr)
        .board(peer_board.clone())
        .observer(Arc::new(Console { name: "peer" }))
        .connect();
    let (host, peer) = tokio::join!(lobby.accept(), join);
    let (host, peer) = (host?, peer?);

    let (host_mode, peer_mode) = tokio::join!(host.start(3), peer.start(1));
    let (host_mode, peer_mode) = (host_mode?, peer_mode?);
    tracing::info!(host = host_mode, peer = peer_mode, "modes agreed");

    let row = host_board.clear_lines(4);
    host.events().send_attack_for_clear(4, &row)?;
    host.events()
        .send_item(ItemEffect::SpeedUp { duration_ms: 5_000 })?;

    peer_board.paused.store(true, Ordering::SeqCst);
    peer.events().send_pause(true)?;

    tokio::time::sleep(Duration::from_millis(500)).await;

    let garbage = peer.events().take_incoming_garbage();
    tracing::info!(rows = garbage.len(), "peer took garbage");

    tokio::time::sleep(Duration::from_millis(300)).await;

    let seen = peer.opponent().current().map(|s| s.score);
    tracing::info!(
        host_score = host_board.score.load(Ordering::SeqCst),
        mirrored = ?seen,
        pending = host.events().pending_outgoing(),
        latency = ?peer.latency(),
        "state after exchange"
    );

    host.release();
    let reason = peer.finished().await;
    tracing::info!(%reason, "peer session ended");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tetrilink::logging::init();
    duel().await?;
    Ok(())
}
