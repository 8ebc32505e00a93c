//! Shared fixtures for match integration tests.
//!
//! [`LineRelay`] sits between the two clients on localhost and can delay
//! every line and drop the first few non-heartbeat lines in each direction,
//! which is how the tests model a lossy, slow link.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tetrilink_match::{BoardSink, BoardSource, Match, MatchConfig, MatchObserver};
use tetrilink_protocol::{AttackBlockPacket, GameStateSnapshot, ItemEffect};
use tetrilink_session::{DisconnectReason, Session, SessionConfig};
use tetrilink_transport::LineListener;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::Instant;

// =========================================================================
// LineRelay
// =========================================================================

/// How the relay mangles traffic.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkProfile {
    /// One-way delay added to every line.
    pub delay: Duration,
    /// Non-heartbeat lines dropped at the start of each direction.
    pub drop_first: usize,
}

/// Forwards lines between a client and an upstream address.
pub struct LineRelay {
    pub addr: String,
    pub dropped: Arc<AtomicUsize>,
}

impl LineRelay {
    /// Listens on an ephemeral port; the first client to connect is bridged
    /// to `upstream`.
    pub async fn start(upstream: String, profile: LinkProfile) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("relay binds");
        let addr = listener.local_addr().expect("relay address").to_string();
        let dropped = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&dropped);
        tokio::spawn(async move {
            let Ok((client, _)) = listener.accept().await else { return };
            let Ok(server) = TcpStream::connect(&upstream).await else { return };
            let (client_r, client_w) = client.into_split();
            let (server_r, server_w) = server.into_split();
            tokio::spawn(pipe(client_r, server_w, profile, Arc::clone(&counter)));
            tokio::spawn(pipe(server_r, client_w, profile, counter));
        });

        Self { addr, dropped }
    }

    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }
}

fn is_heartbeat(line: &str) -> bool {
    line.starts_with("ping:") || line.starts_with("pong:")
}

/// One direction: the reader timestamps lines, the writer releases each
/// one `delay` after it arrived, preserving order.
async fn pipe(
    reader: OwnedReadHalf,
    mut writer: OwnedWriteHalf,
    profile: LinkProfile,
    dropped: Arc<AtomicUsize>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<(Instant, String)>();

    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        let mut to_drop = profile.drop_first;
        while let Ok(Some(line)) = lines.next_line().await {
            if to_drop > 0 && !is_heartbeat(&line) {
                to_drop -= 1;
                dropped.fetch_add(1, Ordering::SeqCst);
                continue;
            }
            if tx.send((Instant::now() + profile.delay, line)).is_err() {
                break;
            }
        }
    });

    while let Some((due, line)) = rx.recv().await {
        tokio::time::sleep_until(due).await;
        let mut frame = line.into_bytes();
        frame.push(b'\n');
        if writer.write_all(&frame).await.is_err() {
            break;
        }
    }
    let _ = writer.shutdown().await;
}

// =========================================================================
// Sessions
// =========================================================================

/// A host and a peer session, optionally through a relay.
pub async fn sessions(profile: Option<LinkProfile>) -> (Session, Session, Option<LineRelay>) {
    let listener = LineListener::bind("127.0.0.1:0").await.expect("host binds");
    let host_addr = listener.local_addr().expect("host address").to_string();

    let relay = match profile {
        Some(profile) => Some(LineRelay::start(host_addr.clone(), profile).await),
        None => None,
    };
    let dial = relay.as_ref().map_or(host_addr, |r| r.addr.clone());

    let (host, peer) = tokio::join!(
        Session::accept(&listener, SessionConfig::default()),
        Session::connect(&dial, SessionConfig::default()),
    );
    (host.expect("host accepts"), peer.expect("peer connects"), relay)
}

// =========================================================================
// Game doubles
// =========================================================================

/// A local board whose score can be bumped from the test.
#[derive(Default)]
pub struct TestBoard {
    pub score: AtomicU64,
    pub paused: std::sync::atomic::AtomicBool,
}

impl BoardSource for TestBoard {
    fn read_local_snapshot(&self) -> GameStateSnapshot {
        let mut s = GameStateSnapshot::empty(10, 20);
        s.score = self.score.load(Ordering::SeqCst);
        s.pause_flag = self.paused.load(Ordering::SeqCst);
        s
    }
}

/// Keeps every snapshot applied to the opponent view.
#[derive(Default)]
pub struct TestSink {
    pub applied: Mutex<Vec<GameStateSnapshot>>,
}

impl BoardSink for TestSink {
    fn apply_remote_snapshot(&self, snapshot: GameStateSnapshot) {
        self.applied.lock().push(snapshot);
    }
}

/// Records every observer notification.
#[derive(Default)]
pub struct Recorder {
    pub started: Mutex<Vec<u32>>,
    pub disconnects: Mutex<Vec<DisconnectReason>>,
    pub latency_updates: AtomicUsize,
    pub paused: Mutex<Vec<bool>>,
    pub game_over: AtomicUsize,
    pub items: Mutex<Vec<ItemEffect>>,
    pub attacks: Mutex<Vec<AttackBlockPacket>>,
}

impl MatchObserver for Recorder {
    fn on_latency_update(&self, _average_ms: u64) {
        self.latency_updates.fetch_add(1, Ordering::SeqCst);
    }
    fn on_disconnected(&self, reason: &DisconnectReason) {
        self.disconnects.lock().push(reason.clone());
    }
    fn on_match_started(&self, mode: u32) {
        self.started.lock().push(mode);
    }
    fn on_opponent_paused(&self, paused: bool) {
        self.paused.lock().push(paused);
    }
    fn on_opponent_game_over(&self) {
        self.game_over.fetch_add(1, Ordering::SeqCst);
    }
    fn on_item(&self, effect: ItemEffect) {
        self.items.lock().push(effect);
    }
    fn on_attack_received(&self, packet: &AttackBlockPacket) {
        self.attacks.lock().push(packet.clone());
    }
}

/// One side of a match together with its doubles.
pub struct Side {
    pub game: Match,
    pub board: Arc<TestBoard>,
    pub sink: Arc<TestSink>,
    pub recorder: Arc<Recorder>,
}

impl Side {
    pub fn new(session: Session) -> Self {
        let board = Arc::new(TestBoard::default());
        let sink = Arc::new(TestSink::default());
        let recorder = Arc::new(Recorder::default());
        let game = Match::new(
            session,
            MatchConfig::default(),
            board.clone(),
            sink.clone(),
            recorder.clone(),
        );
        Self { game, board, sink, recorder }
    }
}

pub async fn within<F: std::future::Future>(limit: Duration, fut: F) -> F::Output {
    tokio::time::timeout(limit, fut).await.expect("should finish in time")
}
