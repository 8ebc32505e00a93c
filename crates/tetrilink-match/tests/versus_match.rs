//! Full matches between two clients on localhost.

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{LinkProfile, Side, sessions, within};
use tetrilink_protocol::{AttackBlockPacket, ItemEffect};
use tetrilink_session::DisconnectReason;

async fn started_pair(profile: Option<LinkProfile>) -> (Side, Side) {
    let (host, peer, _relay) = sessions(profile).await;
    let host = Side::new(host);
    let peer = Side::new(peer);
    let (h, p) = within(Duration::from_secs(5), async {
        tokio::join!(host.game.start(1), peer.game.start(0))
    })
    .await;
    assert_eq!(h.unwrap(), 1);
    assert_eq!(p.unwrap(), 1);
    (host, peer)
}

fn attack_row() -> AttackBlockPacket {
    let pattern = [1, 0, 1, 1, 0, 0, 0, 0, 0, 1];
    AttackBlockPacket::new(
        pattern.iter().map(|&b| b == 1).collect(),
        pattern.iter().map(|&b| if b == 1 { 8 } else { 0 }).collect(),
        vec![7; 10],
    )
    .unwrap()
}

// =========================================================================
// State sync
// =========================================================================

#[tokio::test]
async fn test_snapshots_mirror_the_opponent_board() {
    let (host, peer) = started_pair(None).await;

    host.board.score.store(4_200, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(400)).await;

    let mirror = peer.game.opponent();
    assert_eq!(mirror.current().map(|s| s.score), Some(4_200));
    assert!(mirror.applied_count() >= 2);
    assert!(!peer.sink.applied.lock().is_empty());
    assert!(peer.recorder.latency_updates.load(Ordering::SeqCst) > 0);
    assert!(host.game.opponent().current().is_some());
}

#[tokio::test]
async fn test_pause_flag_reaches_observer_once() {
    let (host, peer) = started_pair(None).await;

    host.board.paused.store(true, Ordering::SeqCst);
    host.game.events().send_pause(true).unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;

    // Both the event and every later snapshot say "paused"; one notification.
    assert_eq!(*peer.recorder.paused.lock(), vec![true]);
}

// =========================================================================
// Events
// =========================================================================

#[tokio::test]
async fn test_attack_round_trip_and_acknowledgement() {
    let (host, peer) = started_pair(None).await;

    host.game.events().send_attack(attack_row()).unwrap();
    assert_eq!(host.game.events().pending_outgoing(), 1);

    within(Duration::from_secs(2), async {
        while peer.game.events().pending_incoming() == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    let rows = peer.game.events().take_incoming_garbage();
    assert_eq!(rows, vec![attack_row()]);
    assert_eq!(rows[0].to_cells().iter().filter(|c| c.occupied).count(), 4);
    assert_eq!(*peer.recorder.attacks.lock(), vec![attack_row()]);

    within(Duration::from_secs(2), async {
        while host.game.events().pending_outgoing() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
}

#[tokio::test]
async fn test_single_line_clear_sends_no_attack() {
    let (host, _peer) = started_pair(None).await;
    let row = attack_row().to_cells();
    assert!(!host.game.events().send_attack_for_clear(1, &row).unwrap());
    assert!(host.game.events().send_attack_for_clear(2, &row).unwrap());
    assert_eq!(host.game.events().pending_outgoing(), 1);
}

#[tokio::test]
async fn test_take_incoming_garbage_when_empty_sends_nothing() {
    let (host, peer) = started_pair(None).await;
    host.game.events().send_attack(attack_row()).unwrap();

    assert!(peer.game.events().take_incoming_garbage().len() <= 1);
    tokio::time::sleep(Duration::from_millis(200)).await;
    let _ = peer.game.events().take_incoming_garbage();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(host.game.events().pending_outgoing(), 0);

    // A second attack stays pending while the peer takes nothing.
    host.game.events().send_attack(attack_row()).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(host.game.events().pending_outgoing(), 1);
}

#[tokio::test]
async fn test_items_reach_the_opponent() {
    let (host, peer) = started_pair(None).await;
    host.game
        .events()
        .send_item(ItemEffect::VisionBlock { duration_ms: 3_000 })
        .unwrap();
    peer.game
        .events()
        .send_item(ItemEffect::SpeedUp { duration_ms: 5_000 })
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(
        *peer.recorder.items.lock(),
        vec![ItemEffect::VisionBlock { duration_ms: 3_000 }]
    );
    assert_eq!(
        *host.recorder.items.lock(),
        vec![ItemEffect::SpeedUp { duration_ms: 5_000 }]
    );
}

// =========================================================================
// Lifecycle
// =========================================================================

#[tokio::test]
async fn test_end_to_end_match_stays_connected() {
    let profile = LinkProfile {
        delay: Duration::from_millis(100),
        drop_first: 0,
    };
    let (host, peer, _relay) = sessions(Some(profile)).await;
    let host = Side::new(host);
    let peer = Side::new(peer);

    // Both handshakes resolve within a second over a 100 ms link.
    let (h, p) = within(Duration::from_secs(1), async {
        tokio::join!(host.game.start(1), peer.game.start(0))
    })
    .await;
    assert_eq!(h.unwrap(), 1);
    assert_eq!(p.unwrap(), 1);

    for score in 1..=11u64 {
        host.board.score.store(score * 100, Ordering::SeqCst);
        peer.board.score.store(score, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    assert!(host.game.is_connected());
    assert!(peer.game.is_connected());
    assert!(host.recorder.disconnects.lock().is_empty());
    assert!(peer.recorder.disconnects.lock().is_empty());
    assert!(peer.game.opponent().applied_count() >= 40);
    assert_eq!(peer.game.opponent().current().map(|s| s.score % 100), Some(0));
    let latency = host.game.latency().expect("samples recorded");
    assert!(!latency.sustained_lag);
}

#[tokio::test]
async fn test_release_notifies_both_sides_once() {
    let (host, peer) = started_pair(None).await;
    host.game.release();
    host.game.release();

    let reason = within(Duration::from_secs(2), peer.game.finished()).await;
    assert_eq!(reason, DisconnectReason::PeerClosed);
    assert_eq!(*host.recorder.disconnects.lock(), vec![DisconnectReason::Released]);
    assert_eq!(*peer.recorder.disconnects.lock(), vec![DisconnectReason::PeerClosed]);
}

#[tokio::test]
async fn test_slow_link_ends_with_sustained_lag() {
    let profile = LinkProfile {
        delay: Duration::from_millis(350),
        drop_first: 0,
    };
    let (host, peer, _relay) = sessions(Some(profile)).await;
    let host = Side::new(host);
    let peer = Side::new(peer);

    let play = async {
        // Either start may fail once the lag check fires.
        let _ = tokio::join!(host.game.start(1), peer.game.start(0));
        tokio::join!(host.game.finished(), peer.game.finished())
    };
    let (h, p) = within(Duration::from_secs(10), play).await;

    assert!(
        h.is_lag() || p.is_lag(),
        "expected a lag disconnect, got {h:?} / {p:?}"
    );
}
