//! Handshake convergence over real localhost links, clean and lossy.

mod common;

use std::time::Duration;

use common::{LinkProfile, Side, sessions, within};
use tetrilink_match::{HandshakeConfig, HandshakeCoordinator, MatchError};
use tetrilink_protocol::Checkpoint;
use tetrilink_session::DisconnectReason;

const LIMIT: Duration = Duration::from_secs(5);

// =========================================================================
// Coordinator
// =========================================================================

#[tokio::test]
async fn test_negotiate_host_mode_wins() {
    let (host, peer, _) = sessions(None).await;
    let host_hs = HandshakeCoordinator::new(host, HandshakeConfig::default());
    let peer_hs = HandshakeCoordinator::new(peer, HandshakeConfig::default());

    let (h, p) = within(LIMIT, async { tokio::join!(host_hs.negotiate(1), peer_hs.negotiate(7)) }).await;
    assert_eq!(h.unwrap(), 1);
    assert_eq!(p.unwrap(), 1);
    for cp in [Checkpoint::Ready, Checkpoint::Mode, Checkpoint::Start] {
        assert!(host_hs.is_resolved(cp));
        assert!(peer_hs.is_resolved(cp));
    }
}

#[tokio::test]
async fn test_negotiate_with_late_peer_converges() {
    let (host, peer, _) = sessions(None).await;
    let host_hs = HandshakeCoordinator::new(host, HandshakeConfig::default());

    let late_peer = async {
        // The host's first few `ready` lines find no handler.
        tokio::time::sleep(Duration::from_millis(350)).await;
        let peer_hs = HandshakeCoordinator::new(peer, HandshakeConfig::default());
        peer_hs.negotiate(0).await
    };

    let (h, p) = within(LIMIT, async { tokio::join!(host_hs.negotiate(2), late_peer) }).await;
    assert_eq!(h.unwrap(), 2);
    assert_eq!(p.unwrap(), 2);
}

#[tokio::test]
async fn test_barrier_already_resolved_returns_immediately() {
    let (host, peer, _) = sessions(None).await;
    let host_hs = HandshakeCoordinator::new(host, HandshakeConfig::default());
    let peer_hs = HandshakeCoordinator::new(peer, HandshakeConfig::default());

    let (h, p) = within(LIMIT, async {
        tokio::join!(host_hs.barrier(Checkpoint::Ready), peer_hs.barrier(Checkpoint::Ready))
    })
    .await;
    h.unwrap();
    p.unwrap();

    within(Duration::from_millis(50), host_hs.barrier(Checkpoint::Ready))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_negotiate_fails_when_peer_leaves() {
    let (host, peer, _) = sessions(None).await;
    let peer_hs = HandshakeCoordinator::new(peer, HandshakeConfig::default());

    let leave = async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        host.release();
    };
    let (result, ()) = within(LIMIT, async { tokio::join!(peer_hs.negotiate(0), leave) }).await;

    assert!(matches!(
        result,
        Err(MatchError::Disconnected(DisconnectReason::PeerClosed))
    ));
}

// =========================================================================
// Lossy link
// =========================================================================

#[tokio::test]
async fn test_handshake_survives_two_dropped_lines_each_way() {
    let profile = LinkProfile {
        delay: Duration::from_millis(20),
        drop_first: 2,
    };
    let (host, peer, relay) = sessions(Some(profile)).await;
    let host = Side::new(host);
    let peer = Side::new(peer);

    let (h, p) = within(LIMIT, async { tokio::join!(host.game.start(1), peer.game.start(0)) }).await;
    assert_eq!(h.unwrap(), 1);
    assert_eq!(p.unwrap(), 1);
    assert_eq!(relay.map(|r| r.dropped()), Some(4));

    // Retries still in flight must not start anything twice.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(*host.recorder.started.lock(), vec![1]);
    assert_eq!(*peer.recorder.started.lock(), vec![1]);
    assert!(matches!(host.game.start(1).await, Err(MatchError::AlreadyStarted)));
    assert_eq!(host.game.mode(), Some(1));
    assert_eq!(peer.game.mode(), Some(1));
}
