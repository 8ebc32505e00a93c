//! Payload compatibility tests: field names on the wire and full
//! encode/decode of the structured payloads.

use tetrilink_protocol::{
    AttackBlockPacket, Cell, Codec, Envelope, GameEvent, GameStateSnapshot, ItemTag,
    JsonCodec, PieceOverlay, prefix,
};

fn sample_snapshot() -> GameStateSnapshot {
    let mut s = GameStateSnapshot::empty(10, 20);
    s.capture_time_millis = 1_700_000_000_000;
    s.board_cells[19][0] = Cell::filled(2, 1);
    s.board_cells[19][1] = Cell {
        bomb: true,
        item: Some(ItemTag(4)),
        ..Cell::filled(5, 9)
    };
    s.active_piece_overlay = Some(PieceOverlay {
        kind: 3,
        color: 3,
        cells: vec![[4, 0], [5, 0], [4, 1], [5, 1]],
    });
    s.next_piece_identity = 6;
    s.pending_special_item_tag = Some(ItemTag(2));
    s.score = 1200;
    s.speed_multiplier = 1.5;
    s.elapsed_seconds = 75;
    s.fall_interval_per_player = [800, 650];
    s
}

#[test]
fn test_attack_packet_round_trip_preserves_columns() {
    let pattern = [1, 0, 1, 1, 0, 0, 0, 0, 0, 1];
    let occupancy: Vec<bool> = pattern.iter().map(|&b| b == 1).collect();
    let colors: Vec<u8> = (0..10).map(|x| if pattern[x] == 1 { 8 } else { 0 }).collect();
    let types: Vec<u8> = (0..10).map(|x| x as u8 % 3).collect();

    let packet =
        AttackBlockPacket::new(occupancy.clone(), colors.clone(), types.clone()).unwrap();
    let env = GameEvent::AttackGenerated(packet.clone())
        .to_envelope(&JsonCodec)
        .unwrap();
    let line = env.to_line();
    assert!(line.starts_with(prefix::ATTACK_GENERATE));

    let back = Envelope::split(&line, prefix::ATTACK_GENERATE).unwrap();
    let GameEvent::AttackGenerated(decoded) =
        GameEvent::from_envelope(&back, &JsonCodec).unwrap()
    else {
        panic!("expected an attack event");
    };
    assert_eq!(decoded.board_width, 10);
    assert_eq!(decoded.occupancy_pattern, occupancy);
    assert_eq!(decoded.color_per_column, colors);
    assert_eq!(decoded.block_type_per_column, types);
}

#[test]
fn test_snapshot_round_trip_is_identical() {
    let snapshot = sample_snapshot();
    let env = Envelope::encode(&JsonCodec, prefix::BOARD, &snapshot).unwrap();
    let decoded: GameStateSnapshot = env.decode(&JsonCodec).unwrap();
    assert_eq!(decoded, snapshot);
    assert!(decoded.validate().is_ok());
}

#[test]
fn test_snapshot_wire_field_names() {
    let text = JsonCodec.encode(&sample_snapshot()).unwrap();
    for field in [
        "captureTimeMillis",
        "boardCells",
        "activePieceOverlay",
        "nextPieceIdentity",
        "pendingSpecialItemTag",
        "speedMultiplier",
        "difficultyMultiplier",
        "elapsedSeconds",
        "gameOverFlag",
        "pauseFlag",
        "fallIntervalPerPlayer",
        "blockType",
    ] {
        assert!(text.contains(field), "missing field {field} in {text}");
    }
}

#[test]
fn test_attack_packet_wire_field_names() {
    let packet = AttackBlockPacket::from_cells(&[Cell::filled(1, 1), Cell::default()]);
    let text = JsonCodec.encode(&packet).unwrap();
    for field in [
        "boardWidth",
        "occupancyPattern",
        "colorPerColumn",
        "blockTypePerColumn",
    ] {
        assert!(text.contains(field), "missing field {field} in {text}");
    }
}
