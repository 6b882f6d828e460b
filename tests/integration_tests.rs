//! Integration tests for the chess-relay service
//!
//! These tests drive the relay loop through its handle with fake connections
//! and validate:
//! - The create / join / move / leave lifecycle of a room
//! - Rejections and their acknowledgements
//! - Move relay never echoing to the sender
//! - Concurrent joins racing for the same room

mod fixtures;

use chess_relay::types::{Ack, Color, PlayerInfo, ServerEvent};
use serde_json::json;

use fixtures::{error_message, spawn_relay, TestClient};

fn player(id: &str, color: Color) -> PlayerInfo {
    PlayerInfo {
        id: id.to_string(),
        color,
    }
}

#[tokio::test]
async fn test_complete_room_lifecycle() {
    let relay = spawn_relay();
    let mut a = TestClient::connect(&relay, "A").await;
    let mut b = TestClient::connect(&relay, "B").await;
    let mut c = TestClient::connect(&relay, "C").await;

    // 1. A creates the room and is white
    match a.create_room("ABCDEF").await {
        Ack::Created(created) => {
            assert!(created.success);
            assert_eq!(created.room, "ABCDEF");
            assert_eq!(created.color, Color::White);
        }
        other => panic!("unexpected ack: {:?}", other),
    }
    match a.next_event().await {
        ServerEvent::RoomUpdate(snapshot) => {
            assert_eq!(snapshot.room, "ABCDEF");
            assert_eq!(snapshot.player_count, 1);
            assert_eq!(snapshot.players, vec![player("A", Color::White)]);
        }
        other => panic!("unexpected event: {:?}", other),
    }
    let stats = relay.stats().await.unwrap();
    assert_eq!(stats.waiting_rooms, 1);
    assert_eq!(stats.active_rooms, 0);

    // 2. B joins as black and both get game_start
    let expected_players = vec![player("A", Color::White), player("B", Color::Black)];
    match b.join_room("ABCDEF").await {
        Ack::Joined(joined) => {
            assert!(joined.success);
            assert_eq!(joined.room, "ABCDEF");
            assert_eq!(joined.color, Color::Black);
            assert_eq!(joined.player_count, 2);
            assert_eq!(joined.players, expected_players);
        }
        other => panic!("unexpected ack: {:?}", other),
    }
    for client in [&mut a, &mut b] {
        match client.next_event().await {
            ServerEvent::GameStart(snapshot) => {
                assert_eq!(snapshot.room, "ABCDEF");
                assert_eq!(snapshot.player_count, 2);
                assert_eq!(snapshot.players, expected_players);
            }
            other => panic!("unexpected event for {}: {:?}", client.id, other),
        }
    }

    // 3. C is turned away and nothing changes
    let ack = c.join_room("ABCDEF").await;
    assert_eq!(error_message(&ack), "Room is full.");
    let stats = relay.stats().await.unwrap();
    assert_eq!(stats.active_rooms, 1);
    assert_eq!(stats.seated_connections, 2);
    a.assert_silent().await;
    b.assert_silent().await;

    // 4. A's move reaches B only
    a.emit("chess_move_room", json!({ "room": "ABCDEF", "move": "e2e4" }))
        .await;
    match b.next_event().await {
        ServerEvent::OpponentMoveRoom(opponent_move) => {
            assert_eq!(opponent_move.mv, json!("e2e4"));
            assert_eq!(opponent_move.from_player_id, "A");
        }
        other => panic!("unexpected event: {:?}", other),
    }
    a.assert_silent().await;

    // 5. B leaves; A is told and the room is waiting again
    b.disconnect().await;
    match a.next_event().await {
        ServerEvent::OpponentLeft(left) => {
            assert_eq!(left.room, "ABCDEF");
            assert_eq!(left.player_count, 1);
            assert_eq!(left.disconnected_player_id, "B");
            assert_eq!(left.remaining_players, vec![player("A", Color::White)]);
        }
        other => panic!("unexpected event: {:?}", other),
    }
    let stats = relay.stats().await.unwrap();
    assert_eq!(stats.waiting_rooms, 1);
    assert_eq!(stats.active_rooms, 0);

    // 6. A leaves; the room is gone and the name is free again
    a.disconnect().await;
    let stats = relay.stats().await.unwrap();
    assert_eq!(stats.waiting_rooms, 0);
    assert_eq!(stats.rooms_closed, 1);

    let mut d = TestClient::connect(&relay, "D").await;
    match d.create_room("ABCDEF").await {
        Ack::Created(created) => assert_eq!(created.color, Color::White),
        other => panic!("unexpected ack: {:?}", other),
    }

    c.assert_silent().await;
}

#[tokio::test]
async fn test_rejoin_after_opponent_left() {
    let relay = spawn_relay();
    let mut a = TestClient::connect(&relay, "A").await;
    let mut b = TestClient::connect(&relay, "B").await;

    a.create_room("ROOM01").await;
    b.join_room("ROOM01").await;
    b.disconnect().await;

    // Drain room_update, game_start, opponent_left
    for _ in 0..3 {
        a.next_event().await;
    }

    // The newcomer takes the color the remaining member does not hold
    let mut c = TestClient::connect(&relay, "C").await;
    match c.join_room("ROOM01").await {
        Ack::Joined(joined) => {
            assert_eq!(joined.color, Color::Black);
            assert_eq!(
                joined.players,
                vec![player("A", Color::White), player("C", Color::Black)]
            );
        }
        other => panic!("unexpected ack: {:?}", other),
    }
    assert!(matches!(a.next_event().await, ServerEvent::GameStart(_)));
}

#[tokio::test]
async fn test_host_leaving_frees_white_seat() {
    let relay = spawn_relay();
    let mut a = TestClient::connect(&relay, "A").await;
    let mut b = TestClient::connect(&relay, "B").await;

    a.create_room("ROOM02").await;
    b.join_room("ROOM02").await;
    a.disconnect().await;

    // game_start, then opponent_left
    b.next_event().await;
    match b.next_event().await {
        ServerEvent::OpponentLeft(left) => {
            assert_eq!(left.disconnected_player_id, "A");
            assert_eq!(left.remaining_players, vec![player("B", Color::Black)]);
        }
        other => panic!("unexpected event: {:?}", other),
    }

    // B keeps black, so the next joiner is white
    let mut c = TestClient::connect(&relay, "C").await;
    match c.join_room("ROOM02").await {
        Ack::Joined(joined) => assert_eq!(joined.color, Color::White),
        other => panic!("unexpected ack: {:?}", other),
    }
}

#[tokio::test]
async fn test_rejections() {
    let relay = spawn_relay();
    let mut a = TestClient::connect(&relay, "A").await;
    let mut b = TestClient::connect(&relay, "B").await;

    let ack = a.join_room("NOROOM").await;
    assert_eq!(error_message(&ack), "Room does not exist.");

    a.create_room("ROOM03").await;
    let ack = b.create_room("ROOM03").await;
    assert_eq!(error_message(&ack), "Room already exists.");

    let ack = a.join_room("ROOM03").await;
    assert_eq!(error_message(&ack), "Already in this room.");

    // A seated connection cannot open or join a second room
    let ack = a.create_room("ROOM04").await;
    assert_eq!(error_message(&ack), "Already in another room.");

    b.create_room("ROOM05").await;
    let ack = a.join_room("ROOM05").await;
    assert_eq!(error_message(&ack), "Already in another room.");

    let stats = relay.stats().await.unwrap();
    assert_eq!(stats.rejections, 5);
    assert_eq!(stats.waiting_rooms, 2);
}

#[tokio::test]
async fn test_invalid_payloads_answered() {
    let relay = spawn_relay();
    let mut a = TestClient::connect(&relay, "A").await;

    let ack = a.request("create_room", json!({ "room": "ABCDEF" })).await;
    assert_eq!(error_message(&ack), "Invalid payload for create_room.");

    // Unknown events are ignored outright
    a.emit("offer_draw", json!({ "room": "ABCDEF" })).await;
    a.assert_silent().await;

    let stats = relay.stats().await.unwrap();
    assert_eq!(stats.invalid_frames, 1);
    assert_eq!(stats.rooms_created, 0);
}

#[tokio::test]
async fn test_moves_never_echo() {
    let relay = spawn_relay();
    let mut a = TestClient::connect(&relay, "A").await;
    let mut b = TestClient::connect(&relay, "B").await;

    a.create_room("ROOM06").await;
    b.join_room("ROOM06").await;
    a.next_event().await;
    a.next_event().await;
    b.next_event().await;

    let moves = ["e2e4", "e7e5", "g1f3", "b8c6"];
    for (i, mv) in moves.iter().enumerate() {
        let (sender, receiver) = if i % 2 == 0 {
            (&mut a, &mut b)
        } else {
            (&mut b, &mut a)
        };
        sender
            .emit("chess_move_room", json!({ "room": "ROOM06", "move": mv }))
            .await;

        match receiver.next_event().await {
            ServerEvent::OpponentMoveRoom(opponent_move) => {
                assert_eq!(opponent_move.mv, json!(mv));
                assert_eq!(opponent_move.from_player_id, sender.id);
            }
            other => panic!("unexpected event: {:?}", other),
        }
        sender.assert_silent().await;
    }

    // Structured payloads pass through untouched
    let payload = json!({ "from": "f1", "to": "c4", "promotion": null });
    a.emit("chess_move_room", json!({ "room": "ROOM06", "move": payload }))
        .await;
    match b.next_event().await {
        ServerEvent::OpponentMoveRoom(opponent_move) => assert_eq!(opponent_move.mv, payload),
        other => panic!("unexpected event: {:?}", other),
    }

    assert_eq!(relay.stats().await.unwrap().moves_relayed, 5);
}

#[tokio::test]
async fn test_move_to_waiting_room_goes_nowhere() {
    let relay = spawn_relay();
    let mut a = TestClient::connect(&relay, "A").await;

    a.create_room("ROOM07").await;
    a.next_event().await;

    a.emit("chess_move_room", json!({ "room": "ROOM07", "move": "e2e4" }))
        .await;
    a.emit("chess_move_room", json!({ "room": "NOROOM", "move": "e2e4" }))
        .await;
    a.emit("chess_move_room", json!({ "room": "ROOM07" })).await;
    a.assert_silent().await;
}

#[tokio::test]
async fn test_color_choice_is_noop() {
    let relay = spawn_relay();
    let mut a = TestClient::connect(&relay, "A").await;
    let mut b = TestClient::connect(&relay, "B").await;

    a.create_room("ROOM08").await;
    b.join_room("ROOM08").await;
    a.next_event().await;
    a.next_event().await;
    b.next_event().await;

    a.emit("player_color_choice", json!({ "room": "ROOM08", "color": "b" }))
        .await;
    a.assert_silent().await;
    b.assert_silent().await;

    let stats = relay.stats().await.unwrap();
    assert_eq!(stats.active_rooms, 1);
}

#[tokio::test]
async fn test_disconnect_before_any_room() {
    let relay = spawn_relay();
    let a = TestClient::connect(&relay, "A").await;
    let mut b = TestClient::connect(&relay, "B").await;

    a.disconnect().await;
    b.assert_silent().await;

    let stats = relay.stats().await.unwrap();
    assert_eq!(stats.connections, 1);
    assert_eq!(stats.rooms_closed, 0);
}

#[tokio::test]
async fn test_concurrent_joins_admit_exactly_one() {
    let relay = spawn_relay();
    let mut host = TestClient::connect(&relay, "host").await;
    host.create_room("RACE01").await;

    let mut joins = Vec::new();
    for i in 0..16 {
        let relay = relay.clone();
        joins.push(tokio::spawn(async move {
            let mut client = TestClient::connect(&relay, &format!("joiner-{}", i)).await;
            let ack = client.join_room("RACE01").await;
            (client, ack)
        }));
    }

    let mut admitted = 0;
    let mut turned_away = 0;
    let mut clients = Vec::new();
    for join in joins {
        let (client, ack) = join.await.unwrap();
        match &ack {
            Ack::Joined(joined) => {
                assert_eq!(joined.color, Color::Black);
                admitted += 1;
            }
            Ack::Error(rejected) => {
                assert_eq!(rejected.error, "Room is full.");
                turned_away += 1;
            }
            Ack::Created(_) => panic!("join acknowledged as create"),
        }
        clients.push(client);
    }

    assert_eq!(admitted, 1);
    assert_eq!(turned_away, 15);

    let stats = relay.stats().await.unwrap();
    assert_eq!(stats.active_rooms, 1);
    assert_eq!(stats.seated_connections, 2);
    assert_eq!(stats.games_started, 1);
}

#[tokio::test]
async fn test_concurrent_creates_single_winner() {
    let relay = spawn_relay();

    let mut creates = Vec::new();
    for i in 0..8 {
        let relay = relay.clone();
        creates.push(tokio::spawn(async move {
            let mut client = TestClient::connect(&relay, &format!("creator-{}", i)).await;
            client.create_room("RACE02").await
        }));
    }

    let mut winners = 0;
    for create in creates {
        match create.await.unwrap() {
            Ack::Created(_) => winners += 1,
            ack => assert_eq!(error_message(&ack), "Room already exists."),
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(relay.stats().await.unwrap().waiting_rooms, 1);
}
