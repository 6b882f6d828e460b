//! Common types used throughout the relay service
//!
//! Field names follow the JSON the browser client already speaks, so most
//! payloads are serialized in camelCase.

use serde::{Deserialize, Serialize};

/// Transport-assigned identifier of a live connection
pub type ConnectionId = String;

/// Client-chosen room name
pub type RoomName = String;

/// Side a member plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    #[serde(rename = "w")]
    White,
    #[serde(rename = "b")]
    Black,
}

impl Color {
    /// The other side
    pub fn opposite(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Color::White => write!(f, "w"),
            Color::Black => write!(f, "b"),
        }
    }
}

/// A room member as seen by clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: ConnectionId,
    pub color: Color,
}

/// Acknowledgement for a successful `create_room`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomCreated {
    pub success: bool,
    pub room: RoomName,
    pub color: Color,
}

/// Acknowledgement for a successful `join_room`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomJoined {
    pub success: bool,
    pub room: RoomName,
    pub color: Color,
    pub player_count: usize,
    pub players: Vec<PlayerInfo>,
}

/// Acknowledgement for a rejected request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejected {
    pub error: String,
}

/// Single response returned to the sender of an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Ack {
    Joined(RoomJoined),
    Created(RoomCreated),
    Error(Rejected),
}

impl Ack {
    pub fn error(message: impl Into<String>) -> Self {
        Ack::Error(Rejected {
            error: message.into(),
        })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Ack::Error(_))
    }
}

/// Room membership snapshot sent with `room_update` and `game_start`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room: RoomName,
    pub players: Vec<PlayerInfo>,
    pub player_count: usize,
}

/// Move forwarded to the opponent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpponentMove {
    #[serde(rename = "move")]
    pub mv: serde_json::Value,
    pub from_player_id: ConnectionId,
}

/// Sent to the members left behind when someone disconnects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpponentLeft {
    pub room: RoomName,
    pub player_count: usize,
    pub disconnected_player_id: ConnectionId,
    pub remaining_players: Vec<PlayerInfo>,
}

/// Greeting sent to a freshly connected client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionAck {
    pub socket_id: ConnectionId,
    pub message: String,
}

/// Named events pushed from the server to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    ConnectionAck(ConnectionAck),
    RoomUpdate(RoomSnapshot),
    GameStart(RoomSnapshot),
    OpponentMoveRoom(OpponentMove),
    OpponentLeft(OpponentLeft),
}

impl ServerEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::ConnectionAck(_) => "connection_ack",
            ServerEvent::RoomUpdate(_) => "room_update",
            ServerEvent::GameStart(_) => "game_start",
            ServerEvent::OpponentMoveRoom(_) => "opponent_move_room",
            ServerEvent::OpponentLeft(_) => "opponent_left",
        }
    }
}
