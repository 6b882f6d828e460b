//! Wire frames exchanged with clients
//!
//! Client → server: `{ "event": "<name>", "data": <payload>, "ack": <id>? }`.
//! Server → client: either a named event `{ "event", "data" }` or the single
//! acknowledgement for a request, `{ "ack": <id>, "data": <ack> }`.

use crate::error::{RelayError, Result};
use crate::types::{Ack, RoomName, ServerEvent};
use serde::{Deserialize, Serialize};

/// Inbound event names
pub const CREATE_ROOM: &str = "create_room";
pub const JOIN_ROOM: &str = "join_room";
pub const CHESS_MOVE_ROOM: &str = "chess_move_room";
pub const PLAYER_COLOR_CHOICE: &str = "player_color_choice";

/// Raw inbound frame, before the payload is interpreted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientFrame {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack: Option<u64>,
}

/// Payload of `chess_move_room`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChessMove {
    pub room: RoomName,
    #[serde(rename = "move", default)]
    pub mv: Option<serde_json::Value>,
}

/// Payload of `player_color_choice`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorChoice {
    pub room: RoomName,
    pub color: String,
}

/// A decoded inbound event
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    CreateRoom(RoomName),
    JoinRoom(RoomName),
    ChessMoveRoom(ChessMove),
    PlayerColorChoice(ColorChoice),
}

impl ClientEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::CreateRoom(_) => CREATE_ROOM,
            ClientEvent::JoinRoom(_) => JOIN_ROOM,
            ClientEvent::ChessMoveRoom(_) => CHESS_MOVE_ROOM,
            ClientEvent::PlayerColorChoice(_) => PLAYER_COLOR_CHOICE,
        }
    }
}

impl ClientFrame {
    pub fn new(event: impl Into<String>, data: serde_json::Value, ack: Option<u64>) -> Self {
        Self {
            event: event.into(),
            data,
            ack,
        }
    }

    /// Parse a text frame
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| {
            RelayError::InvalidFrame {
                reason: format!("Failed to parse client frame: {}", e),
            }
            .into()
        })
    }

    /// Interpret the payload. Returns `Ok(None)` for event names the relay
    /// does not handle.
    pub fn decode(&self) -> std::result::Result<Option<ClientEvent>, RelayError> {
        let event = match self.event.as_str() {
            CREATE_ROOM => ClientEvent::CreateRoom(self.payload()?),
            JOIN_ROOM => ClientEvent::JoinRoom(self.payload()?),
            CHESS_MOVE_ROOM => ClientEvent::ChessMoveRoom(self.payload()?),
            PLAYER_COLOR_CHOICE => ClientEvent::PlayerColorChoice(self.payload()?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    fn payload<T: serde::de::DeserializeOwned>(&self) -> std::result::Result<T, RelayError> {
        serde_json::from_value(self.data.clone()).map_err(|_| RelayError::InvalidFrame {
            reason: format!("Invalid payload for {}.", self.event),
        })
    }
}

/// Outbound frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerFrame {
    Ack { ack: u64, data: Ack },
    Event(ServerEvent),
}

impl ServerFrame {
    /// Serialize the frame to a JSON text message
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            RelayError::InternalError {
                message: format!("Failed to serialize server frame: {}", e),
            }
            .into()
        })
    }

    /// The event carried by this frame, if it is not an acknowledgement
    pub fn event(&self) -> Option<&ServerEvent> {
        match self {
            ServerFrame::Event(event) => Some(event),
            ServerFrame::Ack { .. } => None,
        }
    }
}
