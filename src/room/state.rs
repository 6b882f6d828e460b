//! Room state and its transitions
//!
//! A room is either waiting for an opponent or has both seats taken. An empty
//! room is not a state: it is removed from the directory instead.

use crate::error::RoomError;
use crate::types::{Color, ConnectionId, PlayerInfo, RoomName, RoomSnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of seats in a room
pub const ROOM_CAPACITY: usize = 2;

/// Observable state of a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomState {
    /// One member, waiting for an opponent
    Waiting,
    /// Both seats taken
    Active,
}

impl std::fmt::Display for RoomState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoomState::Waiting => write!(f, "waiting"),
            RoomState::Active => write!(f, "active"),
        }
    }
}

/// A seated connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub id: ConnectionId,
    pub color: Color,
}

impl Member {
    fn info(&self) -> PlayerInfo {
        PlayerInfo {
            id: self.id.clone(),
            color: self.color,
        }
    }
}

#[derive(Debug, Clone)]
enum Seats {
    Waiting { host: Member },
    Active { members: [Member; 2] },
}

/// A named pairing slot for two connections
#[derive(Debug, Clone)]
pub struct Room {
    name: RoomName,
    seats: Seats,
    created_at: DateTime<Utc>,
}

/// Result of removing a member from a room
#[derive(Debug)]
pub enum Departure {
    /// The member left and others remain
    Remaining(Room),
    /// The last member left; the room must be dropped
    Vacated,
    /// The connection was not seated here; the room is unchanged
    NotMember(Room),
}

impl Room {
    /// Open a room with its creator seated as white
    pub fn open(name: impl Into<RoomName>, creator: ConnectionId) -> Self {
        Self {
            name: name.into(),
            seats: Seats::Waiting {
                host: Member {
                    id: creator,
                    color: Color::White,
                },
            },
            created_at: crate::utils::current_timestamp(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> RoomState {
        match self.seats {
            Seats::Waiting { .. } => RoomState::Waiting,
            Seats::Active { .. } => RoomState::Active,
        }
    }

    pub fn is_full(&self) -> bool {
        self.state() == RoomState::Active
    }

    /// Members in join order
    pub fn members(&self) -> &[Member] {
        match &self.seats {
            Seats::Waiting { host } => std::slice::from_ref(host),
            Seats::Active { members } => members,
        }
    }

    pub fn member_count(&self) -> usize {
        self.members().len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members().iter().any(|m| m.id == id)
    }

    pub fn players(&self) -> Vec<PlayerInfo> {
        self.members().iter().map(Member::info).collect()
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room: self.name.clone(),
            players: self.players(),
            player_count: self.member_count(),
        }
    }

    /// Seat a second connection with the color the host does not hold.
    /// Leaves the room untouched on error.
    pub fn admit(&mut self, id: ConnectionId) -> Result<Color, RoomError> {
        let host = match &self.seats {
            Seats::Active { .. } => {
                return Err(RoomError::RoomFull {
                    room: self.name.clone(),
                })
            }
            Seats::Waiting { host } if host.id == id => {
                return Err(RoomError::AlreadyMember {
                    room: self.name.clone(),
                })
            }
            Seats::Waiting { host } => host.clone(),
        };

        let color = host.color.opposite();
        self.seats = Seats::Active {
            members: [host, Member { id, color }],
        };
        Ok(color)
    }

    /// Remove a member, consuming the room
    pub fn depart(self, id: &str) -> Departure {
        if !self.contains(id) {
            return Departure::NotMember(self);
        }

        match self.seats {
            Seats::Waiting { .. } => Departure::Vacated,
            Seats::Active { members } => {
                let [first, second] = members;
                let host = if first.id == id { second } else { first };
                Departure::Remaining(Room {
                    name: self.name,
                    seats: Seats::Waiting { host },
                    created_at: self.created_at,
                })
            }
        }
    }
}
