//! Room directory: the single owner of room state and membership
//!
//! Every mutation goes through one of the transition methods below. Each
//! transition validates against the current state first and either rejects
//! with a [`RoomError`] without touching anything, or applies the change and
//! returns the deliveries (acknowledgement and events) it produced.

use crate::error::RoomError;
use crate::room::state::{Departure, Room, RoomState};
use crate::types::{
    Ack, ConnectionId, OpponentLeft, OpponentMove, RoomCreated, RoomJoined, RoomName, ServerEvent,
};
use crate::utils::is_conventional_room_name;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Something to send as the result of a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// Acknowledgement to the connection that sent the event
    Reply(Ack),
    /// Event to the listed connections
    Emit {
        to: Vec<ConnectionId>,
        event: ServerEvent,
    },
}

/// What a transition changed, for bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Effect {
    #[default]
    Unchanged,
    RoomCreated,
    GameStarted,
    MoveRelayed { recipients: usize },
    MemberLeft { room_closed: bool },
}

/// Ordered deliveries produced by one transition
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Transition {
    pub effect: Effect,
    pub deliveries: Vec<Delivery>,
}

impl Transition {
    fn unchanged() -> Self {
        Self::default()
    }

    /// The acknowledgement, if the transition produced one
    pub fn reply(&self) -> Option<&Ack> {
        self.deliveries.iter().find_map(|d| match d {
            Delivery::Reply(ack) => Some(ack),
            Delivery::Emit { .. } => None,
        })
    }

    /// Events with their recipients, in order
    pub fn emits(&self) -> impl Iterator<Item = (&[ConnectionId], &ServerEvent)> {
        self.deliveries.iter().filter_map(|d| match d {
            Delivery::Emit { to, event } => Some((to.as_slice(), event)),
            Delivery::Reply(_) => None,
        })
    }
}

/// Point-in-time counts of the directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryStats {
    pub waiting_rooms: usize,
    pub active_rooms: usize,
    pub seated_connections: usize,
}

/// Process-wide map of open rooms and of which room each connection sits in
#[derive(Debug, Default)]
pub struct RoomDirectory {
    rooms: HashMap<RoomName, Room>,
    memberships: HashMap<ConnectionId, RoomName>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a room with the sender seated as white
    pub fn create_room(&mut self, name: &str, sender: &str) -> Result<Transition, RoomError> {
        if self.rooms.contains_key(name) {
            return Err(RoomError::RoomAlreadyExists {
                room: name.to_string(),
            });
        }
        self.ensure_unseated(name, sender)?;

        if !is_conventional_room_name(name) {
            debug!("Room name '{}' from '{}' is not a six-character code", name, sender);
        }

        let room = Room::open(name, sender.to_string());
        let color = room.members()[0].color;
        let snapshot = room.snapshot();

        self.rooms.insert(name.to_string(), room);
        self.memberships
            .insert(sender.to_string(), name.to_string());

        info!(
            "'{}' created and joined room '{}' as {} - open rooms: {}",
            sender,
            name,
            color,
            self.rooms.len()
        );

        Ok(Transition {
            effect: Effect::RoomCreated,
            deliveries: vec![
                Delivery::Emit {
                    to: vec![sender.to_string()],
                    event: ServerEvent::RoomUpdate(snapshot),
                },
                Delivery::Reply(Ack::Created(RoomCreated {
                    success: true,
                    room: name.to_string(),
                    color,
                })),
            ],
        })
    }

    /// Seat the sender in a waiting room and start the game
    pub fn join_room(&mut self, name: &str, sender: &str) -> Result<Transition, RoomError> {
        let room = self
            .rooms
            .get(name)
            .ok_or_else(|| RoomError::RoomNotFound {
                room: name.to_string(),
            })?;

        debug!(
            "Join pre-check for room '{}' by '{}' - state: {}, members: {}",
            name,
            sender,
            room.state(),
            room.member_count()
        );

        if room.is_full() {
            return Err(RoomError::RoomFull {
                room: name.to_string(),
            });
        }
        if room.contains(sender) {
            return Err(RoomError::AlreadyMember {
                room: name.to_string(),
            });
        }
        self.ensure_unseated(name, sender)?;

        let room = self
            .rooms
            .get_mut(name)
            .ok_or_else(|| RoomError::RoomNotFound {
                room: name.to_string(),
            })?;
        let color = room.admit(sender.to_string())?;
        let snapshot = room.snapshot();
        let recipients: Vec<ConnectionId> = room.members().iter().map(|m| m.id.clone()).collect();

        self.memberships
            .insert(sender.to_string(), name.to_string());

        info!(
            "'{}' joined room '{}' as {} - game starting with {:?}",
            sender, name, color, recipients
        );

        Ok(Transition {
            effect: Effect::GameStarted,
            deliveries: vec![
                Delivery::Reply(Ack::Joined(RoomJoined {
                    success: true,
                    room: name.to_string(),
                    color,
                    player_count: snapshot.player_count,
                    players: snapshot.players.clone(),
                })),
                Delivery::Emit {
                    to: recipients,
                    event: ServerEvent::GameStart(snapshot),
                },
            ],
        })
    }

    /// Forward an opaque move to every other member of the room.
    /// Unknown rooms and empty moves are dropped silently.
    pub fn relay_move(
        &self,
        name: &str,
        sender: &str,
        mv: Option<serde_json::Value>,
    ) -> Transition {
        let Some(room) = self.rooms.get(name) else {
            debug!("Dropping move from '{}' for unknown room '{}'", sender, name);
            return Transition::unchanged();
        };
        let Some(mv) = mv.filter(is_present_move) else {
            debug!("Dropping empty move from '{}' in room '{}'", sender, name);
            return Transition::unchanged();
        };

        if !room.contains(sender) {
            warn!(
                "'{}' relayed a move into room '{}' without being a member",
                sender, name
            );
        }

        let recipients: Vec<ConnectionId> = room
            .members()
            .iter()
            .filter(|m| m.id != sender)
            .map(|m| m.id.clone())
            .collect();

        if recipients.is_empty() {
            return Transition::unchanged();
        }

        Transition {
            effect: Effect::MoveRelayed {
                recipients: recipients.len(),
            },
            deliveries: vec![Delivery::Emit {
                to: recipients,
                event: ServerEvent::OpponentMoveRoom(OpponentMove {
                    mv,
                    from_player_id: sender.to_string(),
                }),
            }],
        }
    }

    /// Record a client's color preference. Assignment never changes.
    pub fn color_choice(&self, name: &str, sender: &str, color: &str) -> Transition {
        if self.rooms.contains_key(name) {
            info!(
                "Player '{}' in room '{}' states preference for color '{}'",
                sender, name, color
            );
        }
        Transition::unchanged()
    }

    /// Remove a connection from its room, closing the room if it empties
    pub fn disconnect(&mut self, sender: &str) -> Transition {
        let Some(name) = self.memberships.remove(sender) else {
            return Transition::unchanged();
        };
        let Some(room) = self.rooms.remove(&name) else {
            warn!(
                "Membership of '{}' pointed at missing room '{}'",
                sender, name
            );
            return Transition::unchanged();
        };

        match room.depart(sender) {
            Departure::Vacated => {
                info!(
                    "'{}' left room '{}' - room is now empty and closed",
                    sender, name
                );
                Transition {
                    effect: Effect::MemberLeft { room_closed: true },
                    deliveries: Vec::new(),
                }
            }
            Departure::Remaining(room) => {
                let remaining_players = room.players();
                let recipients: Vec<ConnectionId> =
                    remaining_players.iter().map(|p| p.id.clone()).collect();

                info!(
                    "'{}' left room '{}' - players remaining: {}, room is no longer full",
                    sender,
                    name,
                    room.member_count()
                );

                let event = ServerEvent::OpponentLeft(OpponentLeft {
                    room: name.clone(),
                    player_count: room.member_count(),
                    disconnected_player_id: sender.to_string(),
                    remaining_players,
                });
                self.rooms.insert(name, room);

                Transition {
                    effect: Effect::MemberLeft { room_closed: false },
                    deliveries: vec![Delivery::Emit {
                        to: recipients,
                        event,
                    }],
                }
            }
            Departure::NotMember(room) => {
                warn!(
                    "Membership of '{}' pointed at room '{}' which does not seat it",
                    sender, name
                );
                self.rooms.insert(name, room);
                Transition::unchanged()
            }
        }
    }

    pub fn get_room(&self, name: &str) -> Option<&Room> {
        self.rooms.get(name)
    }

    /// Room the connection is seated in
    pub fn room_of(&self, id: &str) -> Option<&Room> {
        self.memberships
            .get(id)
            .and_then(|name| self.rooms.get(name))
    }

    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn stats(&self) -> DirectoryStats {
        let active_rooms = self
            .rooms
            .values()
            .filter(|room| room.state() == RoomState::Active)
            .count();

        DirectoryStats {
            waiting_rooms: self.rooms.len() - active_rooms,
            active_rooms,
            seated_connections: self.memberships.len(),
        }
    }

    fn ensure_unseated(&self, target: &str, sender: &str) -> Result<(), RoomError> {
        match self.memberships.get(sender) {
            Some(current) => Err(RoomError::InAnotherRoom {
                room: target.to_string(),
                current: current.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// A move counts as present unless it is null, false, zero or an empty string
fn is_present_move(mv: &serde_json::Value) -> bool {
    use serde_json::Value;

    match mv {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
