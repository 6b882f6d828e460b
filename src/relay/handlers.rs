//! Event handlers for inbound client events
//!
//! [`RelayHandler`] turns each inbound event into a transition of the room
//! directory and keeps metrics and counters in step. It is plain synchronous
//! state: the relay service owns one instance and feeds it events one at a
//! time.

use crate::error::RelayError;
use crate::metrics::MetricsCollector;
use crate::relay::events::{ClientEvent, ClientFrame};
use crate::room::{Delivery, Effect, RoomDirectory, Transition};
use crate::types::{Ack, ConnectionAck, ServerEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Counters reported by the relay
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayStats {
    /// Currently open connections
    pub connections: usize,
    /// Rooms with one member
    pub waiting_rooms: usize,
    /// Rooms with two members
    pub active_rooms: usize,
    /// Connections seated in a room
    pub seated_connections: usize,
    /// Rooms created since start
    pub rooms_created: u64,
    /// Rooms closed since start
    pub rooms_closed: u64,
    /// Games started since start
    pub games_started: u64,
    /// Moves forwarded since start
    pub moves_relayed: u64,
    /// Requests rejected since start
    pub rejections: u64,
    /// Frames that failed to decode since start
    pub invalid_frames: u64,
}

/// Dispatches inbound events to the room directory
pub struct RelayHandler {
    directory: RoomDirectory,
    metrics: Arc<MetricsCollector>,
    stats: RelayStats,
}

impl Default for RelayHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayHandler {
    /// Create a handler with an empty directory and its own metrics
    pub fn new() -> Self {
        let metrics = Arc::new(MetricsCollector::new().unwrap_or_else(|_| {
            warn!("Failed to create metrics collector, using default");
            MetricsCollector::default()
        }));

        Self::with_metrics(metrics)
    }

    /// Create a handler with an empty directory and a shared metrics collector
    pub fn with_metrics(metrics: Arc<MetricsCollector>) -> Self {
        Self::with_directory(RoomDirectory::new(), metrics)
    }

    /// Create a handler around an existing directory
    pub fn with_directory(directory: RoomDirectory, metrics: Arc<MetricsCollector>) -> Self {
        Self {
            directory,
            metrics,
            stats: RelayStats::default(),
        }
    }

    pub fn directory(&self) -> &RoomDirectory {
        &self.directory
    }

    /// Current counters, with room counts taken from the directory
    pub fn stats(&self) -> RelayStats {
        let directory = self.directory.stats();
        RelayStats {
            waiting_rooms: directory.waiting_rooms,
            active_rooms: directory.active_rooms,
            seated_connections: directory.seated_connections,
            ..self.stats.clone()
        }
    }

    /// Greet a newly connected client
    pub fn handle_connect(&mut self, connection_id: &str) -> Transition {
        self.stats.connections += 1;
        self.metrics.record_connection_opened();

        info!(
            "Client connected: '{}' - open connections: {}",
            connection_id, self.stats.connections
        );

        Transition {
            effect: Effect::Unchanged,
            deliveries: vec![Delivery::Emit {
                to: vec![connection_id.to_string()],
                event: ServerEvent::ConnectionAck(ConnectionAck {
                    socket_id: connection_id.to_string(),
                    message: format!("Welcome, client {}", connection_id),
                }),
            }],
        }
    }

    /// Decode and handle a raw frame. A payload that does not decode yields
    /// an error reply; unknown event names yield nothing.
    pub fn handle_frame(&mut self, sender: &str, frame: &ClientFrame) -> Transition {
        match frame.decode() {
            Ok(Some(event)) => self.handle_event(sender, event),
            Ok(None) => {
                debug!(
                    "Ignoring unknown event '{}' from '{}'",
                    frame.event, sender
                );
                Transition::default()
            }
            Err(RelayError::InvalidFrame { reason }) => {
                warn!(
                    "Rejecting frame '{}' from '{}': {}",
                    frame.event, sender, reason
                );
                self.stats.invalid_frames += 1;
                self.metrics.record_invalid_frame(&frame.event);
                Transition {
                    effect: Effect::Unchanged,
                    deliveries: vec![Delivery::Reply(Ack::error(reason))],
                }
            }
            Err(e) => {
                warn!("Failed to decode frame from '{}': {}", sender, e);
                self.stats.invalid_frames += 1;
                self.metrics.record_invalid_frame(&frame.event);
                Transition {
                    effect: Effect::Unchanged,
                    deliveries: vec![Delivery::Reply(Ack::error(e.to_string()))],
                }
            }
        }
    }

    /// Handle a decoded event
    pub fn handle_event(&mut self, sender: &str, event: ClientEvent) -> Transition {
        let timer = self.metrics.start_timer();
        let name = event.name();

        let result = match event {
            ClientEvent::CreateRoom(room) => self.directory.create_room(&room, sender),
            ClientEvent::JoinRoom(room) => self.directory.join_room(&room, sender),
            ClientEvent::ChessMoveRoom(chess_move) => {
                Ok(self
                    .directory
                    .relay_move(&chess_move.room, sender, chess_move.mv))
            }
            ClientEvent::PlayerColorChoice(choice) => {
                Ok(self
                    .directory
                    .color_choice(&choice.room, sender, &choice.color))
            }
        };

        let transition = match result {
            Ok(transition) => transition,
            Err(e) => {
                warn!(
                    "'{}' failed {} for room '{}': {}",
                    sender,
                    name,
                    e.room(),
                    e
                );
                self.stats.rejections += 1;
                self.metrics.record_rejection(e.kind());
                Transition {
                    effect: Effect::Unchanged,
                    deliveries: vec![Delivery::Reply(Ack::error(e.to_string()))],
                }
            }
        };

        self.record_effect(transition.effect);
        self.metrics.record_event(name, timer.stop());
        transition
    }

    /// Remove a closed connection from its room
    pub fn handle_disconnect(&mut self, connection_id: &str) -> Transition {
        self.stats.connections = self.stats.connections.saturating_sub(1);
        self.metrics.record_connection_closed();

        info!(
            "Client disconnected: '{}' - open connections: {}",
            connection_id, self.stats.connections
        );

        let transition = self.directory.disconnect(connection_id);
        self.record_effect(transition.effect);
        transition
    }

    fn record_effect(&mut self, effect: Effect) {
        match effect {
            Effect::Unchanged => return,
            Effect::RoomCreated => {
                self.stats.rooms_created += 1;
                self.metrics.record_room_created();
            }
            Effect::GameStarted => {
                self.stats.games_started += 1;
                self.metrics.record_game_started();
            }
            Effect::MoveRelayed { .. } => {
                self.stats.moves_relayed += 1;
                self.metrics.record_move_relayed();
                return;
            }
            Effect::MemberLeft { room_closed } => {
                if room_closed {
                    self.stats.rooms_closed += 1;
                    self.metrics.record_room_closed();
                }
            }
        }

        self.metrics
            .update_from_directory_stats(&self.directory.stats());
    }
}
