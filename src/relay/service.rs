//! Relay event loop
//!
//! One task owns the room directory and the outbound channel of every live
//! connection. Transport tasks talk to it through a [`RelayHandle`]; commands
//! are processed strictly one at a time, so no two events ever touch room
//! state concurrently and no handler awaits while mutating it.
//!
//! Outbound queues are bounded. A connection whose queue fills up is treated
//! as gone: its channel is dropped and its room sees `opponent_left`.

use crate::error::{RelayError, Result};
use crate::relay::events::{ClientFrame, ServerFrame};
use crate::relay::handlers::{RelayHandler, RelayStats};
use crate::room::{Delivery, Transition};
use crate::types::ConnectionId;
use std::collections::HashMap;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Frames queued per connection before it is considered stalled
pub const DEFAULT_OUTBOUND_BUFFER: usize = 256;

/// Outbound channel of one connection
pub type OutboundSender = mpsc::Sender<ServerFrame>;
pub type OutboundReceiver = mpsc::Receiver<ServerFrame>;

/// Commands accepted by the relay loop
#[derive(Debug)]
pub enum RelayCommand {
    /// Register a connection and the channel its frames go to
    Connect {
        connection_id: ConnectionId,
        outbound: OutboundSender,
    },
    /// An inbound frame from a registered connection
    Frame {
        connection_id: ConnectionId,
        frame: ClientFrame,
    },
    /// The transport reported the connection closed
    Disconnect { connection_id: ConnectionId },
    /// Report current counters
    Stats { reply: oneshot::Sender<RelayStats> },
}

/// Cloneable handle used by transports to reach the relay loop
#[derive(Clone, Debug)]
pub struct RelayHandle {
    tx: mpsc::Sender<RelayCommand>,
    outbound_buffer: usize,
}

impl RelayHandle {
    /// Capacity of the outbound channels created by `outbound_channel`
    pub fn with_outbound_buffer(mut self, capacity: usize) -> Self {
        self.outbound_buffer = capacity.max(1);
        self
    }

    /// A fresh bounded channel for one connection's outbound frames
    pub fn outbound_channel(&self) -> (OutboundSender, OutboundReceiver) {
        mpsc::channel(self.outbound_buffer)
    }

    pub async fn connect(&self, connection_id: ConnectionId, outbound: OutboundSender) -> Result<()> {
        self.send(RelayCommand::Connect {
            connection_id,
            outbound,
        })
        .await
    }

    pub async fn send_frame(&self, connection_id: ConnectionId, frame: ClientFrame) -> Result<()> {
        self.send(RelayCommand::Frame {
            connection_id,
            frame,
        })
        .await
    }

    pub async fn disconnect(&self, connection_id: ConnectionId) -> Result<()> {
        self.send(RelayCommand::Disconnect { connection_id }).await
    }

    /// Ask the loop for its counters
    pub async fn stats(&self) -> Result<RelayStats> {
        let (reply, rx) = oneshot::channel();
        self.send(RelayCommand::Stats { reply }).await?;
        rx.await.map_err(|_| {
            RelayError::ServiceUnavailable {
                message: "Relay loop dropped the stats request".to_string(),
            }
            .into()
        })
    }

    /// True once the relay loop has stopped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn send(&self, command: RelayCommand) -> Result<()> {
        self.tx.send(command).await.map_err(|_| {
            RelayError::ServiceUnavailable {
                message: "Relay loop is not running".to_string(),
            }
            .into()
        })
    }
}

/// The relay loop state
pub struct RelayService {
    handler: RelayHandler,
    connections: HashMap<ConnectionId, OutboundSender>,
    rx: mpsc::Receiver<RelayCommand>,
}

impl RelayService {
    /// Spawn the relay loop. It runs until every handle is dropped.
    pub fn spawn(handler: RelayHandler, buffer: usize) -> (RelayHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(buffer);
        let service = Self {
            handler,
            connections: HashMap::new(),
            rx,
        };

        let task = tokio::spawn(service.run());
        (
            RelayHandle {
                tx,
                outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            },
            task,
        )
    }

    async fn run(mut self) {
        info!("Relay loop started");

        while let Some(command) = self.rx.recv().await {
            self.process(command);
        }

        info!(
            "Relay loop stopped - {} connections still registered",
            self.connections.len()
        );
    }

    fn process(&mut self, command: RelayCommand) {
        match command {
            RelayCommand::Connect {
                connection_id,
                outbound,
            } => {
                if self.connections.contains_key(&connection_id) {
                    warn!("Connection '{}' registered twice, ignoring", connection_id);
                    return;
                }
                self.connections.insert(connection_id.clone(), outbound);
                let transition = self.handler.handle_connect(&connection_id);
                self.dispatch(&connection_id, None, transition);
            }
            RelayCommand::Frame {
                connection_id,
                frame,
            } => {
                if !self.connections.contains_key(&connection_id) {
                    warn!(
                        "Dropping '{}' frame from unregistered connection '{}'",
                        frame.event, connection_id
                    );
                    return;
                }
                debug!("Frame '{}' from '{}'", frame.event, connection_id);
                let transition = self.handler.handle_frame(&connection_id, &frame);
                self.dispatch(&connection_id, frame.ack, transition);
            }
            RelayCommand::Disconnect { connection_id } => {
                if self.connections.remove(&connection_id).is_none() {
                    debug!("Ignoring disconnect of unknown connection '{}'", connection_id);
                    return;
                }
                let transition = self.handler.handle_disconnect(&connection_id);
                self.dispatch(&connection_id, None, transition);
            }
            RelayCommand::Stats { reply } => {
                if reply.send(self.handler.stats()).is_err() {
                    debug!("Stats requester went away");
                }
            }
        }
    }

    /// Send the deliveries of a transition in order, then evict every
    /// connection whose queue overflowed along the way. The reply goes to the
    /// sender only when it asked for one.
    fn dispatch(&mut self, sender: &str, ack: Option<u64>, transition: Transition) {
        let mut stalled = self.deliver_all(sender, ack, transition);

        while let Some(connection_id) = stalled.pop() {
            // Its own disconnect from the transport is ignored later
            if self.connections.remove(&connection_id).is_none() {
                continue;
            }
            warn!(
                "Outbound queue of '{}' is full, disconnecting it",
                connection_id
            );
            let transition = self.handler.handle_disconnect(&connection_id);
            stalled.extend(self.deliver_all(&connection_id, None, transition));
        }
    }

    /// Returns the recipients whose queues were full
    fn deliver_all(
        &self,
        sender: &str,
        ack: Option<u64>,
        transition: Transition,
    ) -> Vec<ConnectionId> {
        let mut stalled = Vec::new();

        for delivery in transition.deliveries {
            match delivery {
                Delivery::Reply(data) => match ack {
                    Some(ack) => {
                        if !self.deliver(sender, ServerFrame::Ack { ack, data }) {
                            stalled.push(sender.to_string());
                        }
                    }
                    None => debug!("'{}' did not request an acknowledgement", sender),
                },
                Delivery::Emit { to, event } => {
                    for recipient in to {
                        if !self.deliver(&recipient, ServerFrame::Event(event.clone())) {
                            stalled.push(recipient);
                        }
                    }
                }
            }
        }

        stalled
    }

    /// False only when the recipient's queue is full
    fn deliver(&self, recipient: &str, frame: ServerFrame) -> bool {
        let Some(outbound) = self.connections.get(recipient) else {
            debug!("No outbound channel for '{}'", recipient);
            return true;
        };

        match outbound.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => false,
            Err(TrySendError::Closed(_)) => {
                debug!("Outbound channel of '{}' is closed", recipient);
                true
            }
        }
    }
}
