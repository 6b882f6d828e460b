//! Test fixtures for driving the relay loop without a network
//!
//! `TestClient` stands in for one WebSocket connection: it registers an
//! outbound channel with the relay loop, sends frames through the handle and
//! collects whatever the loop delivers back.

#![allow(dead_code)]

use chess_relay::relay::{
    ClientFrame, OutboundReceiver, RelayHandle, RelayHandler, RelayService, ServerFrame,
};
use chess_relay::types::{Ack, ServerEvent};
use serde_json::Value;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::timeout;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Spawn a relay loop with a fresh directory
pub fn spawn_relay() -> RelayHandle {
    let (handle, _task) = RelayService::spawn(RelayHandler::new(), 256);
    handle
}

/// A fake connection attached to the relay loop
pub struct TestClient {
    pub id: String,
    handle: RelayHandle,
    rx: OutboundReceiver,
    pending: VecDeque<ServerEvent>,
    next_ack: u64,
}

impl TestClient {
    /// Connect and consume the greeting
    pub async fn connect(handle: &RelayHandle, id: &str) -> Self {
        let (tx, rx) = handle.outbound_channel();
        handle
            .connect(id.to_string(), tx)
            .await
            .expect("relay loop should accept connections");

        let mut client = Self {
            id: id.to_string(),
            handle: handle.clone(),
            rx,
            pending: VecDeque::new(),
            next_ack: 1,
        };

        match client.next_event().await {
            ServerEvent::ConnectionAck(greeting) => {
                assert_eq!(greeting.socket_id, id);
                assert_eq!(greeting.message, format!("Welcome, client {}", id));
            }
            other => panic!("expected connection_ack, got {:?}", other),
        }

        client
    }

    /// Send an event that expects an acknowledgement and wait for it.
    /// Events arriving before the ack are kept for `next_event`.
    pub async fn request(&mut self, event: &str, data: Value) -> Ack {
        let ack_id = self.next_ack;
        self.next_ack += 1;

        self.send(ClientFrame::new(event, data, Some(ack_id))).await;

        loop {
            match self.recv_frame().await {
                ServerFrame::Ack { ack, data } if ack == ack_id => return data,
                ServerFrame::Ack { ack, .. } => panic!("unexpected ack id {}", ack),
                ServerFrame::Event(event) => self.pending.push_back(event),
            }
        }
    }

    pub async fn create_room(&mut self, room: &str) -> Ack {
        self.request("create_room", Value::String(room.to_string()))
            .await
    }

    pub async fn join_room(&mut self, room: &str) -> Ack {
        self.request("join_room", Value::String(room.to_string()))
            .await
    }

    /// Send an event without asking for an acknowledgement
    pub async fn emit(&self, event: &str, data: Value) {
        self.send(ClientFrame::new(event, data, None)).await;
    }

    pub async fn send(&self, frame: ClientFrame) {
        self.handle
            .send_frame(self.id.clone(), frame)
            .await
            .expect("relay loop should accept frames");
    }

    /// Next server event, buffered or freshly received
    pub async fn next_event(&mut self) -> ServerEvent {
        if let Some(event) = self.pending.pop_front() {
            return event;
        }

        match self.recv_frame().await {
            ServerFrame::Event(event) => event,
            ServerFrame::Ack { ack, data } => panic!("unexpected ack {}: {:?}", ack, data),
        }
    }

    /// Assert nothing has been delivered to this client. Round-trips a stats
    /// request first so every earlier command has been processed.
    pub async fn assert_silent(&mut self) {
        self.handle
            .stats()
            .await
            .expect("relay loop should answer stats");

        assert!(
            self.pending.is_empty(),
            "{} has buffered events: {:?}",
            self.id,
            self.pending
        );
        if let Ok(frame) = self.rx.try_recv() {
            panic!("{} received unexpected frame: {:?}", self.id, frame);
        }
    }

    /// Close the connection the way the transport does
    pub async fn disconnect(self) {
        self.handle
            .disconnect(self.id.clone())
            .await
            .expect("relay loop should accept disconnects");
    }

    async fn recv_frame(&mut self) -> ServerFrame {
        timeout(RECV_TIMEOUT, self.rx.recv())
            .await
            .unwrap_or_else(|_| panic!("{} timed out waiting for a frame", self.id))
            .unwrap_or_else(|| panic!("{} outbound channel closed", self.id))
    }
}

/// Extract the error message of a rejected acknowledgement
pub fn error_message(ack: &Ack) -> &str {
    match ack {
        Ack::Error(rejected) => &rejected.error,
        other => panic!("expected an error ack, got {:?}", other),
    }
}
