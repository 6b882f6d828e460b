//! WebSocket transport
//!
//! Each upgraded socket gets a fresh connection id, a writer task draining its
//! outbound channel, and a reader loop feeding text frames to the relay loop.

use crate::relay::events::ClientFrame;
use crate::relay::service::RelayHandle;
use crate::utils::generate_connection_id;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use tracing::{debug, error, info, warn};

/// Router serving the relay socket at `socket_path`
pub fn relay_router(handle: RelayHandle, socket_path: &str) -> Router {
    Router::new()
        .route(socket_path, get(relay_socket_handler))
        .with_state(handle)
}

async fn relay_socket_handler(ws: WebSocketUpgrade, State(handle): State<RelayHandle>) -> Response {
    debug!("Relay socket upgrade requested");
    ws.on_upgrade(move |socket| handle_socket(socket, handle))
}

async fn handle_socket(socket: WebSocket, handle: RelayHandle) {
    let connection_id = generate_connection_id();
    let (outbound_tx, mut outbound_rx) = handle.outbound_channel();

    if let Err(e) = handle.connect(connection_id.clone(), outbound_tx).await {
        error!("Failed to register connection '{}': {}", connection_id, e);
        return;
    }

    let (mut sender, mut receiver) = socket.split();

    let writer_id = connection_id.clone();
    let mut writer = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            let text = match frame.to_json() {
                Ok(text) => text,
                Err(e) => {
                    error!("Dropping frame for '{}': {}", writer_id, e);
                    continue;
                }
            };
            if let Err(e) = sender.send(Message::Text(text.into())).await {
                debug!("Socket of '{}' closed while sending: {}", writer_id, e);
                break;
            }
        }
    });

    loop {
        tokio::select! {
            message = receiver.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => match ClientFrame::parse(text.as_str()) {
                        Ok(frame) => {
                            if let Err(e) = handle.send_frame(connection_id.clone(), frame).await {
                                error!("Relay loop unavailable for '{}': {}", connection_id, e);
                                break;
                            }
                        }
                        Err(e) => warn!("Ignoring frame from '{}': {}", connection_id, e),
                    },
                    Some(Ok(Message::Binary(_))) => {
                        warn!("Ignoring binary frame from '{}'", connection_id);
                    }
                    // axum answers pings itself
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!("Socket error on '{}': {}", connection_id, e);
                        break;
                    }
                }
            }
            _ = &mut writer => {
                debug!("Writer for '{}' finished", connection_id);
                break;
            }
        }
    }

    if let Err(e) = handle.disconnect(connection_id.clone()).await {
        warn!("Failed to report disconnect of '{}': {}", connection_id, e);
    }
    writer.abort();

    info!("Relay socket '{}' closed", connection_id);
}
