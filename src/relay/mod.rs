//! Client-facing relay: wire frames, event handlers, the relay loop and the
//! WebSocket transport.

pub mod events;
pub mod handlers;
pub mod service;
pub mod ws;

pub use events::{ChessMove, ClientEvent, ClientFrame, ColorChoice, ServerFrame};
pub use handlers::{RelayHandler, RelayStats};
pub use service::{
    OutboundReceiver, OutboundSender, RelayCommand, RelayHandle, RelayService,
    DEFAULT_OUTBOUND_BUFFER,
};
pub use ws::relay_router;
