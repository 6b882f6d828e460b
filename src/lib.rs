//! Chess Relay - room matchmaking and move relay for peer-to-peer chess
//!
//! Pairs exactly two connections into a named room, assigns them opposite
//! colors and forwards opaque move payloads between them over WebSocket.

pub mod config;
pub mod error;
pub mod metrics;
pub mod relay;
pub mod room;
pub mod service;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use error::{RelayError, Result, RoomError};
pub use types::*;

// Re-export key components
pub use relay::{ClientFrame, RelayHandle, RelayHandler, RelayService, ServerFrame};
pub use room::RoomDirectory;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
