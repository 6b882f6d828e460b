//! Room management for the relay service
//!
//! This module owns the in-memory room directory: which rooms are open, who
//! sits in them with which color, and the validated transitions between
//! waiting and active rooms.

pub mod directory;
pub mod state;

// Re-export commonly used types
pub use directory::{Delivery, DirectoryStats, Effect, RoomDirectory, Transition};
pub use state::{Member, Room, RoomState, ROOM_CAPACITY};
