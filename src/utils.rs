//! Utility functions for the relay service

use crate::types::ConnectionId;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique connection ID
pub fn generate_connection_id() -> ConnectionId {
    Uuid::new_v4().to_string()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Check that a room name looks like the codes the web client generates
/// (six uppercase ASCII letters or digits). Only used for diagnostics; the
/// relay accepts any name.
pub fn is_conventional_room_name(name: &str) -> bool {
    name.len() == 6
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}
