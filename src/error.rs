//! Error types for the relay service
//!
//! Room-level rejections are modeled by [`RoomError`] and travel back to the
//! client inside an acknowledgement. Everything else uses anyhow for
//! propagation, with [`RelayError`] for the cases callers need to match on.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Rejections of a room transition. The display text is the exact message
/// sent to the client in `{ "error": ... }`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("Room does not exist.")]
    RoomNotFound { room: String },

    #[error("Room already exists.")]
    RoomAlreadyExists { room: String },

    #[error("Room is full.")]
    RoomFull { room: String },

    #[error("Already in this room.")]
    AlreadyMember { room: String },

    #[error("Already in another room.")]
    InAnotherRoom { room: String, current: String },
}

impl RoomError {
    /// Room the rejected request targeted
    pub fn room(&self) -> &str {
        match self {
            RoomError::RoomNotFound { room }
            | RoomError::RoomAlreadyExists { room }
            | RoomError::RoomFull { room }
            | RoomError::AlreadyMember { room }
            | RoomError::InAnotherRoom { room, .. } => room,
        }
    }

    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            RoomError::RoomNotFound { .. } => "room_not_found",
            RoomError::RoomAlreadyExists { .. } => "room_already_exists",
            RoomError::RoomFull { .. } => "room_full",
            RoomError::AlreadyMember { .. } => "already_member",
            RoomError::InAnotherRoom { .. } => "in_another_room",
        }
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Invalid frame: {reason}")]
    InvalidFrame { reason: String },

    #[error("Relay service unavailable: {message}")]
    ServiceUnavailable { message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}
