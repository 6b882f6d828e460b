//! Service layer for the chess-relay service
//!
//! This module contains the main application state, service coordination,
//! health probes and background task management.

pub mod app;
pub mod health;

pub use app::{AppState, ServiceError};
pub use health::{HealthCheck, HealthContext, HealthStatus};
