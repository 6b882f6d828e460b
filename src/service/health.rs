//! Health checks and monitoring
//!
//! This module provides health check functionality for the chess-relay
//! service, including readiness and liveness probes against the relay loop.

use crate::relay::{RelayHandle, RelayStats};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error};

/// How long the relay loop may take to answer a probe before it counts as degraded
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Gauge value exported as `chess_relay_health_status`
    pub fn as_gauge(&self) -> u8 {
        match self {
            HealthStatus::Healthy => 2,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 0,
        }
    }

    fn worst(self, other: &HealthStatus) -> HealthStatus {
        match (&self, other) {
            (HealthStatus::Unhealthy, _) | (_, HealthStatus::Unhealthy) => HealthStatus::Unhealthy,
            (HealthStatus::Degraded, _) | (_, HealthStatus::Degraded) => HealthStatus::Degraded,
            _ => HealthStatus::Healthy,
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Degraded => write!(f, "⚠️  degraded"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

/// What a health probe needs to see of the running service
#[derive(Clone)]
pub struct HealthContext {
    pub service_name: String,
    pub relay: RelayHandle,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub is_running: Arc<RwLock<bool>>,
}

impl HealthContext {
    pub fn new(service_name: impl Into<String>, relay: RelayHandle) -> Self {
        Self {
            service_name: service_name.into(),
            relay,
            started_at: chrono::Utc::now(),
            is_running: Arc::new(RwLock::new(true)),
        }
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn uptime_seconds(&self) -> i64 {
        (chrono::Utc::now() - self.started_at).num_seconds()
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    pub version: String,
    /// Current timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    /// Service statistics
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional error message if unhealthy
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStats {
    pub relay: RelayStats,
    pub uptime_seconds: i64,
}

impl HealthCheck {
    /// Perform a comprehensive health check of the service
    pub async fn check(context: &HealthContext) -> Result<Self> {
        let mut checks = Vec::new();

        let service_check = Self::check_service_running(context).await;
        let mut overall_status = service_check.status.clone();
        checks.push(service_check);

        let (relay_check, relay_stats) = Self::check_relay_loop(&context.relay).await;
        overall_status = overall_status.worst(&relay_check.status);
        checks.push(relay_check);

        Ok(HealthCheck {
            status: overall_status,
            service: context.service_name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats: ServiceStats {
                relay: relay_stats.unwrap_or_default(),
                uptime_seconds: context.uptime_seconds(),
            },
        })
    }

    /// Simple liveness check - the service is running and the relay loop exists
    pub async fn liveness_check(context: &HealthContext) -> Result<HealthStatus> {
        if context.is_running().await && !context.relay.is_closed() {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Readiness check - the relay loop answers requests
    pub async fn readiness_check(context: &HealthContext) -> Result<HealthStatus> {
        if !context.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }

        Ok(Self::check_relay_loop(&context.relay).await.0.status)
    }

    async fn check_service_running(context: &HealthContext) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = if context.is_running().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Round-trip a stats request through the relay loop
    async fn check_relay_loop(relay: &RelayHandle) -> (ComponentCheck, Option<RelayStats>) {
        let start = std::time::Instant::now();

        let (status, message, stats) = match tokio::time::timeout(PROBE_TIMEOUT, relay.stats()).await
        {
            Ok(Ok(stats)) => (HealthStatus::Healthy, None, Some(stats)),
            Ok(Err(e)) => {
                error!("Relay loop health check failed: {}", e);
                (HealthStatus::Unhealthy, Some(e.to_string()), None)
            }
            Err(_) => {
                debug!("Relay loop did not answer within {:?}", PROBE_TIMEOUT);
                (
                    HealthStatus::Degraded,
                    Some("Relay loop is slow to respond".to_string()),
                    None,
                )
            }
        };

        let check = ComponentCheck {
            name: "relay_loop".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        (check, stats)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::{RelayHandler, RelayService};

    fn live_context() -> HealthContext {
        let (relay, _task) = RelayService::spawn(RelayHandler::new(), 8);
        HealthContext::new("chess-relay", relay)
    }

    #[tokio::test]
    async fn test_healthy_service() {
        let context = live_context();

        let health = HealthCheck::check(&context).await.unwrap();
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.checks.len(), 2);
        assert_eq!(health.stats.relay, RelayStats::default());
        assert!(health.to_json().unwrap().contains("relay_loop"));

        assert_eq!(
            HealthCheck::readiness_check(&context).await.unwrap(),
            HealthStatus::Healthy
        );
        assert_eq!(
            HealthCheck::liveness_check(&context).await.unwrap(),
            HealthStatus::Healthy
        );
    }

    #[tokio::test]
    async fn test_stopped_service_is_unhealthy() {
        let context = live_context();
        *context.is_running.write().await = false;

        let health = HealthCheck::check(&context).await.unwrap();
        assert_eq!(health.status, HealthStatus::Unhealthy);
        assert_eq!(
            HealthCheck::readiness_check(&context).await.unwrap(),
            HealthStatus::Unhealthy
        );
    }

    #[test]
    fn test_status_ordering() {
        assert_eq!(
            HealthStatus::Healthy.worst(&HealthStatus::Degraded),
            HealthStatus::Degraded
        );
        assert_eq!(
            HealthStatus::Degraded.worst(&HealthStatus::Unhealthy),
            HealthStatus::Unhealthy
        );
        assert_eq!(HealthStatus::Healthy.as_gauge(), 2);
    }
}
