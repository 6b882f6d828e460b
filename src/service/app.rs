//! Main application state and service coordination
//!
//! `AppState` owns the relay loop, the WebSocket listener, the monitoring
//! server and the background tasks, and tears them down in order on shutdown.

use crate::config::{validate_config, AppConfig};
use crate::metrics::{HealthServer, HealthServerConfig, MetricsCollector, MetricsService};
use crate::relay::{relay_router, RelayHandle, RelayHandler, RelayService};
use crate::service::health::{HealthCheck, HealthContext, HealthStatus};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Failed to bind {address}: {message}")]
    Bind { address: String, message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Handle to the relay loop
    relay: RelayHandle,

    /// The relay loop task itself
    relay_task: Option<JoinHandle<()>>,

    /// Metrics service for monitoring and health checks
    metrics_service: Arc<MetricsService>,

    /// What health probes look at
    health_context: HealthContext,

    /// Background task handles
    background_tasks: Vec<JoinHandle<()>>,

    /// Stops the WebSocket server
    shutdown_tx: broadcast::Sender<()>,

    /// Service status
    is_running: Arc<RwLock<bool>>,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing chess-relay service");

        validate_config(&config).map_err(|e| ServiceError::Configuration {
            message: e.to_string(),
        })?;

        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let handler = RelayHandler::with_metrics(metrics_collector.clone());
        let (relay, relay_task) = RelayService::spawn(handler, config.relay.command_buffer);
        let relay = relay.with_outbound_buffer(config.relay.outbound_buffer);

        let is_running = Arc::new(RwLock::new(false));
        let health_context = HealthContext {
            is_running: is_running.clone(),
            ..HealthContext::new(config.service.name.clone(), relay.clone())
        };

        let metrics_service =
            Self::initialize_metrics(&config, metrics_collector, health_context.clone());
        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            config,
            relay,
            relay_task: Some(relay_task),
            metrics_service,
            health_context,
            background_tasks: Vec::new(),
            shutdown_tx,
            is_running,
        })
    }

    /// Start the relay server, monitoring server and background tasks
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        info!("Starting chess-relay service");

        *self.is_running.write().await = true;

        self.start_metrics_service();
        self.start_relay_server().await?;
        self.start_background_tasks();

        info!("✅ Chess-relay service started successfully");
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of chess-relay service");

        *self.is_running.write().await = false;

        // Stop accepting sockets first
        if self.shutdown_tx.send(()).is_err() {
            debug!("Relay server already stopped");
        }

        info!("Stopping metrics service...");
        if let Err(e) = self.metrics_service.stop().await {
            warn!("Failed to stop metrics service: {}", e);
        } else {
            info!("✅ Metrics service stopped");
        }

        match self.relay.stats().await {
            Ok(final_stats) => info!("Final relay statistics: {:?}", final_stats),
            Err(e) => warn!("Failed to get final stats: {}", e),
        }

        self.stop_background_tasks();

        // Open sockets still hold relay handles, so the loop is stopped explicitly
        if let Some(task) = self.relay_task.take() {
            task.abort();
        }

        info!("✅ Chess-relay service shutdown completed");
        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// Handle to the relay loop
    pub fn relay(&self) -> RelayHandle {
        self.relay.clone()
    }

    pub fn health_context(&self) -> &HealthContext {
        &self.health_context
    }

    /// Get metrics service
    pub fn metrics_service(&self) -> Arc<MetricsService> {
        self.metrics_service.clone()
    }

    fn initialize_metrics(
        config: &AppConfig,
        metrics_collector: Arc<MetricsCollector>,
        health_context: HealthContext,
    ) -> Arc<MetricsService> {
        info!(
            "Initializing metrics service on port {}",
            config.service.metrics_port
        );

        let health_config = HealthServerConfig {
            port: config.service.metrics_port,
            host: config.server.host.clone(),
        };

        let health_server = Arc::new(
            HealthServer::new(health_config, metrics_collector.clone())
                .with_context(health_context),
        );
        Arc::new(MetricsService::new(metrics_collector, health_server))
    }

    fn start_metrics_service(&mut self) {
        info!("Starting metrics and health endpoints");

        let metrics_service = self.metrics_service.clone();
        let metrics_handle = tokio::spawn(async move {
            if let Err(e) = metrics_service.start().await {
                error!("Metrics service failed: {:#}", e);
            } else {
                info!("Metrics service task completed");
            }
        });

        self.background_tasks.push(metrics_handle);
    }

    /// Bind the WebSocket listener and serve the relay socket
    async fn start_relay_server(&mut self) -> Result<(), ServiceError> {
        let address = self.config.server_addr();
        let addr: SocketAddr = address.parse().map_err(|e| ServiceError::Configuration {
            message: format!("Invalid server address {}: {}", address, e),
        })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServiceError::Bind {
                address: address.clone(),
                message: e.to_string(),
            })?;

        let app = relay_router(self.relay.clone(), &self.config.server.socket_path);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        info!(
            "Relay socket listening on ws://{}{}",
            addr, self.config.server.socket_path
        );

        let server_task = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                    info!("Relay server shutdown signal received");
                })
                .await;

            match served {
                Ok(()) => info!("Relay server stopped"),
                Err(e) => error!("Relay server failed: {}", e),
            }
        });

        self.background_tasks.push(server_task);
        Ok(())
    }

    /// Start background maintenance tasks
    fn start_background_tasks(&mut self) {
        let interval_duration = self.config.stats_interval();
        info!(
            "Starting stats task ({}s interval)...",
            interval_duration.as_secs()
        );

        let context = self.health_context.clone();
        let metrics_collector = self.metrics_service.collector();

        let stats_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(interval_duration);
            info!("Stats task started");

            while context.is_running().await {
                interval.tick().await;

                metrics_collector
                    .service()
                    .uptime_seconds
                    .set(context.uptime_seconds());

                match HealthCheck::check(&context).await {
                    Ok(health) => {
                        metrics_collector.update_health_status(health.status.as_gauge());
                        for check in &health.checks {
                            metrics_collector.update_component_health(
                                &check.name,
                                check.status == HealthStatus::Healthy,
                            );
                        }

                        let relay = &health.stats.relay;
                        info!(
                            "Relay stats: {} - {} connections, {} waiting rooms, {} active rooms, {} moves relayed",
                            health.status,
                            relay.connections,
                            relay.waiting_rooms,
                            relay.active_rooms,
                            relay.moves_relayed
                        );
                    }
                    Err(e) => warn!("Failed to gather relay stats: {}", e),
                }
            }

            info!("Stats task stopped");
        });

        self.background_tasks.push(stats_task);
    }

    /// Stop all background tasks
    fn stop_background_tasks(&mut self) {
        let task_count = self.background_tasks.len();
        if task_count == 0 {
            info!("No background tasks to stop");
            return;
        }

        info!("Stopping {} background tasks...", task_count);

        for (i, task) in self.background_tasks.drain(..).enumerate() {
            debug!("Aborting background task {}/{}", i + 1, task_count);
            task.abort();
        }

        info!("✅ All {} background tasks stopped", task_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::ClientFrame;

    #[tokio::test]
    async fn test_new_spawns_reachable_relay() {
        let state = AppState::new(AppConfig::default()).await.unwrap();
        assert!(!state.is_running().await);

        let (outbound, mut rx) = state.relay().outbound_channel();
        state.relay().connect("a".to_string(), outbound).await.unwrap();
        assert!(rx.recv().await.is_some());

        state
            .relay()
            .send_frame(
                "a".to_string(),
                ClientFrame::new("create_room", serde_json::json!("ABCDEF"), Some(1)),
            )
            .await
            .unwrap();

        let stats = tokio_test::assert_ok!(state.relay().stats().await);
        assert_eq!(stats.waiting_rooms, 1);
        assert_eq!(stats.connections, 1);
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_config() {
        let mut config = AppConfig::default();
        config.relay.command_buffer = 0;

        match AppState::new(config).await {
            Err(ServiceError::Configuration { message }) => {
                assert!(message.contains("command buffer"))
            }
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("invalid config accepted"),
        }
    }

    #[tokio::test]
    async fn test_shutdown_completes_after_relay_loop_died() {
        let mut state = AppState::new(AppConfig::default()).await.unwrap();
        state
            .background_tasks
            .push(tokio::spawn(std::future::pending::<()>()));

        if let Some(task) = state.relay_task.as_ref() {
            task.abort();
        }
        while !state.relay().is_closed() {
            tokio::task::yield_now().await;
        }

        tokio_test::assert_ok!(state.shutdown().await);
        assert!(state.background_tasks.is_empty());
        assert!(state.relay_task.is_none());
        assert!(!state.is_running().await);
    }
}
