//! Main application configuration
//!
//! Defaults, optionally overlaid by a TOML file or by environment variables,
//! then validated before the service starts.

use crate::error::RelayError;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub server: ServerSettings,
    pub relay: RelaySettings,
}

/// Service-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for the monitoring server
    pub metrics_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// WebSocket listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Path the relay socket is served at
    pub socket_path: String,
}

/// Relay loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    /// Capacity of the command channel feeding the relay loop
    pub command_buffer: usize,
    /// Frames queued per connection before it is disconnected as stalled
    pub outbound_buffer: usize,
    /// Interval between stats log lines and gauge refreshes
    pub stats_interval_seconds: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "chess-relay".to_string(),
            log_level: "info".to_string(),
            metrics_port: 9090,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            socket_path: "/api/socketio".to_string(),
        }
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            command_buffer: 1024,
            outbound_buffer: 256,
            stats_interval_seconds: 30,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| env::var(key).ok())?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file. Missing keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Parse and validate TOML configuration text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Overlay values from `lookup`, keyed by environment variable name
    fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Some(log_level) = lookup("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Some(port) = lookup("METRICS_PORT") {
            self.service.metrics_port = parse_var("METRICS_PORT", &port)?;
        }
        if let Some(timeout) = lookup("SHUTDOWN_TIMEOUT_SECONDS") {
            self.service.shutdown_timeout_seconds = parse_var("SHUTDOWN_TIMEOUT_SECONDS", &timeout)?;
        }

        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = parse_var("PORT", &port)?;
        }
        if let Some(path) = lookup("SOCKET_PATH") {
            self.server.socket_path = path;
        }

        if let Some(buffer) = lookup("RELAY_COMMAND_BUFFER") {
            self.relay.command_buffer = parse_var("RELAY_COMMAND_BUFFER", &buffer)?;
        }
        if let Some(buffer) = lookup("RELAY_OUTBOUND_BUFFER") {
            self.relay.outbound_buffer = parse_var("RELAY_OUTBOUND_BUFFER", &buffer)?;
        }
        if let Some(interval) = lookup("STATS_INTERVAL_SECONDS") {
            self.relay.stats_interval_seconds = parse_var("STATS_INTERVAL_SECONDS", &interval)?;
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get stats interval as Duration
    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.relay.stats_interval_seconds)
    }

    /// Address the WebSocket listener binds to
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Address the monitoring server binds to
    pub fn metrics_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.service.metrics_port)
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        RelayError::ConfigurationError {
            message: format!("Invalid {} value: {}", key, value),
        }
        .into()
    })
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    // Validate ports
    if config.service.metrics_port == 0 {
        return Err(anyhow!("Metrics port cannot be 0"));
    }
    if config.server.port == 0 {
        return Err(anyhow!("Server port cannot be 0"));
    }
    if config.server.port == config.service.metrics_port {
        return Err(anyhow!(
            "Server port and metrics port must differ (both {})",
            config.server.port
        ));
    }

    // Validate timeouts
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }
    if config.relay.stats_interval_seconds == 0 {
        return Err(anyhow!("Stats interval must be greater than 0"));
    }

    // Validate relay settings
    if config.relay.command_buffer == 0 {
        return Err(anyhow!("Relay command buffer must be greater than 0"));
    }
    if config.relay.outbound_buffer == 0 {
        return Err(anyhow!("Relay outbound buffer must be greater than 0"));
    }
    if !config.server.socket_path.starts_with('/') {
        return Err(anyhow!(
            "Socket path must start with '/': {}",
            config.server.socket_path
        ));
    }

    Ok(())
}
