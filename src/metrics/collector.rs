//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the chess relay service using
//! Prometheus metrics.

use crate::room::DirectoryStats;
use anyhow::Result;
use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the relay service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Room lifecycle metrics
    room_metrics: RoomMetrics,

    /// Connection and event traffic metrics
    relay_metrics: RelayMetrics,

    /// Performance metrics
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Room lifecycle metrics
#[derive(Clone)]
pub struct RoomMetrics {
    /// Open rooms by state (waiting, active)
    pub rooms: IntGaugeVec,

    /// Total rooms created
    pub rooms_created_total: IntCounter,

    /// Total rooms closed because their last member left
    pub rooms_closed_total: IntCounter,

    /// Total games started (second member joined)
    pub games_started_total: IntCounter,

    /// Rejected room requests by reason
    pub rejections_total: IntCounterVec,
}

/// Connection and event traffic metrics
#[derive(Clone)]
pub struct RelayMetrics {
    /// Currently open connections
    pub connections: IntGauge,

    /// Total connections accepted
    pub connections_total: IntCounter,

    /// Inbound events processed by event name
    pub events_total: IntCounterVec,

    /// Frames that could not be parsed or decoded
    pub invalid_frames_total: IntCounterVec,

    /// Moves forwarded to an opponent
    pub moves_relayed_total: IntCounter,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Time spent handling one inbound event
    pub event_duration: HistogramVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let room_metrics = RoomMetrics::new(&registry)?;
        let relay_metrics = RelayMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            room_metrics,
            relay_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn room(&self) -> &RoomMetrics {
        &self.room_metrics
    }

    pub fn relay(&self) -> &RelayMetrics {
        &self.relay_metrics
    }

    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Set the room gauges from a directory snapshot
    pub fn update_from_directory_stats(&self, stats: &DirectoryStats) {
        self.room_metrics
            .rooms
            .with_label_values(&["waiting"])
            .set(stats.waiting_rooms as i64);
        self.room_metrics
            .rooms
            .with_label_values(&["active"])
            .set(stats.active_rooms as i64);
    }

    pub fn record_connection_opened(&self) {
        self.relay_metrics.connections.inc();
        self.relay_metrics.connections_total.inc();
    }

    pub fn record_connection_closed(&self) {
        self.relay_metrics.connections.dec();
    }

    /// Record an inbound event and how long it took to handle
    pub fn record_event(&self, event: &str, duration: Duration) {
        self.relay_metrics
            .events_total
            .with_label_values(&[event])
            .inc();

        self.performance_metrics
            .event_duration
            .with_label_values(&[event])
            .observe(duration.as_secs_f64());
    }

    pub fn record_invalid_frame(&self, event: &str) {
        self.relay_metrics
            .invalid_frames_total
            .with_label_values(&[event])
            .inc();
    }

    pub fn record_rejection(&self, reason: &str) {
        self.room_metrics
            .rejections_total
            .with_label_values(&[reason])
            .inc();
    }

    pub fn record_room_created(&self) {
        self.room_metrics.rooms_created_total.inc();
    }

    pub fn record_game_started(&self) {
        self.room_metrics.games_started_total.inc();
    }

    pub fn record_room_closed(&self) {
        self.room_metrics.rooms_closed_total.inc();
    }

    pub fn record_move_relayed(&self) {
        self.relay_metrics.moves_relayed_total.inc();
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("chess_relay_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "chess_relay_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("chess_relay_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
        })
    }
}

impl RoomMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let rooms = IntGaugeVec::new(
            Opts::new("chess_relay_rooms", "Open rooms by state"),
            &["state"],
        )?;
        registry.register(Box::new(rooms.clone()))?;

        let rooms_created_total =
            IntCounter::new("chess_relay_rooms_created_total", "Total rooms created")?;
        registry.register(Box::new(rooms_created_total.clone()))?;

        let rooms_closed_total =
            IntCounter::new("chess_relay_rooms_closed_total", "Total rooms closed")?;
        registry.register(Box::new(rooms_closed_total.clone()))?;

        let games_started_total =
            IntCounter::new("chess_relay_games_started_total", "Total games started")?;
        registry.register(Box::new(games_started_total.clone()))?;

        let rejections_total = IntCounterVec::new(
            Opts::new(
                "chess_relay_rejections_total",
                "Rejected room requests by reason",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(rejections_total.clone()))?;

        Ok(Self {
            rooms,
            rooms_created_total,
            rooms_closed_total,
            games_started_total,
            rejections_total,
        })
    }
}

impl RelayMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let connections = IntGauge::new("chess_relay_connections", "Open connections")?;
        registry.register(Box::new(connections.clone()))?;

        let connections_total = IntCounter::new(
            "chess_relay_connections_total",
            "Total connections accepted",
        )?;
        registry.register(Box::new(connections_total.clone()))?;

        let events_total = IntCounterVec::new(
            Opts::new("chess_relay_events_total", "Inbound events processed"),
            &["event"],
        )?;
        registry.register(Box::new(events_total.clone()))?;

        let invalid_frames_total = IntCounterVec::new(
            Opts::new(
                "chess_relay_invalid_frames_total",
                "Inbound frames that failed to parse or decode",
            ),
            &["event"],
        )?;
        registry.register(Box::new(invalid_frames_total.clone()))?;

        let moves_relayed_total = IntCounter::new(
            "chess_relay_moves_relayed_total",
            "Moves forwarded to an opponent",
        )?;
        registry.register(Box::new(moves_relayed_total.clone()))?;

        Ok(Self {
            connections,
            connections_total,
            events_total,
            invalid_frames_total,
            moves_relayed_total,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let event_duration = HistogramVec::new(
            HistogramOpts::new(
                "chess_relay_event_duration_seconds",
                "Inbound event handling time",
            )
            .buckets(vec![0.00001, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05]),
            &["event"],
        )?;
        registry.register(Box::new(event_duration.clone()))?;

        Ok(Self { event_duration })
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create default metrics collector")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collector_creation() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        let _service = collector.service();
        let _room = collector.room();
        let _relay = collector.relay();
        let _performance = collector.performance();
    }

    #[test]
    fn test_room_lifecycle_recording() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        collector.record_room_created();
        collector.record_game_started();
        collector.record_room_closed();
        collector.record_rejection("room_full");

        assert_eq!(collector.room().rooms_created_total.get(), 1);
        assert_eq!(collector.room().games_started_total.get(), 1);
        assert_eq!(collector.room().rooms_closed_total.get(), 1);
        assert_eq!(
            collector
                .room()
                .rejections_total
                .with_label_values(&["room_full"])
                .get(),
            1
        );
    }

    #[test]
    fn test_connection_gauge() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        collector.record_connection_opened();
        collector.record_connection_opened();
        collector.record_connection_closed();

        assert_eq!(collector.relay().connections.get(), 1);
        assert_eq!(collector.relay().connections_total.get(), 2);
    }

    #[test]
    fn test_directory_stats_update() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        collector.update_from_directory_stats(&DirectoryStats {
            waiting_rooms: 3,
            active_rooms: 2,
            seated_connections: 7,
        });

        assert_eq!(collector.room().rooms.with_label_values(&["waiting"]).get(), 3);
        assert_eq!(collector.room().rooms.with_label_values(&["active"]).get(), 2);
    }

    #[test]
    fn test_event_recording() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        collector.record_event("create_room", Duration::from_micros(40));
        collector.record_invalid_frame("join_room");

        assert_eq!(
            collector
                .relay()
                .events_total
                .with_label_values(&["create_room"])
                .get(),
            1
        );
        assert_eq!(
            collector
                .relay()
                .invalid_frames_total
                .with_label_values(&["join_room"])
                .get(),
            1
        );
    }

    #[test]
    fn test_metrics_timer() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");
        let timer = collector.start_timer();

        std::thread::sleep(Duration::from_millis(10));
        let duration = timer.elapsed();

        assert!(duration >= Duration::from_millis(10));

        let final_duration = timer.stop();
        assert!(final_duration >= Duration::from_millis(10));
    }
}
