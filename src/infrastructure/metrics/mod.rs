//! Prometheus Metrics Module
//!
//! Provides application-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - HTTP request counts and latency
//! - Open WebSocket sessions per chat variant
//! - Stored messages per kind (direct, group)
//! - Fan-out deliveries per outcome
//! - Rejected inbound envelopes per reason
//! - Relay frames per outcome (published, dropped, discarded)
//! - Database query duration histograms

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

const NAMESPACE: &str = "honey_realtime";

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// HTTP request counter - tracks total requests by method, path, and status code
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests").namespace(NAMESPACE),
        &["method", "path", "status"],
    )
    .expect("Failed to create HTTP_REQUESTS_TOTAL metric")
});

/// HTTP request latency histogram - tracks request duration in seconds
pub static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];
    HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
        )
        .namespace(NAMESPACE)
        .buckets(buckets),
        &["method", "path"],
    )
    .expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric")
});

/// Open chat sessions gauge
pub static WEBSOCKET_CONNECTIONS_ACTIVE: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(
        Opts::new(
            "websocket_connections_active",
            "Number of open chat WebSocket sessions",
        )
        .namespace(NAMESPACE),
        &["variant"], // "direct", "group"
    )
    .expect("Failed to create WEBSOCKET_CONNECTIONS_ACTIVE metric")
});

/// Stored chat messages
pub static CHAT_MESSAGES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("chat_messages_total", "Total number of stored chat messages")
            .namespace(NAMESPACE),
        &["kind"], // "direct", "group"
    )
    .expect("Failed to create CHAT_MESSAGES_TOTAL metric")
});

/// Fan-out deliveries to subscriber mailboxes
pub static FANOUT_DELIVERIES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "fanout_deliveries_total",
            "Envelopes handed to subscriber mailboxes",
        )
        .namespace(NAMESPACE),
        &["outcome"], // "delivered", "dropped"
    )
    .expect("Failed to create FANOUT_DELIVERIES_TOTAL metric")
});

/// Inbound envelopes answered with an error
pub static ENVELOPE_ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "envelope_errors_total",
            "Inbound envelopes answered with an error envelope",
        )
        .namespace(NAMESPACE),
        &["reason"],
    )
    .expect("Failed to create ENVELOPE_ERRORS_TOTAL metric")
});

/// Frames handed to the cross-node relay
pub static RELAY_FRAMES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("relay_frames_total", "Fabric events sent to the Redis relay")
            .namespace(NAMESPACE),
        &["outcome"], // "published", "dropped", "discarded"
    )
    .expect("Failed to create RELAY_FRAMES_TOTAL metric")
});

/// Database query duration histogram
pub static DB_QUERY_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5];
    HistogramVec::new(
        HistogramOpts::new(
            "db_query_duration_seconds",
            "Database query latency in seconds",
        )
        .namespace(NAMESPACE)
        .buckets(buckets),
        &["operation", "table"],
    )
    .expect("Failed to create DB_QUERY_DURATION_SECONDS metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .expect("Failed to register HTTP_REQUESTS_TOTAL");
    registry
        .register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))
        .expect("Failed to register HTTP_REQUEST_DURATION_SECONDS");
    registry
        .register(Box::new(WEBSOCKET_CONNECTIONS_ACTIVE.clone()))
        .expect("Failed to register WEBSOCKET_CONNECTIONS_ACTIVE");
    registry
        .register(Box::new(CHAT_MESSAGES_TOTAL.clone()))
        .expect("Failed to register CHAT_MESSAGES_TOTAL");
    registry
        .register(Box::new(FANOUT_DELIVERIES_TOTAL.clone()))
        .expect("Failed to register FANOUT_DELIVERIES_TOTAL");
    registry
        .register(Box::new(ENVELOPE_ERRORS_TOTAL.clone()))
        .expect("Failed to register ENVELOPE_ERRORS_TOTAL");
    registry
        .register(Box::new(RELAY_FRAMES_TOTAL.clone()))
        .expect("Failed to register RELAY_FRAMES_TOTAL");
    registry
        .register(Box::new(DB_QUERY_DURATION_SECONDS.clone()))
        .expect("Failed to register DB_QUERY_DURATION_SECONDS");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Helper to record HTTP request metrics
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration_secs);
}

/// Helper to record database query metrics
pub fn record_db_query(operation: &str, table: &str, duration_secs: f64) {
    DB_QUERY_DURATION_SECONDS
        .with_label_values(&[operation, table])
        .observe(duration_secs);
}

pub fn session_opened(variant: &str) {
    WEBSOCKET_CONNECTIONS_ACTIVE
        .with_label_values(&[variant])
        .inc();
}

pub fn session_closed(variant: &str) {
    WEBSOCKET_CONNECTIONS_ACTIVE
        .with_label_values(&[variant])
        .dec();
}

pub fn record_message_stored(kind: &str) {
    CHAT_MESSAGES_TOTAL.with_label_values(&[kind]).inc();
}

/// Helper to record fan-out results of a single publish
pub fn record_fanout(delivered: usize, dropped: usize) {
    if delivered > 0 {
        FANOUT_DELIVERIES_TOTAL
            .with_label_values(&["delivered"])
            .inc_by(delivered as u64);
    }
    if dropped > 0 {
        FANOUT_DELIVERIES_TOTAL
            .with_label_values(&["dropped"])
            .inc_by(dropped as u64);
    }
}

pub fn record_envelope_error(reason: &str) {
    ENVELOPE_ERRORS_TOTAL.with_label_values(&[reason]).inc();
}

pub fn record_relay_frames(outcome: &str, count: usize) {
    if count > 0 {
        RELAY_FRAMES_TOTAL
            .with_label_values(&[outcome])
            .inc_by(count as u64);
    }
}
