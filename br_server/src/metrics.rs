//! Prometheus metrics for monitoring tournament server health.
//!
//! Metrics are exposed in Prometheus text format for scraping by monitoring systems.
//!
//! # Metrics Categories
//!
//! - **HTTP Metrics**: Request counts, duration, status codes
//! - **WebSocket Metrics**: Active connections, messages sent/received
//! - **Tournament Metrics**: Submissions, matches, tournaments started/completed
//! - **Rate Limiting Metrics**: Blocked WebSocket messages
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use br_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::http_requests_total("POST", "/api/v1/royales", 201);
//! ```

use battle_royale::events::RoyaleEvent;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Record HTTP request.
pub fn http_requests_total(method: &str, path: &str, status: u16) {
    metrics::counter!("http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record HTTP request duration in milliseconds.
pub fn http_request_duration_ms(method: &str, path: &str, duration_ms: f64) {
    metrics::histogram!("http_request_duration_ms",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_ms);
}

// ============================================================================
// WebSocket Metrics
// ============================================================================

/// Track a WebSocket connection opening (`delta` 1) or closing (`delta` -1).
pub fn websocket_connection_changed(delta: f64) {
    if delta > 0.0 {
        metrics::counter!("websocket_connections_total").increment(1);
    }
    metrics::gauge!("websocket_connections_active").increment(delta);
}

pub fn websocket_messages_sent() {
    metrics::counter!("websocket_messages_sent").increment(1);
}

pub fn websocket_messages_received() {
    metrics::counter!("websocket_messages_received").increment(1);
}

// ============================================================================
// Tournament Metrics
// ============================================================================

/// Count a graded submission.
pub fn submissions_total(passed: bool, language: &str) {
    metrics::counter!("submissions_total",
        "passed" => passed.to_string(),
        "language" => language.to_string()
    )
    .increment(1);
}

/// Record grading duration in milliseconds.
pub fn grading_duration_ms(duration_ms: f64) {
    metrics::histogram!("grading_duration_ms").record(duration_ms);
}

/// Update tournament counters from an engine event.
pub fn record_event(event: &RoyaleEvent) {
    match event {
        RoyaleEvent::TournamentStarting { .. } => {
            metrics::counter!("tournaments_started_total").increment(1);
        }
        RoyaleEvent::MatchResult { forfeit, .. } => {
            metrics::counter!("matches_completed_total",
                "forfeit" => forfeit.to_string()
            )
            .increment(1);
        }
        RoyaleEvent::TournamentComplete { .. } => {
            metrics::counter!("tournaments_completed_total").increment(1);
        }
        RoyaleEvent::PlayerJoined { .. } => {
            metrics::counter!("royale_joins_total").increment(1);
        }
        _ => {}
    }
}

// ============================================================================
// Rate Limiting Metrics
// ============================================================================

/// Increment rate limit hits counter.
pub fn rate_limit_hits_total(endpoint: &str) {
    metrics::counter!("rate_limit_hits_total",
        "endpoint" => endpoint.to_string()
    )
    .increment(1);
}
