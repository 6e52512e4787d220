//! Structured logging configuration.
//!
//! This module provides structured logging with request correlation,
//! security event tracking and tournament lifecycle events.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging
///
/// Log levels are configurable via the `RUST_LOG` env var. Records emitted
/// through the `log` facade by the engine are captured as well.
///
/// # Example
///
/// ```no_run
/// use br_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,hyper=warn"));

    // Console layer for development
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log security event with structured data
///
/// # Example
///
/// ```
/// use br_server::logging::log_security_event;
///
/// log_security_event("invalid_token", None, "Rejected bearer token");
/// ```
pub fn log_security_event(event_type: &str, user_id: Option<&str>, message: &str) {
    tracing::warn!(
        event_type = event_type,
        user_id = user_id,
        "SECURITY: {}",
        message
    );
}

/// Log a tournament lifecycle event
///
/// # Arguments
///
/// * `event` - Lifecycle step (created, joined, started, ...)
/// * `royale_id` - Royale the event belongs to
/// * `user_id` - Acting user
pub fn log_tournament_event(event: &str, royale_id: &str, user_id: &str) {
    tracing::info!(
        event = event,
        royale_id = royale_id,
        user_id = user_id,
        "Tournament event"
    );
}

/// Log grading duration, warning when a submission took long to evaluate
pub fn log_grading(match_id: &str, user_id: &str, duration_ms: u64, passed: bool) {
    if duration_ms > 5000 {
        tracing::warn!(
            match_id = match_id,
            user_id = user_id,
            duration_ms = duration_ms,
            passed = passed,
            "PERFORMANCE: Slow grading"
        );
    } else {
        tracing::debug!(
            match_id = match_id,
            user_id = user_id,
            duration_ms = duration_ms,
            passed = passed,
            "Submission graded"
        );
    }
}
