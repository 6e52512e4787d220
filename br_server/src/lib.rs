//! HTTP and WebSocket front end for the battle royale tournament engine.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
