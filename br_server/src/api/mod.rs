//! HTTP/WebSocket API for the battle royale server.
//!
//! REST endpoints cover the royale lifecycle (create, join, leave, kick,
//! start), solution submission and the points leaderboard. A per-royale
//! WebSocket streams tournament events and accepts the same commands.
//!
//! # Endpoints
//!
//! ```text
//! GET  /health                              - Health check (public)
//! GET  /ws/{royale_id}?token=<jwt>          - Event stream (token in query)
//! POST /api/v1/royales                      - Create royale (admin/teacher)
//! POST /api/v1/royales/join                 - Join by code
//! GET  /api/v1/royales/{id}                 - Royale, participants and matches
//! POST /api/v1/royales/{id}/leave           - Leave before start
//! POST /api/v1/royales/{id}/kick            - Remove a participant (admin/owner)
//! POST /api/v1/royales/{id}/start           - Countdown then start (admin/owner)
//! POST /api/v1/matches/{id}/submit          - Submit a solution
//! GET  /api/v1/leaderboard?limit=&offset=   - Points leaderboard
//! GET  /api/v1/leaderboard/{user_id}        - One user's standing
//! ```
//!
//! Every `/api/v1` route requires `Authorization: Bearer <jwt>`.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use battle_royale::{RoyaleConfig, RoyaleContext};
//! use battle_royale::evaluator::{ProcessEvaluator, RunnerConfig};
//! use br_server::api::{AppState, create_router};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let ctx = RoyaleContext::in_memory(
//!     Arc::new(ProcessEvaluator::new(RunnerConfig::default())),
//!     RoyaleConfig::default(),
//! );
//! let app = create_router(AppState::new(ctx, "a_secret_of_at_least_thirty_two_bytes"));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:5000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod error;
pub mod leaderboard;
pub mod matches;
pub mod middleware;
pub mod rate_limiter;
pub mod request_id;
pub mod royales;
pub mod sessions;
pub mod websocket;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use battle_royale::{MatchManager, RoyaleContext, RoyaleManager, royale::Standings};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use self::auth::JwtAuth;
use self::sessions::SessionRegistry;

/// State shared by all handlers and WebSocket connections. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub royales: RoyaleManager,
    pub matches: MatchManager,
    pub standings: Standings,
    pub auth: Arc<JwtAuth>,
    /// Open WebSocket sessions
    pub sessions: SessionRegistry,
}

impl AppState {
    pub fn new(ctx: RoyaleContext, jwt_secret: impl Into<String>) -> Self {
        let standings = Standings::new(ctx.store.clone());
        let royales = RoyaleManager::new(ctx);
        let matches = MatchManager::new(royales.clone());
        Self {
            royales,
            matches,
            standings,
            auth: Arc::new(JwtAuth::new(jwt_secret)),
            sessions: SessionRegistry::new(),
        }
    }

    pub fn context(&self) -> &RoyaleContext {
        self.royales.context()
    }
}

/// Build the router with all endpoints and middleware
pub fn create_router(state: AppState) -> Router {
    let root_routes = Router::new()
        .route("/health", get(health_check))
        // WebSocket handles its own auth via query parameter
        .route("/ws/{royale_id}", get(websocket::websocket_handler));

    Router::new()
        .merge(root_routes)
        .nest("/api/v1", create_v1_router(state.clone()))
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn create_v1_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/royales", post(royales::create_royale))
        .route("/royales/join", post(royales::join_royale))
        .route("/royales/{royale_id}", get(royales::get_royale))
        .route("/royales/{royale_id}/leave", post(royales::leave_royale))
        .route("/royales/{royale_id}/kick", post(royales::kick_participant))
        .route("/royales/{royale_id}/start", post(royales::start_royale))
        .route("/matches/{match_id}/submit", post(matches::submit_solution))
        .route("/leaderboard", get(leaderboard::get_leaderboard))
        .route("/leaderboard/{user_id}", get(leaderboard::get_user_stats))
        .layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth_middleware,
        ))
}

/// Health of the durable and coordination stores.
///
/// `200 OK` when both answer, `503 Service Unavailable` otherwise.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let ctx = state.context();
    let store_healthy = ctx.store.health_check().await.is_ok();
    let coordination_healthy = ctx.coordination.ping().await.is_ok();

    let overall_healthy = store_healthy && coordination_healthy;
    let status_code = if overall_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if overall_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "database": store_healthy,
        "coordination": coordination_healthy,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
