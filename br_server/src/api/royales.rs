//! Royale lifecycle endpoints.

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
};
use battle_royale::identity::Identity;
use battle_royale::royale::{CreateRoyaleRequest, Royale, RoyaleDetails, RoyaleId};
use log::warn;
use serde::{Deserialize, Serialize};

use super::AppState;
use super::error::ApiResult;
use crate::logging::log_tournament_event;

#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct JoinResponse {
    pub royale: Royale,
    pub player_count: u32,
    pub is_full: bool,
    /// A full room triggers the countdown automatically
    pub starting: bool,
}

#[derive(Debug, Deserialize)]
pub struct KickRequest {
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct PlayerCountResponse {
    pub royale_id: RoyaleId,
    pub player_count: u32,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub royale_id: RoyaleId,
    pub countdown_seconds: u32,
}

/// `POST /royales`
pub async fn create_royale(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<CreateRoyaleRequest>,
) -> ApiResult<(StatusCode, Json<Royale>)> {
    let royale = state.royales.create_royale(&identity, request).await?;
    log_tournament_event("created", &royale.id.to_string(), &identity.user_id);
    Ok((StatusCode::CREATED, Json(royale)))
}

/// `POST /royales/join`
pub async fn join_royale(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<JoinRequest>,
) -> ApiResult<Json<JoinResponse>> {
    let outcome = state.royales.join_royale(&request.code, &identity).await?;
    log_tournament_event("joined", &outcome.royale.id.to_string(), &identity.user_id);

    let starting = outcome.is_full && auto_start(&state, outcome.royale.id).await;

    Ok(Json(JoinResponse {
        royale: outcome.royale,
        player_count: outcome.player_count,
        is_full: outcome.is_full,
        starting,
    }))
}

/// Kick off the countdown for a room that just filled up. Losing the start
/// race to a concurrent join is expected and only logged.
async fn auto_start(state: &AppState, royale_id: RoyaleId) -> bool {
    match state.royales.start_after_countdown(royale_id, None).await {
        Ok(_handle) => true,
        Err(e) => {
            warn!("Auto-start of royale {} not scheduled: {}", royale_id, e);
            false
        }
    }
}

/// `GET /royales/{royale_id}`
pub async fn get_royale(
    State(state): State<AppState>,
    Path(royale_id): Path<RoyaleId>,
) -> ApiResult<Json<RoyaleDetails>> {
    Ok(Json(state.royales.royale_details(royale_id).await?))
}

/// `POST /royales/{royale_id}/leave`
pub async fn leave_royale(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(royale_id): Path<RoyaleId>,
) -> ApiResult<Json<PlayerCountResponse>> {
    let player_count = state.royales.leave_royale(royale_id, &identity).await?;
    log_tournament_event("left", &royale_id.to_string(), &identity.user_id);
    Ok(Json(PlayerCountResponse {
        royale_id,
        player_count,
    }))
}

/// `POST /royales/{royale_id}/kick`
pub async fn kick_participant(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(royale_id): Path<RoyaleId>,
    Json(request): Json<KickRequest>,
) -> ApiResult<Json<PlayerCountResponse>> {
    let player_count = state
        .royales
        .kick_participant(royale_id, &identity, &request.user_id)
        .await?;
    log_tournament_event("kicked", &royale_id.to_string(), &request.user_id);
    Ok(Json(PlayerCountResponse {
        royale_id,
        player_count,
    }))
}

/// `POST /royales/{royale_id}/start`
///
/// Answers `202 Accepted` once the countdown is running; the bracket is
/// announced over the WebSocket when it ends. A royale with fewer than two
/// participants or with a countdown already running answers `409 Conflict`.
pub async fn start_royale(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(royale_id): Path<RoyaleId>,
) -> ApiResult<(StatusCode, Json<StartResponse>)> {
    state
        .royales
        .start_after_countdown(royale_id, Some(&identity))
        .await?;
    log_tournament_event("start_requested", &royale_id.to_string(), &identity.user_id);

    Ok((
        StatusCode::ACCEPTED,
        Json(StartResponse {
            royale_id,
            countdown_seconds: state.context().config.countdown_secs,
        }),
    ))
}
