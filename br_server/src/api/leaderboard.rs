//! Points leaderboard endpoints.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use battle_royale::royale::{LeaderboardPage, UserStats};
use serde::Deserialize;

use super::AppState;
use super::error::ApiResult;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// `GET /leaderboard?limit=&offset=`
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<LeaderboardPage>> {
    Ok(Json(
        state.standings.leaderboard(query.limit, query.offset).await?,
    ))
}

/// `GET /leaderboard/{user_id}`
pub async fn get_user_stats(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<UserStats>> {
    Ok(Json(state.standings.user_stats(&user_id).await?))
}
