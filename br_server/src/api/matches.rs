//! Solution submission.

use axum::{
    Json,
    extract::{Extension, Path, State},
};
use battle_royale::evaluator::Language;
use battle_royale::identity::Identity;
use battle_royale::matches::MatchId;
use battle_royale::{RoyaleResult, SubmissionReceipt};
use serde::Deserialize;
use std::time::Instant;

use super::AppState;
use super::error::ApiResult;
use crate::{logging, metrics};

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub code: String,
    #[serde(default)]
    pub language: Option<String>,
}

/// `POST /matches/{match_id}/submit`
pub async fn submit_solution(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(match_id): Path<MatchId>,
    Json(request): Json<SubmitRequest>,
) -> ApiResult<Json<SubmissionReceipt>> {
    let receipt = submit_and_record(
        &state,
        match_id,
        &identity,
        &request.code,
        request.language.as_deref(),
    )
    .await?;
    Ok(Json(receipt))
}

/// Submit through the match manager and record grading metrics. Shared by
/// the REST endpoint and the WebSocket command.
pub(crate) async fn submit_and_record(
    state: &AppState,
    match_id: MatchId,
    identity: &Identity,
    code: &str,
    language: Option<&str>,
) -> RoyaleResult<SubmissionReceipt> {
    let started = Instant::now();
    let receipt = state
        .matches
        .submit(match_id, identity, code, language)
        .await?;
    let elapsed = started.elapsed();

    metrics::submissions_total(receipt.passed, Language::parse(language).as_str());
    metrics::grading_duration_ms(elapsed.as_secs_f64() * 1000.0);
    logging::log_grading(
        &match_id.to_string(),
        &identity.user_id,
        elapsed.as_millis() as u64,
        receipt.passed,
    );

    Ok(receipt)
}
