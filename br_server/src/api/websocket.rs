//! WebSocket handler for live tournament updates.
//!
//! A connection is bound to one royale. It receives every event addressed to
//! the royale room or to the connected user, and accepts the same commands as
//! the REST API.
//!
//! # Connection Flow
//!
//! 1. Client connects via `GET /ws/{royale_id}?token=<jwt_token>`
//! 2. Server validates the JWT and that the royale exists
//! 3. A user holds at most one session per royale; a second one gets
//!    `409 Conflict` until the first closes
//! 4. The participant is flagged connected and events start flowing
//! 5. On disconnect the flag is cleared and the room is told. Disconnecting
//!    never forfeits a match; stalled matches are settled by the sweeper.
//!
//! # Client Messages
//!
//! ```javascript
//! ws.send(JSON.stringify({ type: "submit", match_id: "...", code: "print(1)", language: "python" }));
//! ws.send(JSON.stringify({ type: "leave" }));
//! ws.send(JSON.stringify({ type: "admin_start" }));
//! ws.send(JSON.stringify({ type: "admin_kick", user_id: "..." }));
//! ```
//!
//! # Server Messages
//!
//! Tournament events carry their own `type` tag (`player_joined`,
//! `match_started`, `match_result`, ...). Command replies are `success`,
//! `submitted` or `error`.

use axum::{
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade, rejection::WebSocketUpgradeRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use battle_royale::identity::Identity;
use battle_royale::matches::MatchId;
use battle_royale::royale::RoyaleId;
use battle_royale::{Envelope, SubmissionReceipt};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;

use super::{
    AppState, error::ApiError, matches::submit_and_record, rate_limiter::MessageLimiter,
    sessions::SessionGuard,
};
use crate::metrics;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// Client messages received via WebSocket
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    /// Submit a solution for a match of this royale
    Submit {
        match_id: MatchId,
        code: String,
        #[serde(default)]
        language: Option<String>,
    },
    /// Leave before the tournament starts
    Leave,
    /// Start the countdown (admin or owning teacher)
    AdminStart,
    /// Remove a participant (admin or owning teacher)
    AdminKick { user_id: String },
}

/// Replies to client commands
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerResponse {
    Success { message: String },
    Submitted { receipt: SubmissionReceipt },
    Error { message: String },
}

impl ServerResponse {
    fn error(err: battle_royale::RoyaleError) -> Self {
        ServerResponse::Error {
            message: err.client_message(),
        }
    }
}

/// Upgrade to a WebSocket bound to `royale_id`.
///
/// Returns `401 Unauthorized` for a missing or bad token, `404 Not Found`
/// for an unknown royale and `409 Conflict` when the user already has a
/// session in this royale, all checked before the upgrade handshake.
pub async fn websocket_handler(
    Path(royale_id): Path<RoyaleId>,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let identity = match state.auth.verify(query.token.as_deref().unwrap_or_default()) {
        Ok(identity) => identity,
        Err(_) => {
            return (StatusCode::UNAUTHORIZED, "Invalid token").into_response();
        }
    };

    if let Err(e) = state.royales.find_royale(royale_id).await {
        return ApiError(e).into_response();
    }

    let Some(session) = state.sessions.claim(royale_id, &identity.user_id) else {
        warn!(
            "Rejected second session of user {} in royale {}",
            identity.user_id, royale_id
        );
        return (
            StatusCode::CONFLICT,
            "Already connected from another session",
        )
            .into_response();
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    // The session slot is released when the socket task ends or the upgrade is abandoned
    ws.on_upgrade(move |socket| handle_socket(socket, royale_id, identity, state, session))
}

async fn handle_socket(
    socket: WebSocket,
    royale_id: RoyaleId,
    identity: Identity,
    state: AppState,
    session: SessionGuard,
) {
    let (mut sender, mut receiver) = socket.split();
    let user_id = identity.user_id.clone();

    info!("WebSocket connected: royale={}, user={}", royale_id, user_id);
    metrics::websocket_connection_changed(1.0);

    // Subscribe before flagging the connection so no event in between is lost
    let mut events = state.context().events.subscribe();
    mark_connected(&state, royale_id, &user_id, true).await;

    let mut limiter = MessageLimiter::default();
    let (response_tx, mut response_rx) = tokio::sync::mpsc::channel::<String>(32);

    let send_user = user_id.clone();
    let send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                received = events.recv() => {
                    let envelope = match received {
                        Ok(envelope) => envelope,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("WebSocket of user {} lagged, {} events dropped", send_user, skipped);
                            continue;
                        }
                        Err(RecvError::Closed) => break,
                    };

                    let Some(json) = event_frame(&envelope, royale_id, &send_user) else {
                        continue;
                    };
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                    metrics::websocket_messages_sent();
                }
                Some(response_json) = response_rx.recv() => {
                    if sender.send(Message::Text(response_json.into())).await.is_err() {
                        break;
                    }
                    metrics::websocket_messages_sent();
                }
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                metrics::websocket_messages_received();

                let response = if let Err(throttled) = limiter.check() {
                    warn!(
                        "Rate limit ({:?}) exceeded for user {} (royale {}). Blocking message.",
                        throttled, user_id, royale_id
                    );
                    metrics::rate_limit_hits_total("websocket");
                    ServerResponse::Error {
                        message: throttled.message().to_string(),
                    }
                } else {
                    debug!("Received message from user {}: {}", user_id, text);
                    match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(client_msg) => {
                            handle_client_message(client_msg, royale_id, &identity, &state).await
                        }
                        Err(e) => {
                            warn!("Failed to parse client message: {}", e);
                            ServerResponse::Error {
                                message: "Invalid message format".to_string(),
                            }
                        }
                    }
                };

                if let Ok(json) = serde_json::to_string(&response)
                    && response_tx.send(json).await.is_err()
                {
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                info!("WebSocket closed: royale={}, user={}", royale_id, user_id);
                break;
            }
            Err(e) => {
                error!("WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    send_task.abort();
    mark_connected(&state, royale_id, &user_id, false).await;
    drop(session);
    metrics::websocket_connection_changed(-1.0);

    info!("WebSocket disconnected: royale={}, user={}", royale_id, user_id);
}

async fn mark_connected(state: &AppState, royale_id: RoyaleId, user_id: &str, connected: bool) {
    match state.royales.set_connected(royale_id, user_id, connected).await {
        Ok(true) => {}
        // Spectators have no participant row
        Ok(false) => debug!("User {} is not a participant of royale {}", user_id, royale_id),
        Err(e) => warn!(
            "Failed to flag user {} connected={} in royale {}: {}",
            user_id, connected, royale_id, e
        ),
    }
}

/// Serialized event if this connection is part of its audience
fn event_frame(envelope: &Envelope, royale_id: RoyaleId, user_id: &str) -> Option<String> {
    if !envelope.audience.includes(royale_id, user_id) {
        return None;
    }
    match serde_json::to_string(&envelope.event) {
        Ok(json) => Some(json),
        Err(e) => {
            error!("Failed to serialize event: {}", e);
            None
        }
    }
}

async fn handle_client_message(
    msg: ClientMessage,
    royale_id: RoyaleId,
    identity: &Identity,
    state: &AppState,
) -> ServerResponse {
    match msg {
        ClientMessage::Submit {
            match_id,
            code,
            language,
        } => {
            match state.matches.find_match(match_id).await {
                Ok(m) if m.royale_id == royale_id => {}
                Ok(_) => {
                    return ServerResponse::Error {
                        message: "Match does not belong to this royale".to_string(),
                    };
                }
                Err(e) => return ServerResponse::error(e),
            }

            match submit_and_record(state, match_id, identity, &code, language.as_deref()).await {
                Ok(receipt) => ServerResponse::Submitted { receipt },
                Err(e) => ServerResponse::error(e),
            }
        }

        ClientMessage::Leave => match state.royales.leave_royale(royale_id, identity).await {
            Ok(_) => ServerResponse::Success {
                message: "Left royale successfully".to_string(),
            },
            Err(e) => ServerResponse::error(e),
        },

        ClientMessage::AdminStart => {
            match state
                .royales
                .start_after_countdown(royale_id, Some(identity))
                .await
            {
                Ok(_) => ServerResponse::Success {
                    message: "Countdown started".to_string(),
                },
                Err(e) => ServerResponse::error(e),
            }
        }

        ClientMessage::AdminKick { user_id } => {
            match state
                .royales
                .kick_participant(royale_id, identity, &user_id)
                .await
            {
                Ok(_) => ServerResponse::Success {
                    message: format!("Removed {} from royale", user_id),
                },
                Err(e) => ServerResponse::error(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use battle_royale::evaluator::{ProcessEvaluator, RunnerConfig};
    use battle_royale::identity::Role;
    use battle_royale::royale::CreateRoyaleRequest;
    use battle_royale::{Audience, RoyaleConfig, RoyaleContext, RoyaleEvent};
    use uuid::Uuid;

    fn state() -> AppState {
        let ctx = RoyaleContext::in_memory(
            std::sync::Arc::new(ProcessEvaluator::new(RunnerConfig::default())),
            RoyaleConfig::default(),
        );
        AppState::new(ctx, "test_secret_key_for_testing_only_0123456789")
    }

    async fn royale_with(state: &AppState, students: &[&str]) -> (Identity, RoyaleId) {
        let teacher = Identity::new("t1", "teacher", Role::Teacher);
        let royale = state
            .royales
            .create_royale(
                &teacher,
                CreateRoyaleRequest {
                    title: "Sockets".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        for name in students {
            let student = Identity::new(*name, *name, Role::Student);
            state.royales.join_royale(&royale.code, &student).await.unwrap();
        }
        (teacher, royale.id)
    }

    fn error_message(response: ServerResponse) -> String {
        match response {
            ServerResponse::Error { message } => message,
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_client_message_parsing() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"submit","match_id":"00000000-0000-0000-0000-000000000000","code":"print(1)"}"#,
        )
        .unwrap();
        assert!(matches!(msg, ClientMessage::Submit { language: None, .. }));

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"admin_kick","user_id":"u2"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::AdminKick { user_id } if user_id == "u2"));

        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"fold"}"#).is_err());
    }

    #[test]
    fn test_event_frame_respects_audience() {
        let royale = Uuid::new_v4();
        let for_u1 = Envelope {
            audience: Audience::User {
                royale_id: royale,
                user_id: "u1".into(),
            },
            event: RoyaleEvent::Countdown { seconds_left: 2 },
        };

        let frame = event_frame(&for_u1, royale, "u1").unwrap();
        assert!(frame.contains("\"type\":\"countdown\""));
        assert!(event_frame(&for_u1, royale, "u2").is_none());
        assert!(event_frame(&for_u1, Uuid::new_v4(), "u1").is_none());
    }

    #[tokio::test]
    async fn test_leave_then_leave_again() {
        let state = state();
        let (_, royale_id) = royale_with(&state, &["s1"]).await;
        let student = Identity::new("s1", "s1", Role::Student);

        let first = handle_client_message(ClientMessage::Leave, royale_id, &student, &state).await;
        assert!(matches!(first, ServerResponse::Success { .. }));

        let second = handle_client_message(ClientMessage::Leave, royale_id, &student, &state).await;
        assert_eq!(
            error_message(second),
            "Player is not a participant of this royale"
        );
    }

    #[tokio::test]
    async fn test_student_cannot_start_or_kick() {
        let state = state();
        let (_, royale_id) = royale_with(&state, &["s1", "s2"]).await;
        let student = Identity::new("s1", "s1", Role::Student);

        let start = handle_client_message(ClientMessage::AdminStart, royale_id, &student, &state).await;
        assert!(error_message(start).starts_with("Forbidden"));

        let kick = handle_client_message(
            ClientMessage::AdminKick {
                user_id: "s2".into(),
            },
            royale_id,
            &student,
            &state,
        )
        .await;
        assert!(error_message(kick).starts_with("Forbidden"));
    }

    #[tokio::test]
    async fn test_admin_start_with_lone_player_is_refused() {
        let state = state();
        let (teacher, royale_id) = royale_with(&state, &["s1"]).await;

        let response =
            handle_client_message(ClientMessage::AdminStart, royale_id, &teacher, &state).await;
        assert_eq!(
            error_message(response),
            "Insufficient players: need 2, have 1"
        );
    }

    #[tokio::test]
    async fn test_owner_kicks_participant() {
        let state = state();
        let (teacher, royale_id) = royale_with(&state, &["s1", "s2"]).await;

        let response = handle_client_message(
            ClientMessage::AdminKick {
                user_id: "s2".into(),
            },
            royale_id,
            &teacher,
            &state,
        )
        .await;
        assert!(matches!(response, ServerResponse::Success { .. }));

        let details = state.royales.royale_details(royale_id).await.unwrap();
        assert_eq!(details.participants.len(), 1);
    }

    #[tokio::test]
    async fn test_submit_to_unknown_match() {
        let state = state();
        let (_, royale_id) = royale_with(&state, &["s1"]).await;
        let student = Identity::new("s1", "s1", Role::Student);

        let response = handle_client_message(
            ClientMessage::Submit {
                match_id: Uuid::new_v4(),
                code: "print(1)".into(),
                language: None,
            },
            royale_id,
            &student,
            &state,
        )
        .await;
        assert_eq!(error_message(response), "Match not found");
    }
}
