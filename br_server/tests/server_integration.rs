//! Integration tests for the REST API.
//!
//! Every test runs against in-memory stores through `tower::ServiceExt::oneshot`.

mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::json;

// ============================================================================
// Health and authentication
// ============================================================================

#[tokio::test]
async fn test_health_check_endpoint() {
    let (app, _) = test_app();

    let (status, body) = send(&app, get("/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], true);
    assert_eq!(body["coordination"], true);
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let (app, _) = test_app();

    let (status, _) = send(&app, get("/api/v1/leaderboard", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, get("/api/v1/leaderboard", Some("not.a.jwt"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_signed_with_other_secret_rejected() {
    let (app, _) = test_app();
    let foreign = br_server::api::auth::JwtAuth::new("another_secret_key_that_is_long_enough")
        .issue(&student(1), chrono::Duration::minutes(5))
        .unwrap();

    let (status, _) = send(&app, get("/api/v1/leaderboard", Some(&foreign))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let (app, _) = test_app();
    let request = axum::http::Request::builder()
        .uri("/health")
        .header("x-request-id", "trace-42")
        .body(axum::body::Body::empty())
        .unwrap();

    let response = tower::ServiceExt::oneshot(app, request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "trace-42");
}

// ============================================================================
// Royale lifecycle
// ============================================================================

#[tokio::test]
async fn test_student_cannot_create_royale() {
    let (app, state) = test_app();
    let token = token_for(&state, &student(1));

    let (status, body) = send(
        &app,
        post_json("/api/v1/royales", &token, json!({ "title": "Nope" })),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("Only admins and teachers"));
}

#[tokio::test]
async fn test_create_requires_title() {
    let (app, state) = test_app();
    let token = token_for(&state, &teacher());

    let (status, _) = send(
        &app,
        post_json("/api/v1/royales", &token, json!({ "title": "   " })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_join_with_unknown_code_is_not_found() {
    let (app, state) = test_app();
    let token = token_for(&state, &student(1));

    let (status, body) = send(
        &app,
        post_json("/api/v1/royales/join", &token, json!({ "code": "ZZZZZZ" })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Invalid join code");
}

#[tokio::test]
async fn test_unknown_royale_is_not_found() {
    let (app, state) = test_app();
    let token = token_for(&state, &student(1));

    let (status, body) = send(
        &app,
        get(&format!("/api/v1/royales/{}", uuid::Uuid::new_v4()), Some(&token)),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Royale not found");
}

#[tokio::test]
async fn test_join_leave_and_kick() {
    let (app, state) = test_app();
    let teacher_token = token_for(&state, &teacher());

    let (status, royale) = send(
        &app,
        post_json("/api/v1/royales", &teacher_token, json!({ "title": "Lobby" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let royale_id = royale["id"].as_str().unwrap().to_string();
    let code = royale["code"].as_str().unwrap().to_lowercase();

    for n in 1..=3 {
        let token = token_for(&state, &student(n));
        let (status, body) = send(
            &app,
            post_json("/api/v1/royales/join", &token, json!({ "code": code })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["player_count"], n as u64);
        assert_eq!(body["starting"], false);
    }

    // Joining twice conflicts
    let s1 = token_for(&state, &student(1));
    let (status, _) = send(
        &app,
        post_json("/api/v1/royales/join", &s1, json!({ "code": code })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &app,
        post_json(&format!("/api/v1/royales/{royale_id}/leave"), &s1, json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["player_count"], 2);

    // Students may not kick
    let s2 = token_for(&state, &student(2));
    let (status, _) = send(
        &app,
        post_json(
            &format!("/api/v1/royales/{royale_id}/kick"),
            &s2,
            json!({ "user_id": "student-3" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        post_json(
            &format!("/api/v1/royales/{royale_id}/kick"),
            &teacher_token,
            json!({ "user_id": "student-3" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["player_count"], 1);
}

#[tokio::test]
async fn test_start_needs_two_players() {
    let (app, state) = test_app();
    let mut events = state.context().events.subscribe();
    let teacher_token = token_for(&state, &teacher());

    let (_, royale) = send(
        &app,
        post_json("/api/v1/royales", &teacher_token, json!({ "title": "Solo" })),
    )
    .await;
    let royale_id = royale["id"].as_str().unwrap().to_string();
    let code = royale["code"].as_str().unwrap().to_string();

    let s1 = token_for(&state, &student(1));
    send(&app, post_json("/api/v1/royales/join", &s1, json!({ "code": code }))).await;

    let (status, body) = send(
        &app,
        post_json(&format!("/api/v1/royales/{royale_id}/start"), &teacher_token, json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("Insufficient players"));

    while let Ok(envelope) = events.try_recv() {
        assert!(!matches!(
            envelope.event,
            battle_royale::RoyaleEvent::Countdown { .. }
        ));
    }
    let (_, details) = send(
        &app,
        get(&format!("/api/v1/royales/{royale_id}"), Some(&teacher_token)),
    )
    .await;
    assert_eq!(details["royale"]["status"], "waiting");
}

#[tokio::test]
async fn test_second_start_conflicts_while_counting_down() {
    let (app, state) = test_app();
    let teacher_token = token_for(&state, &teacher());

    let (_, royale) = send(
        &app,
        post_json("/api/v1/royales", &teacher_token, json!({ "title": "Twice" })),
    )
    .await;
    let royale_id = royale["id"].as_str().unwrap().to_string();
    let code = royale["code"].as_str().unwrap().to_string();

    for n in 1..=3 {
        let token = token_for(&state, &student(n));
        send(&app, post_json("/api/v1/royales/join", &token, json!({ "code": code }))).await;
    }

    let start_uri = format!("/api/v1/royales/{royale_id}/start");
    let (status, body) = send(&app, post_json(&start_uri, &teacher_token, json!({}))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["countdown_seconds"], 1);

    let (status, body) = send(&app, post_json(&start_uri, &teacher_token, json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Tournament start already in progress");

    wait_for_status(&app, &teacher_token, &royale_id, "in_progress").await;

    let (status, body) = send(&app, post_json(&start_uri, &teacher_token, json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Tournament already started");
}

// ============================================================================
// Full tournament over HTTP
// ============================================================================

#[tokio::test]
async fn test_full_room_auto_starts_and_winner_gets_points() {
    let (app, state) = test_app();
    let teacher_token = token_for(&state, &teacher());

    let (status, royale) = send(
        &app,
        post_json(
            "/api/v1/royales",
            &teacher_token,
            json!({ "title": "Duel", "max_players": 2 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(royale["max_players"], 2);
    let royale_id = royale["id"].as_str().unwrap().to_string();
    let code = royale["code"].as_str().unwrap().to_string();

    let s1 = token_for(&state, &student(1));
    let s2 = token_for(&state, &student(2));
    send(&app, post_json("/api/v1/royales/join", &s1, json!({ "code": code }))).await;
    let (_, joined) = send(
        &app,
        post_json("/api/v1/royales/join", &s2, json!({ "code": code })),
    )
    .await;
    assert_eq!(joined["is_full"], true);
    assert_eq!(joined["starting"], true);

    let details = wait_for_status(&app, &s1, &royale_id, "in_progress").await;
    let duel = &details["matches"][0];
    assert_eq!(duel["is_final"], false);
    let match_id = duel["id"].as_str().unwrap().to_string();

    let (status, receipt) = send(
        &app,
        post_json(
            &format!("/api/v1/matches/{match_id}/submit"),
            &s2,
            json!({ "code": "wrong" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["passed"], false);
    assert_eq!(receipt["decided"], false);

    // Round one of a two-player royale is first-to-pass
    let (status, receipt) = send(
        &app,
        post_json(
            &format!("/api/v1/matches/{match_id}/submit"),
            &s1,
            json!({ "code": "pass", "language": "python" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["decided"], true);
    assert_eq!(receipt["winner"]["user_id"], "student-1");

    let (status, _) = send(
        &app,
        post_json(
            &format!("/api/v1/matches/{match_id}/submit"),
            &s1,
            json!({ "code": "pass" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let details = wait_for_status(&app, &s1, &royale_id, "completed").await;
    assert_eq!(details["royale"]["winner"]["user_id"], "student-1");

    let (status, page) = send(&app, get("/api/v1/leaderboard?limit=5", Some(&s2))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["limit"], 5);
    assert_eq!(page["entries"][0]["user_id"], "student-1");
    assert_eq!(page["entries"][0]["rank"], 1);

    let (status, stats) = send(&app, get("/api/v1/leaderboard/student-1", Some(&s2))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["points"], 100);
    assert_eq!(stats["wins"], 1);
}

#[tokio::test]
async fn test_outsider_cannot_submit() {
    let (app, state) = test_app();
    let teacher_token = token_for(&state, &teacher());

    let (_, royale) = send(
        &app,
        post_json(
            "/api/v1/royales",
            &teacher_token,
            json!({ "title": "Closed", "max_players": 2 }),
        ),
    )
    .await;
    let royale_id = royale["id"].as_str().unwrap().to_string();
    let code = royale["code"].as_str().unwrap().to_string();

    for n in 1..=2 {
        let token = token_for(&state, &student(n));
        send(&app, post_json("/api/v1/royales/join", &token, json!({ "code": code }))).await;
    }

    let outsider = token_for(&state, &student(9));
    let details = wait_for_status(&app, &outsider, &royale_id, "in_progress").await;
    let match_id = details["matches"][0]["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        post_json(
            &format!("/api/v1/matches/{match_id}/submit"),
            &outsider,
            json!({ "code": "pass" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_user_without_history_has_no_rank() {
    let (app, state) = test_app();
    let token = token_for(&state, &student(4));

    let (status, stats) = send(&app, get("/api/v1/leaderboard/student-4", Some(&token))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["rank"], serde_json::Value::Null);
    assert_eq!(stats["points"], 0);
}
