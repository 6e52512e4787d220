//! Shared fixtures for the server integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use battle_royale::evaluator::{
    ComplexityClass, ComplexityEstimate, Evaluator, GradeReport, GradingError, Language,
};
use battle_royale::identity::{Identity, Role};
use battle_royale::questions::TestCase;
use battle_royale::{RoyaleConfig, RoyaleContext};
use br_server::api::{AppState, create_router};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "test_secret_key_for_testing_only_0123456789";

/// Passes every test case when the code contains `pass`, fails them all otherwise
pub struct KeywordEvaluator;

#[async_trait]
impl Evaluator for KeywordEvaluator {
    async fn grade(
        &self,
        code: &str,
        _language: Language,
        test_cases: &[TestCase],
    ) -> Result<GradeReport, GradingError> {
        let total = test_cases.len() as u32;
        let passed_count = if code.contains("pass") { total } else { 0 };
        Ok(GradeReport {
            passed: total > 0 && passed_count == total,
            output: format!("{passed_count}/{total}"),
            passed_count,
            total_count: total,
        })
    }

    async fn estimate_complexity(
        &self,
        _code: &str,
        _language: Language,
    ) -> Result<ComplexityEstimate, GradingError> {
        Ok(ComplexityEstimate {
            class: ComplexityClass::Linear,
            explanation: "fixed".into(),
        })
    }
}

pub fn test_state() -> AppState {
    let config = RoyaleConfig {
        countdown_secs: 1,
        ..RoyaleConfig::default()
    };
    let ctx = RoyaleContext::in_memory(Arc::new(KeywordEvaluator), config);
    AppState::new(ctx, JWT_SECRET)
}

pub fn test_app() -> (Router, AppState) {
    let state = test_state();
    (create_router(state.clone()), state)
}

pub fn teacher() -> Identity {
    Identity::new("teacher-1", "teacher", Role::Teacher)
}

pub fn student(n: usize) -> Identity {
    Identity::new(format!("student-{n}"), format!("student{n}"), Role::Student)
}

pub fn token_for(state: &AppState, identity: &Identity) -> String {
    state
        .auth
        .issue(identity, chrono::Duration::minutes(15))
        .expect("issue token")
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response: Response<Body> = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

/// Poll the royale until its status matches, or panic after a few seconds
pub async fn wait_for_status(app: &Router, token: &str, royale_id: &str, status: &str) -> Value {
    for _ in 0..50 {
        let (code, details) = send(app, get(&format!("/api/v1/royales/{royale_id}"), Some(token))).await;
        assert_eq!(code, StatusCode::OK);
        if details["royale"]["status"] == status {
            return details;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("royale {royale_id} never reached status {status}");
}
