//! Authentication middleware for protected endpoints.
//!
//! Extracts and validates the JWT access token from the Authorization header,
//! then injects the caller's [`Identity`] into request extensions for
//! downstream handlers.
//!
//! # Extracting the identity
//!
//! ```rust,no_run
//! use axum::extract::Extension;
//! use battle_royale::identity::Identity;
//!
//! async fn protected_handler(Extension(identity): Extension<Identity>) -> String {
//!     format!("Authenticated as {}", identity.username)
//! }
//! # let _ = protected_handler;
//! ```
//!
//! [`Identity`]: battle_royale::identity::Identity

use axum::{
    extract::{Request, State},
    http::{StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};

use super::AppState;
use crate::logging::log_security_event;

/// Validate `Authorization: Bearer <token>` and inject the identity.
///
/// Missing, malformed, invalid or expired tokens yield `401 Unauthorized`.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    match state.auth.verify(token) {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            Ok(next.run(request).await)
        }
        Err(e) => {
            log_security_event("invalid_token", None, &e.to_string());
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}
