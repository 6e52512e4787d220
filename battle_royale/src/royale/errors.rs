//! Royale error types.

use super::models::RoyaleStatus;
use crate::coordination::CoordinationError;
use crate::db::timeouts::TimeoutError;
use crate::evaluator::GradingError;
use thiserror::Error;
use uuid::Uuid;

/// Broad classification used by transports to pick a response status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Authorization,
    Grading,
    Internal,
}

/// Errors raised by the tournament engine
#[derive(Debug, Error)]
pub enum RoyaleError {
    /// Malformed or missing input
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Royale not found: {0}")]
    RoyaleNotFound(Uuid),

    /// No royale uses this join code
    #[error("Invalid join code: {0}")]
    InvalidCode(String),

    #[error("Match not found: {0}")]
    MatchNotFound(Uuid),

    #[error("Royale not in correct state: expected {expected:?}, got {actual:?}")]
    InvalidState {
        expected: RoyaleStatus,
        actual: RoyaleStatus,
    },

    #[error("Royale is full")]
    RoomFull,

    #[error("Player already joined")]
    AlreadyJoined,

    #[error("Player is not a participant of this royale")]
    NotJoined,

    /// Another start attempt holds the start lock
    #[error("Tournament start already in progress")]
    StartInProgress,

    #[error("Tournament already started")]
    AlreadyStarted,

    #[error("Insufficient players: need {needed}, have {current}")]
    InsufficientPlayers { needed: usize, current: usize },

    #[error("Match is not active")]
    MatchNotActive,

    #[error("Not a participant of this match")]
    NotAParticipant,

    #[error("Solution already submitted for this match")]
    AlreadySubmitted,

    /// Join code clash on insert; the caller retries with a fresh code
    #[error("Join code already in use")]
    DuplicateCode,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Grading failed: {0}")]
    Grading(#[from] GradingError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Coordination store error: {0}")]
    Coordination(#[from] CoordinationError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database operation timed out")]
    StoreTimeout,
}

impl From<TimeoutError> for RoyaleError {
    fn from(err: TimeoutError) -> Self {
        match err {
            TimeoutError::Timeout(_) => RoyaleError::StoreTimeout,
            TimeoutError::Database(e) => RoyaleError::Database(e),
        }
    }
}

impl RoyaleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RoyaleError::Validation(_) => ErrorKind::Validation,
            RoyaleError::RoyaleNotFound(_)
            | RoyaleError::InvalidCode(_)
            | RoyaleError::MatchNotFound(_) => ErrorKind::NotFound,
            RoyaleError::InvalidState { .. }
            | RoyaleError::RoomFull
            | RoyaleError::AlreadyJoined
            | RoyaleError::NotJoined
            | RoyaleError::StartInProgress
            | RoyaleError::AlreadyStarted
            | RoyaleError::InsufficientPlayers { .. }
            | RoyaleError::MatchNotActive
            | RoyaleError::AlreadySubmitted
            | RoyaleError::DuplicateCode => ErrorKind::Conflict,
            RoyaleError::Forbidden(_) | RoyaleError::NotAParticipant => ErrorKind::Authorization,
            RoyaleError::Grading(_) => ErrorKind::Grading,
            RoyaleError::Database(_)
            | RoyaleError::Coordination(_)
            | RoyaleError::Serialization(_)
            | RoyaleError::StoreTimeout => ErrorKind::Internal,
        }
    }

    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Storage and serialization errors are collapsed into a generic message
    /// and identifiers are redacted from not-found errors.
    pub fn client_message(&self) -> String {
        match self {
            RoyaleError::Database(_)
            | RoyaleError::Coordination(_)
            | RoyaleError::Serialization(_)
            | RoyaleError::StoreTimeout => "Internal server error".to_string(),
            RoyaleError::RoyaleNotFound(_) => "Royale not found".to_string(),
            RoyaleError::InvalidCode(_) => "Invalid join code".to_string(),
            RoyaleError::MatchNotFound(_) => "Match not found".to_string(),
            RoyaleError::Grading(GradingError::Crashed(_)) => {
                "Code evaluation failed, please try again".to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Result type for royale operations
pub type RoyaleResult<T> = Result<T, RoyaleError>;
