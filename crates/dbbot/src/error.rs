//! Error kinds surfaced by a chat turn and the HTTP mapping for each.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Message returned when a chat arrives for a session that never connected.
pub const SESSION_NOT_FOUND: &str = "Session or Database not found.";

/// Message returned once every repair attempt has failed.
pub const EXHAUSTED_REPAIR: &str = "The AI tried to fix the query but failed. Try rephrasing.";

/// Missing or invalid LLM credentials. Detected once at startup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("LLM is not configured: {0}")]
pub struct ConfigurationError(pub String);

/// The database could not be reached or introspected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ConnectionError(pub String);

/// The LLM call itself failed. Never retried.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("LLM request failed: {0}")]
    Transport(String),

    #[error("LLM backend returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Failed to parse LLM response: {0}")]
    Decode(String),
}

/// The database rejected a statement. `message` is the driver's text, unaltered.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ExecutionError {
    pub message: String,
}

impl ExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Turn-level failure returned by the `/chat` and `/connect_db` handlers.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("{}", EXHAUSTED_REPAIR)]
    ExhaustedRepair { last_error: ExecutionError },

    #[error("{}", SESSION_NOT_FOUND)]
    SessionNotFound,
}

impl ChatError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ChatError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            ChatError::Connection(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ChatError::Generation(_) => StatusCode::BAD_GATEWAY,
            ChatError::ExhaustedRepair { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ChatError::SessionNotFound => StatusCode::BAD_REQUEST,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.to_string(),
        });
        (self.status_code(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_not_found_is_bad_request() {
        let err = ChatError::SessionNotFound;
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Session or Database not found.");
    }

    #[test]
    fn test_exhausted_repair_hides_database_error() {
        let err = ChatError::ExhaustedRepair {
            last_error: ExecutionError::new("no such column: nmae"),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("Try rephrasing"));
        assert!(!err.to_string().contains("nmae"));
    }

    #[test]
    fn test_configuration_error_is_unavailable() {
        let err: ChatError = ConfigurationError("COHERE_API_KEY not set".into()).into();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.to_string().contains("COHERE_API_KEY"));
    }

    #[test]
    fn test_execution_error_text_is_verbatim() {
        let err = ExecutionError::new("near \"SELEC\": syntax error");
        assert_eq!(err.to_string(), "near \"SELEC\": syntax error");
    }
}
