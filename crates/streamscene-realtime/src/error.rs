//! Error types for streamscene-realtime
//!
//! This module provides the error taxonomy shared by the realtime service
//! and the REST query surface: validation, authorization, not-found,
//! persistence and transport errors.

use thiserror::Error;

/// Realtime subsystem error type
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid field in a request or event payload
    #[error("validation error: {0}")]
    Validation(String),

    /// Operation not permitted for the requesting identity
    #[error("authorization error: {0}")]
    Authorization(String),

    /// Unknown canvas, comment, file or reaction
    #[error("not found: {0}")]
    NotFound(String),

    /// Durable store failure
    #[error("persistence error: {0}")]
    Persistence(String),

    /// WebSocket transport error
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// Malformed client message
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Connection is not a member of the room required for this event
    #[error("not in room: {0}")]
    NotInRoom(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a validation error
    #[must_use]
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an authorization error
    #[must_use]
    pub fn authorization(msg: impl Into<String>) -> Self {
        Self::Authorization(msg.into())
    }

    /// Create a not-found error
    #[must_use]
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a persistence error
    #[must_use]
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Create an invalid message error
    #[must_use]
    pub fn invalid_message(msg: impl Into<String>) -> Self {
        Self::InvalidMessage(msg.into())
    }

    /// Get error code for protocol `error` events
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Authorization(_) => "authorization_error",
            Self::NotFound(_) => "not_found",
            Self::Persistence(_) => "persistence_error",
            Self::WebSocket(_) => "websocket_error",
            Self::InvalidMessage(_) => "invalid_message",
            Self::Serialization(_) => "serialization_error",
            Self::NotInRoom(_) => "not_in_room",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<axum::Error> for Error {
    fn from(err: axum::Error) -> Self {
        Self::WebSocket(err.to_string())
    }
}

/// Result type alias for realtime operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::validation("empty content").code(), "validation_error");
        assert_eq!(Error::not_found("canvas room-1").code(), "not_found");
        assert_eq!(
            Error::authorization("join denied").code(),
            "authorization_error"
        );
    }

    #[test]
    fn test_error_display() {
        let err = Error::validation("guest name required");
        assert!(err.to_string().contains("guest name required"));
    }

    #[test]
    fn test_from_serde_error() {
        let result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        let err: Error = result.unwrap_err().into();
        assert_eq!(err.code(), "serialization_error");
    }
}
