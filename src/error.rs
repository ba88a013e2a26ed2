//! Error types for the chat session client
//!
//! Defines session-level errors and per-line frame decode errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use crate::types::Phase;

/// Session-level errors
///
/// None of these are fatal to the process. Validation errors are returned
/// to the caller, everything else is surfaced as a notice by the session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Username is required to connect (rejected locally, nothing is opened)
    #[error("Username required")]
    UsernameRequired,

    /// `connect` was called while a connection is already in progress or open
    #[error("Session already {0}")]
    AlreadyActive(Phase),

    /// A single malformed wire line
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Transport failure reported by the connection
    #[error("Transport error: {0}")]
    Transport(String),

    /// Server-originated `error` event
    #[error("Server error: {0}")]
    Protocol(String),

    /// WebSocket protocol error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid server or page address
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send error (the session driver has stopped)
    #[error("Channel send error")]
    ChannelSend,
}

/// One wire line that could not be decoded
///
/// Scoped to a single line so the rest of the buffer still decodes.
#[derive(Debug, Error)]
#[error("Malformed frame on line {line}: {source}")]
pub struct DecodeError {
    /// 1-based line number within the received buffer
    pub line: usize,
    /// Underlying JSON error
    #[source]
    pub source: serde_json::Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_display_includes_line() {
        let source = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err = DecodeError { line: 3, source };
        assert!(err.to_string().starts_with("Malformed frame on line 3"));
    }

    #[test]
    fn test_already_active_display() {
        let err = SessionError::AlreadyActive(Phase::Connecting);
        assert_eq!(err.to_string(), "Session already connecting");
    }
}
