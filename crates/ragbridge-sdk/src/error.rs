//! Error types for the ragbridge SDK

use ragbridge_core::FailureClass;
use std::time::Duration;
use thiserror::Error;

use crate::normalize::ShapeKind;

/// Result type alias for knowledge-base and health operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Failure of a single HTTP exchange.
///
/// Every transport outcome is exactly one of these or a success.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// Backend unreachable or the connection dropped
    #[error("Connection error: {0}")]
    Connection(String),

    /// Caller-supplied deadline exceeded
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Backend answered with a non-success status
    #[error("Server error ({status}): {body}")]
    Server { status: u16, body: String },

    /// The request could not be built (bad URL, bad MIME type)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    pub fn class(&self) -> FailureClass {
        match self {
            TransportError::Connection(_) => FailureClass::Connection,
            TransportError::Timeout(_) => FailureClass::Timeout,
            TransportError::Server { .. } => FailureClass::Server,
            TransportError::InvalidRequest(_) => FailureClass::InvalidInput,
        }
    }

    /// Get the HTTP status code if available
    pub fn status_code(&self) -> Option<u16> {
        match self {
            TransportError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeErrorKind {
    /// Valid JSON in none of the accepted structures
    UnrecognizedShape,
    /// Body is not JSON at all
    MalformedJson,
}

impl std::fmt::Display for ShapeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShapeErrorKind::UnrecognizedShape => f.write_str("unrecognized response shape"),
            ShapeErrorKind::MalformedJson => f.write_str("malformed JSON body"),
        }
    }
}

/// A response body that could not be mapped onto its canonical shape
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind} for {target}: {detail}")]
pub struct ShapeError {
    pub kind: ShapeErrorKind,
    pub target: ShapeKind,
    pub detail: String,
}

impl ShapeError {
    pub fn unrecognized(target: ShapeKind, detail: impl Into<String>) -> Self {
        Self {
            kind: ShapeErrorKind::UnrecognizedShape,
            target,
            detail: detail.into(),
        }
    }

    pub fn malformed(target: ShapeKind, detail: impl Into<String>) -> Self {
        Self {
            kind: ShapeErrorKind::MalformedJson,
            target,
            detail: detail.into(),
        }
    }
}

/// Errors surfaced by [`crate::ChatSession`]
#[derive(Error, Debug, Clone)]
pub enum ChatError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Shape(#[from] ShapeError),

    /// The first data frame of a stream did not decode
    #[error("Malformed first stream frame: {0}")]
    MalformedFrame(String),

    #[error("Chat request cancelled")]
    Cancelled,

    #[error("No request variants configured")]
    NoVariants,
}

impl ChatError {
    pub fn class(&self) -> FailureClass {
        match self {
            ChatError::Transport(e) => e.class(),
            ChatError::Shape(_) | ChatError::MalformedFrame(_) => FailureClass::Shape,
            ChatError::Cancelled => FailureClass::Cancelled,
            ChatError::NoVariants => FailureClass::InvalidInput,
        }
    }

    /// Whether the next request variant should be tried
    pub fn should_fall_back(&self) -> bool {
        match self {
            ChatError::Transport(TransportError::Server { status, .. }) => *status >= 500,
            ChatError::Transport(TransportError::Timeout(_)) => true,
            ChatError::MalformedFrame(_) => true,
            _ => false,
        }
    }
}

/// Errors surfaced by the knowledge-base and health clients
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ClientError {
    pub fn class(&self) -> FailureClass {
        match self {
            ClientError::Transport(e) => e.class(),
            ClientError::Shape(_) => FailureClass::Shape,
            ClientError::InvalidInput(_) | ClientError::Serialization(_) => {
                FailureClass::InvalidInput
            }
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_classification() {
        let server = |status| ChatError::Transport(TransportError::Server {
            status,
            body: String::new(),
        });

        assert!(server(500).should_fall_back());
        assert!(server(503).should_fall_back());
        assert!(!server(422).should_fall_back());
        assert!(ChatError::Transport(TransportError::Timeout(Duration::from_secs(1))).should_fall_back());
        assert!(!ChatError::Transport(TransportError::Connection("refused".into())).should_fall_back());
        assert!(ChatError::MalformedFrame("{".into()).should_fall_back());
        assert!(!ChatError::Shape(ShapeError::unrecognized(ShapeKind::Completion, "no choices")).should_fall_back());
    }

    #[test]
    fn test_classes_are_distinguishable() {
        assert_eq!(
            TransportError::Connection("refused".into()).class(),
            FailureClass::Connection
        );
        assert_eq!(
            TransportError::Timeout(Duration::from_secs(5)).class(),
            FailureClass::Timeout
        );
        assert_eq!(
            ClientError::from(TransportError::Server { status: 500, body: "boom".into() }).class(),
            FailureClass::Server
        );
        assert_eq!(ChatError::Cancelled.class(), FailureClass::Cancelled);
    }

    #[test]
    fn test_shape_error_message() {
        let err = ShapeError::unrecognized(ShapeKind::CollectionList, "expected array");
        assert_eq!(
            err.to_string(),
            "unrecognized response shape for collection-list: expected array"
        );
    }
}
