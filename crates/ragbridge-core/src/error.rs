use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse classification shared by every error and terminal outcome in ragbridge.
///
/// Callers use it to decide whether to retry, inform the operator, or escalate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Backend unreachable
    Connection,
    /// Deadline exceeded
    Timeout,
    /// Backend answered with an error status
    Server,
    /// Response decoded but not in any recognized structure
    Shape,
    /// Some items failed while others succeeded
    PartialFailure,
    Cancelled,
    InvalidInput,
}

impl FailureClass {
    pub fn label(&self) -> &'static str {
        match self {
            FailureClass::Connection => "connection error",
            FailureClass::Timeout => "timeout",
            FailureClass::Server => "server error",
            FailureClass::Shape => "unrecognized response shape",
            FailureClass::PartialFailure => "partial failure",
            FailureClass::Cancelled => "cancelled",
            FailureClass::InvalidInput => "invalid input",
        }
    }

    /// Whether a later attempt with the same request might succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, FailureClass::Timeout | FailureClass::Server)
    }
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Errors raised by configuration and shared domain types
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to load configuration: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl CoreError {
    pub fn class(&self) -> FailureClass {
        FailureClass::InvalidInput
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
