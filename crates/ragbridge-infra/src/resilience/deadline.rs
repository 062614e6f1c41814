//! Deadline enforcement
//!
//! Exceeding a deadline always classifies as a timeout, independent of whatever
//! the wrapped operation was doing when it was interrupted.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Deadline exceeded
#[derive(Debug, Clone, Error)]
#[error("Operation '{operation}' timed out after {duration:?}")]
pub struct TimeoutError {
    /// Duration that was exceeded
    pub duration: Duration,
    /// Operation name
    pub operation: String,
}

/// Run a future under a deadline
pub async fn with_deadline<Fut, T>(
    operation_name: &str,
    deadline: Duration,
    operation: Fut,
) -> Result<T, TimeoutError>
where
    Fut: Future<Output = T>,
{
    match tokio::time::timeout(deadline, operation).await {
        Ok(result) => Ok(result),
        Err(_) => {
            warn!(
                operation = operation_name,
                timeout_ms = deadline.as_millis() as u64,
                "Operation timed out"
            );
            Err(TimeoutError {
                duration: deadline,
                operation: operation_name.to_string(),
            })
        }
    }
}
