//! Resilience patterns shared by the chat session and the ingestion orchestrator
//!
//! Provides an ordered fallback chain, deadlines, fixed-interval polling schedules
//! and cancellation-aware waits.

pub mod cancel;
pub mod deadline;
pub mod fallback;
pub mod poll;

pub use cancel::{cancellable, sleep_cancellable, Cancelled};
pub use deadline::{with_deadline, TimeoutError};
pub use fallback::{FallbackChain, FallbackSuccess};
pub use poll::PollSchedule;

/// Result of an operation driven through a [`FallbackChain`]
pub type ResilienceResult<T, E> = std::result::Result<T, ResilienceError<E>>;

/// Errors that can occur in resilient operations
#[derive(Debug)]
pub enum ResilienceError<E> {
    /// The chain had no variants to try
    Empty,
    /// The cancellation signal fired before a variant succeeded
    Cancelled,
    /// A variant failed in a way that must not fall through to the next one
    Aborted(E),
    /// Every variant failed; carries the last variant's error
    Exhausted(E),
}

impl<E> ResilienceError<E> {
    /// The underlying operation error, if any variant ran
    pub fn into_inner(self) -> Option<E> {
        match self {
            ResilienceError::Aborted(e) | ResilienceError::Exhausted(e) => Some(e),
            ResilienceError::Empty | ResilienceError::Cancelled => None,
        }
    }
}

impl<E: std::fmt::Display> std::fmt::Display for ResilienceError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResilienceError::Empty => write!(f, "No request variants configured"),
            ResilienceError::Cancelled => write!(f, "Operation cancelled"),
            ResilienceError::Aborted(e) => write!(f, "Operation failed: {}", e),
            ResilienceError::Exhausted(e) => write!(f, "All variants failed: {}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for ResilienceError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResilienceError::Aborted(e) | ResilienceError::Exhausted(e) => Some(e),
            _ => None,
        }
    }
}
