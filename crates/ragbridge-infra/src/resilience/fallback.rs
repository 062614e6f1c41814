//! Ordered fallback over request variants
//!
//! A chain holds a fixed, ordered list of variants. Variants are tried in sequence;
//! the first success wins, and the failure of the last variant is terminal.

use std::fmt::Debug;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{ResilienceError, ResilienceResult};

/// Outcome of a successful chain run
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackSuccess<T> {
    pub value: T,
    /// Position of the winning variant in the chain (0-based)
    pub variant_index: usize,
}

/// Ordered list of request variants consumed by a single retry loop
#[derive(Debug, Clone)]
pub struct FallbackChain<V> {
    operation: String,
    variants: Vec<V>,
}

impl<V: Clone + Debug> FallbackChain<V> {
    /// Create a chain over the given variants, tried in iteration order
    pub fn new(operation: impl Into<String>, variants: impl IntoIterator<Item = V>) -> Self {
        Self {
            operation: operation.into(),
            variants: variants.into_iter().collect(),
        }
    }

    /// A chain with exactly one variant; failures are never replayed
    pub fn single(operation: impl Into<String>, variant: V) -> Self {
        Self::new(operation, [variant])
    }

    pub fn variants(&self) -> &[V] {
        &self.variants
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Run `operation` against each variant until one succeeds.
    ///
    /// `should_fall_back` decides whether an error moves on to the next variant;
    /// errors it rejects abort the chain immediately. Each attempt races against
    /// `cancel`.
    pub async fn run<F, Fut, T, E, P>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
        should_fall_back: P,
    ) -> ResilienceResult<FallbackSuccess<T>, E>
    where
        F: FnMut(V) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        P: Fn(&E) -> bool,
    {
        let last = match self.variants.len() {
            0 => return Err(ResilienceError::Empty),
            n => n - 1,
        };

        for (index, variant) in self.variants.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(ResilienceError::Cancelled);
            }

            debug!(
                operation = %self.operation,
                variant = ?variant,
                attempt = index + 1,
                "Trying variant"
            );

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ResilienceError::Cancelled),
                result = operation(variant.clone()) => result,
            };

            match result {
                Ok(value) => {
                    return Ok(FallbackSuccess {
                        value,
                        variant_index: index,
                    })
                }
                Err(e) if index == last => {
                    warn!(
                        operation = %self.operation,
                        variant = ?variant,
                        error = %e,
                        "Last variant failed"
                    );
                    return Err(ResilienceError::Exhausted(e));
                }
                Err(e) if !should_fall_back(&e) => {
                    warn!(
                        operation = %self.operation,
                        variant = ?variant,
                        error = %e,
                        "Variant failed with a non-recoverable error"
                    );
                    return Err(ResilienceError::Aborted(e));
                }
                Err(e) => {
                    warn!(
                        operation = %self.operation,
                        variant = ?variant,
                        error = %e,
                        "Variant failed, falling back to next variant"
                    );
                }
            }
        }

        // every iteration returns on the last variant
        Err(ResilienceError::Empty)
    }
}
