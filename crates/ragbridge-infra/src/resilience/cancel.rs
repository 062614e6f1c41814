//! Cancellation-aware waits

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Race `operation` against `token`; cancellation wins ties
pub async fn cancellable<Fut, T>(token: &CancellationToken, operation: Fut) -> Result<T, Cancelled>
where
    Fut: Future<Output = T>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Cancelled),
        value = operation => Ok(value),
    }
}

pub async fn sleep_cancellable(token: &CancellationToken, duration: Duration) -> Result<(), Cancelled> {
    cancellable(token, tokio::time::sleep(duration)).await
}
