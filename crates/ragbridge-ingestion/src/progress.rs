//! Progress reporting for ingestion tasks

use ragbridge_core::{IngestionStatus, TaskId};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

/// Emitted on every state transition and every poll attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub task_id: TaskId,
    pub file_name: String,
    pub status: IngestionStatus,
    pub elapsed: Duration,
    /// Poll attempt number, zero outside the polling phase
    pub attempt: u32,
}

/// Receiver of progress events
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Forwards events to a closure
pub struct ProgressCallback<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    callback: F,
}

impl<F> ProgressCallback<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressSink for ProgressCallback<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn report(&self, event: ProgressEvent) {
        (self.callback)(event)
    }
}

impl ProgressSink for UnboundedSender<ProgressEvent> {
    fn report(&self, event: ProgressEvent) {
        // A dropped receiver just stops listening
        let _ = self.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn event(status: IngestionStatus) -> ProgressEvent {
        ProgressEvent {
            task_id: TaskId::from_label("t-1"),
            file_name: "a.pdf".to_string(),
            status,
            elapsed: Duration::from_secs(1),
            attempt: 0,
        }
    }

    #[test]
    fn test_callback_sink() {
        let seen = Arc::new(AtomicU32::new(0));
        let counter = seen.clone();
        let sink = ProgressCallback::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        sink.report(event(IngestionStatus::Uploading));
        sink.report(event(IngestionStatus::Completed));

        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_channel_sink() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        tx.report(event(IngestionStatus::Processing));
        assert_eq!(rx.recv().await.unwrap().status, IngestionStatus::Processing);

        drop(rx);
        tx.report(event(IngestionStatus::Completed));
    }
}
