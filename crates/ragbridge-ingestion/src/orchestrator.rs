//! Ingestion orchestrator
//!
//! Each upload runs as an independent task that moves through
//! `Uploading -> Processing -> Completed | Failed | TimedOut`, with `Cancelled`
//! reachable from any non-terminal state. Operations within one task are
//! strictly sequential; separate tasks share nothing but the registry.

use futures::stream::{self, StreamExt};
use ragbridge_core::{
    FailureClass, IngestionStatus, TaskId, TaskSnapshot, UploadConfig, UploadMode,
};
use ragbridge_infra::{
    cancellable, sleep_cancellable, FallbackChain, PollSchedule, ResilienceError,
};
use ragbridge_sdk::{KnowledgeBaseClient, UploadDirective};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::document::SourceDocument;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::registry::TaskRegistry;
use crate::Result;

/// One file to upload into one collection
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub path: PathBuf,
    pub collection: String,
    pub mode: UploadMode,
    /// Caller-chosen identifier; generated when absent
    pub task_id: Option<TaskId>,
}

impl UploadRequest {
    pub fn new(path: impl Into<PathBuf>, collection: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            collection: collection.into(),
            mode: UploadMode::default(),
            task_id: None,
        }
    }

    pub fn with_mode(mut self, mode: UploadMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_task_id(mut self, id: TaskId) -> Self {
        self.task_id = Some(id);
        self
    }
}

/// Terminal result of one ingestion task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestionResult {
    pub task_id: TaskId,
    pub file_name: String,
    pub collection: String,
    pub mode: UploadMode,
    pub status: IngestionStatus,
    pub elapsed: Duration,
    pub task_token: Option<String>,
    pub poll_attempts: u32,
}

impl IngestionResult {
    pub fn is_success(&self) -> bool {
        self.status == IngestionStatus::Completed
    }

    pub fn failure_class(&self) -> Option<FailureClass> {
        match &self.status {
            IngestionStatus::Failed { class, .. } => Some(*class),
            IngestionStatus::TimedOut => Some(FailureClass::Timeout),
            IngestionStatus::Cancelled => Some(FailureClass::Cancelled),
            _ => None,
        }
    }
}

/// Outcome counts for a batch or for the orchestrator's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub completed: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub cancelled: usize,
}

impl BatchReport {
    pub fn from_results(results: &[IngestionResult]) -> Self {
        let mut report = Self::default();
        for result in results {
            report.record(&result.status);
        }
        report
    }

    pub fn record(&mut self, status: &IngestionStatus) {
        match status {
            IngestionStatus::Completed => self.completed += 1,
            IngestionStatus::Failed { .. } => self.failed += 1,
            IngestionStatus::TimedOut => self.timed_out += 1,
            IngestionStatus::Cancelled => self.cancelled += 1,
            IngestionStatus::Uploading | IngestionStatus::Processing => {}
        }
    }

    pub fn total(&self) -> usize {
        self.completed + self.failed + self.timed_out + self.cancelled
    }

    pub fn all_completed(&self) -> bool {
        self.completed == self.total()
    }
}

/// A spawned ingestion task
pub struct UploadHandle {
    task_id: TaskId,
    cancel: CancellationToken,
    handle: JoinHandle<IngestionResult>,
}

impl UploadHandle {
    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Request cooperative cancellation of this task only
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the terminal result
    pub async fn join(self) -> IngestionResult {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => std::panic::resume_unwind(e.into_panic()),
        }
    }
}

struct Inner {
    kb: KnowledgeBaseClient,
    config: UploadConfig,
    registry: TaskRegistry,
    shutdown: CancellationToken,
    totals: RwLock<BatchReport>,
}

/// Drives document uploads to a terminal state
#[derive(Clone)]
pub struct IngestionOrchestrator {
    inner: Arc<Inner>,
}

impl IngestionOrchestrator {
    pub fn new(kb: KnowledgeBaseClient, config: UploadConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            inner: Arc::new(Inner {
                kb,
                config,
                registry: TaskRegistry::new(),
                shutdown: CancellationToken::new(),
                totals: RwLock::new(BatchReport::default()),
            }),
        })
    }

    pub fn config(&self) -> &UploadConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.inner.registry
    }

    /// A token that is cancelled by [`shutdown`](Self::shutdown)
    pub fn child_token(&self) -> CancellationToken {
        self.inner.shutdown.child_token()
    }

    /// Cancel every outstanding task
    pub fn shutdown(&self) {
        info!("Shutting down ingestion orchestrator");
        self.inner.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    pub async fn task(&self, id: &TaskId) -> Option<TaskSnapshot> {
        self.inner.registry.get(id).await
    }

    pub async fn active_tasks(&self) -> Vec<TaskSnapshot> {
        self.inner.registry.list().await
    }

    /// Outcome counts of every task finished so far
    pub async fn totals(&self) -> BatchReport {
        *self.inner.totals.read().await
    }

    /// Upload one file and wait for a terminal state.
    ///
    /// Never fails: every error becomes a `Failed` result with its class.
    /// Both `cancel` and [`shutdown`](Self::shutdown) stop the task.
    #[instrument(skip(self, request, progress, cancel), fields(path = %request.path.display(), collection = %request.collection, mode = %request.mode))]
    pub async fn upload(
        &self,
        request: UploadRequest,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> IngestionResult {
        let linked = self.child_token();
        let run = self.run(request, progress, &linked);
        tokio::pin!(run);

        tokio::select! {
            result = &mut run => return result,
            _ = cancel.cancelled() => linked.cancel(),
        }
        run.await
    }

    /// Run one upload on its own task
    pub fn spawn_upload(
        &self,
        mut request: UploadRequest,
        progress: Arc<dyn ProgressSink>,
    ) -> UploadHandle {
        let task_id = request.task_id.get_or_insert_with(TaskId::new).clone();
        let cancel = self.child_token();

        let this = self.clone();
        let token = cancel.clone();
        let handle =
            tokio::spawn(async move { this.run(request, progress.as_ref(), &token).await });

        UploadHandle {
            task_id,
            cancel,
            handle,
        }
    }

    /// Upload files with the configured concurrency, results in request order
    pub async fn upload_batch(
        &self,
        requests: Vec<UploadRequest>,
        progress: Arc<dyn ProgressSink>,
    ) -> (Vec<IngestionResult>, BatchReport) {
        let concurrency = self.inner.config.batch_concurrency;
        self.upload_batch_with(requests, progress, concurrency).await
    }

    /// Upload files with at most `concurrency` tasks in flight.
    ///
    /// A concurrency of one uploads strictly one file after another.
    pub async fn upload_batch_with(
        &self,
        requests: Vec<UploadRequest>,
        progress: Arc<dyn ProgressSink>,
        concurrency: usize,
    ) -> (Vec<IngestionResult>, BatchReport) {
        let concurrency = concurrency.max(1);
        info!(count = requests.len(), concurrency, "Starting batch upload");

        let results: Vec<IngestionResult> = stream::iter(requests)
            .map(|request| self.spawn_upload(request, progress.clone()).join())
            .buffered(concurrency)
            .collect()
            .await;

        let report = BatchReport::from_results(&results);
        info!(
            completed = report.completed,
            failed = report.failed,
            timed_out = report.timed_out,
            cancelled = report.cancelled,
            "Batch upload finished"
        );
        (results, report)
    }

    async fn run(
        &self,
        request: UploadRequest,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> IngestionResult {
        let task_id = request.task_id.clone().unwrap_or_default();
        let file_name = SourceDocument::file_name_of(&request.path)
            .unwrap_or_else(|_| request.path.display().to_string());
        let mut tracker = Tracker {
            registry: &self.inner.registry,
            progress,
            task_id,
            file_name,
            collection: request.collection.trim().to_string(),
            mode: request.mode,
            started: Instant::now(),
            registered: false,
            task_token: None,
            attempts: 0,
        };

        let status = match self
            .inner
            .registry
            .register(
                tracker.task_id.clone(),
                &tracker.file_name,
                &tracker.collection,
                tracker.mode,
            )
            .await
        {
            Ok(_) => {
                tracker.registered = true;
                tracker.announce(IngestionStatus::Uploading).await;
                self.drive(&request, &mut tracker, cancel).await
            }
            Err(e) => failed(e.class(), e.to_string()),
        };

        let result = tracker.finish(status).await;
        self.inner.totals.write().await.record(&result.status);

        match &result.status {
            IngestionStatus::Completed => info!(
                task_id = %result.task_id,
                file_name = %result.file_name,
                collection = %result.collection,
                elapsed_ms = result.elapsed.as_millis() as u64,
                polls = result.poll_attempts,
                "Upload completed"
            ),
            IngestionStatus::Cancelled => info!(
                task_id = %result.task_id,
                file_name = %result.file_name,
                "Upload cancelled"
            ),
            other => warn!(
                task_id = %result.task_id,
                file_name = %result.file_name,
                status = %other,
                elapsed_ms = result.elapsed.as_millis() as u64,
                "Upload did not complete"
            ),
        }

        result
    }

    /// Steps from `Uploading` to a terminal status
    async fn drive(
        &self,
        request: &UploadRequest,
        tracker: &mut Tracker<'_>,
        cancel: &CancellationToken,
    ) -> IngestionStatus {
        let config = &self.inner.config;

        if tracker.collection.is_empty() {
            return failed(
                FailureClass::InvalidInput,
                "collection name must not be empty".to_string(),
            );
        }

        let document = match cancellable(cancel, SourceDocument::from_file(&request.path)).await {
            Err(_) => return IngestionStatus::Cancelled,
            Ok(Err(e)) => return failed(e.class(), e.to_string()),
            Ok(Ok(document)) => document,
        };
        debug!(
            file_name = %document.file_name,
            mime_type = %document.mime_type,
            size = document.size(),
            "Read source document"
        );

        let blocking = request.mode == UploadMode::Blocking;
        let directive = UploadDirective::from_config(&tracker.collection, blocking, config);
        let deadline = if blocking {
            config.blocking_timeout()
        } else {
            self.inner.kb.deadline()
        };

        let upload = FallbackChain::single("upload", request.mode);
        let ack = match upload
            .run(
                cancel,
                |_| {
                    self.inner
                        .kb
                        .upload_document(document.payload(), &directive, deadline)
                },
                |_| false,
            )
            .await
        {
            Ok(success) => success.value,
            Err(ResilienceError::Cancelled) => return IngestionStatus::Cancelled,
            Err(ResilienceError::Aborted(e) | ResilienceError::Exhausted(e)) => {
                return failed(e.class(), e.to_string())
            }
            Err(ResilienceError::Empty) => {
                return failed(FailureClass::InvalidInput, "no upload attempt was made".into())
            }
        };

        tracker.task_token = ack.task_token.clone();
        if ack.is_partial_failure() {
            return failed(
                FailureClass::PartialFailure,
                format!("backend reported failed documents: {}", ack.failure_summary()),
            );
        }

        if blocking {
            return IngestionStatus::Completed;
        }

        tracker.announce(IngestionStatus::Processing).await;
        self.poll_until_listed(&document.file_name, tracker, cancel)
            .await
    }

    /// Poll the collection's document list until `file_name` appears
    async fn poll_until_listed(
        &self,
        file_name: &str,
        tracker: &mut Tracker<'_>,
        cancel: &CancellationToken,
    ) -> IngestionStatus {
        let schedule = PollSchedule::new(
            self.inner.config.poll_interval(),
            self.inner.config.max_poll_attempts,
        );

        for attempt in schedule.attempts() {
            let listed = match cancellable(cancel, self.inner.kb.list_documents(&tracker.collection))
                .await
            {
                Err(_) => return IngestionStatus::Cancelled,
                Ok(Err(e)) => {
                    return failed(e.class(), format!("poll attempt {} failed: {}", attempt, e))
                }
                Ok(Ok(documents)) => documents,
            };

            tracker.attempts = attempt;
            tracker.announce(IngestionStatus::Processing).await;

            if listed.iter().any(|doc| doc.name == file_name) {
                debug!(file_name = %file_name, attempt, "Document listed");
                return IngestionStatus::Completed;
            }

            match schedule.delay_after(attempt) {
                Some(delay) => {
                    if sleep_cancellable(cancel, delay).await.is_err() {
                        return IngestionStatus::Cancelled;
                    }
                }
                None => break,
            }
        }

        IngestionStatus::TimedOut
    }
}

fn failed(class: FailureClass, reason: String) -> IngestionStatus {
    IngestionStatus::Failed { class, reason }
}

/// Per-task bookkeeping for registry updates and progress events
struct Tracker<'a> {
    registry: &'a TaskRegistry,
    progress: &'a dyn ProgressSink,
    task_id: TaskId,
    file_name: String,
    collection: String,
    mode: UploadMode,
    started: Instant,
    registered: bool,
    task_token: Option<String>,
    attempts: u32,
}

impl Tracker<'_> {
    async fn announce(&self, status: IngestionStatus) {
        if self.registered {
            let token = self.task_token.clone();
            let attempts = self.attempts;
            let next = status.clone();
            self.registry
                .update(&self.task_id, move |snapshot| {
                    snapshot.status = next;
                    snapshot.task_token = token;
                    snapshot.attempts = attempts;
                })
                .await;
        }

        self.progress.report(ProgressEvent {
            task_id: self.task_id.clone(),
            file_name: self.file_name.clone(),
            status,
            elapsed: self.started.elapsed(),
            attempt: self.attempts,
        });
    }

    async fn finish(self, status: IngestionStatus) -> IngestionResult {
        self.announce(status.clone()).await;
        if self.registered {
            self.registry.remove(&self.task_id).await;
        }

        IngestionResult {
            task_id: self.task_id,
            file_name: self.file_name,
            collection: self.collection,
            mode: self.mode,
            status,
            elapsed: self.started.elapsed(),
            task_token: self.task_token,
            poll_attempts: self.attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(status: IngestionStatus) -> IngestionResult {
        IngestionResult {
            task_id: TaskId::new(),
            file_name: "a.pdf".into(),
            collection: "docs".into(),
            mode: UploadMode::Blocking,
            status,
            elapsed: Duration::ZERO,
            task_token: None,
            poll_attempts: 0,
        }
    }

    #[test]
    fn test_batch_report_counts() {
        let results = vec![
            result(IngestionStatus::Completed),
            result(IngestionStatus::Completed),
            result(failed(FailureClass::Server, "boom".into())),
            result(IngestionStatus::TimedOut),
            result(IngestionStatus::Cancelled),
        ];
        let report = BatchReport::from_results(&results);

        assert_eq!(report.completed, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.timed_out, 1);
        assert_eq!(report.cancelled, 1);
        assert_eq!(report.total(), 5);
        assert!(!report.all_completed());
    }

    #[test]
    fn test_failure_class() {
        assert_eq!(result(IngestionStatus::Completed).failure_class(), None);
        assert_eq!(
            result(IngestionStatus::TimedOut).failure_class(),
            Some(FailureClass::Timeout)
        );
        assert_eq!(
            result(failed(FailureClass::PartialFailure, "x".into())).failure_class(),
            Some(FailureClass::PartialFailure)
        );
    }

    #[test]
    fn test_request_builder() {
        let request = UploadRequest::new("/tmp/a.pdf", "docs")
            .with_mode(UploadMode::AsyncPolled)
            .with_task_id(TaskId::from_label("mine"));

        assert_eq!(request.mode, UploadMode::AsyncPolled);
        assert_eq!(request.task_id.unwrap().as_str(), "mine");
    }
}
