//! Integration tests for the ingestion orchestrator

mod common;

use common::{fixture, orchestrator, ScriptedBackend};
use pretty_assertions::assert_eq;
use ragbridge_core::{FailureClass, IngestionStatus, TaskId, UploadConfig, UploadMode};
use ragbridge_ingestion::{NoProgress, ProgressEvent, UploadRequest};
use ragbridge_sdk::TransportError;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio_util::sync::CancellationToken;

fn drain(rx: &mut UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Wait for the first event matching `status` and `attempt`
async fn wait_for(
    rx: &mut UnboundedReceiver<ProgressEvent>,
    status: IngestionStatus,
    attempt: u32,
) -> ProgressEvent {
    loop {
        let event = rx.recv().await.unwrap();
        if event.status == status && event.attempt == attempt {
            return event;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_async_upload_completes_on_third_poll() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture(dir.path(), "report.pdf");
    let backend = Arc::new(ScriptedBackend::new("report.pdf").appears_on_poll(3));
    let orchestrator = orchestrator(backend.clone(), UploadConfig::default());
    let (tx, mut rx) = unbounded_channel();

    let request = UploadRequest::new(&path, "finance").with_mode(UploadMode::AsyncPolled);
    let result = orchestrator
        .upload(request, &tx, &CancellationToken::new())
        .await;

    assert_eq!(result.status, IngestionStatus::Completed);
    assert_eq!(result.poll_attempts, 3);
    assert_eq!(result.task_token.as_deref(), Some("task-42"));
    assert_eq!(backend.polls(), 3);
    // Two sleeps between three polls
    assert!(result.elapsed >= Duration::from_secs(10));
    assert!(result.elapsed < Duration::from_secs(15));

    let uploads = backend.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].file_name, "report.pdf");
    assert_eq!(uploads[0].directive["blocking"], json!(false));
    assert_eq!(uploads[0].directive["collection_name"], json!("finance"));

    let events = drain(&mut rx);
    let labels: Vec<(&str, u32)> = events
        .iter()
        .map(|e| (e.status.label(), e.attempt))
        .collect();
    assert_eq!(
        labels,
        vec![
            ("uploading", 0),
            ("processing", 0),
            ("processing", 1),
            ("processing", 2),
            ("processing", 3),
            ("completed", 3),
        ]
    );
    assert!(orchestrator.active_tasks().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_never_listed_times_out_after_budget() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture(dir.path(), "report.pdf");
    let backend = Arc::new(ScriptedBackend::new("report.pdf"));
    let config = UploadConfig::default().with_poll_policy(5, 4);
    let orchestrator = orchestrator(backend.clone(), config);

    let request = UploadRequest::new(&path, "finance").with_mode(UploadMode::AsyncPolled);
    let result = orchestrator
        .upload(request, &NoProgress, &CancellationToken::new())
        .await;

    assert_eq!(result.status, IngestionStatus::TimedOut);
    assert_eq!(result.poll_attempts, 4);
    assert_eq!(backend.polls(), 4);
    // No sleep after the final attempt
    assert!(result.elapsed >= Duration::from_secs(15));
    assert!(result.elapsed < Duration::from_secs(20));
    assert_eq!(result.failure_class(), Some(FailureClass::Timeout));
}

#[tokio::test(start_paused = true)]
async fn test_blocking_upload_completes_without_polling() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture(dir.path(), "notes.txt");
    let backend = Arc::new(
        ScriptedBackend::new("notes.txt")
            .upload_reply(Ok(json!({"message": "Document uploaded successfully"}))),
    );
    let orchestrator = orchestrator(backend.clone(), UploadConfig::default());

    let result = orchestrator
        .upload(
            UploadRequest::new(&path, "notes"),
            &NoProgress,
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(result.status, IngestionStatus::Completed);
    assert_eq!(result.mode, UploadMode::Blocking);
    assert_eq!(backend.polls(), 0);

    let uploads = backend.uploads();
    assert_eq!(uploads[0].deadline, Duration::from_secs(300));
    assert_eq!(uploads[0].directive["blocking"], json!(true));
    assert_eq!(orchestrator.totals().await.completed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_blocking_partial_failure_is_failed() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture(dir.path(), "scan.pdf");
    let backend = Arc::new(ScriptedBackend::new("scan.pdf").upload_reply(Ok(json!({
        "message": "Document upload job completed",
        "failed_documents": [{"document_name": "scan.pdf", "error_message": "unsupported encoding"}]
    }))));
    let orchestrator = orchestrator(backend.clone(), UploadConfig::default());

    let result = orchestrator
        .upload(
            UploadRequest::new(&path, "scans"),
            &NoProgress,
            &CancellationToken::new(),
        )
        .await;

    match &result.status {
        IngestionStatus::Failed { class, reason } => {
            assert_eq!(*class, FailureClass::PartialFailure);
            assert!(reason.contains("unsupported encoding"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(backend.uploads().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_blocking_timeout_is_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture(dir.path(), "big.pdf");
    let backend = Arc::new(
        ScriptedBackend::new("big.pdf")
            .upload_reply(Err(TransportError::Timeout(Duration::from_secs(300)))),
    );
    let orchestrator = orchestrator(backend.clone(), UploadConfig::default());

    let result = orchestrator
        .upload(
            UploadRequest::new(&path, "docs"),
            &NoProgress,
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(result.failure_class(), Some(FailureClass::Timeout));
    assert!(matches!(result.status, IngestionStatus::Failed { .. }));
    assert_eq!(backend.uploads().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_missing_file_fails_before_any_request() {
    let backend = Arc::new(ScriptedBackend::new("absent.pdf"));
    let orchestrator = orchestrator(backend.clone(), UploadConfig::default());

    let result = orchestrator
        .upload(
            UploadRequest::new("/nonexistent/ragbridge/absent.pdf", "docs"),
            &NoProgress,
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(result.failure_class(), Some(FailureClass::InvalidInput));
    assert_eq!(result.file_name, "absent.pdf");
    assert!(backend.uploads().is_empty());
    assert_eq!(backend.polls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_empty_collection_is_invalid_input() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture(dir.path(), "a.txt");
    let backend = Arc::new(ScriptedBackend::new("a.txt"));
    let orchestrator = orchestrator(backend.clone(), UploadConfig::default());

    let result = orchestrator
        .upload(
            UploadRequest::new(&path, "   "),
            &NoProgress,
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(result.failure_class(), Some(FailureClass::InvalidInput));
    assert!(backend.uploads().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_poll_failure_is_terminal() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture(dir.path(), "report.pdf");
    let backend = Arc::new(ScriptedBackend::new("report.pdf").poll_error(TransportError::Server {
        status: 503,
        body: "unavailable".into(),
    }));
    let orchestrator = orchestrator(backend.clone(), UploadConfig::default());

    let request = UploadRequest::new(&path, "finance").with_mode(UploadMode::AsyncPolled);
    let result = orchestrator
        .upload(request, &NoProgress, &CancellationToken::new())
        .await;

    assert_eq!(result.failure_class(), Some(FailureClass::Server));
    assert_eq!(backend.polls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_polling() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture(dir.path(), "report.pdf");
    let backend = Arc::new(ScriptedBackend::new("report.pdf"));
    let orchestrator = orchestrator(backend.clone(), UploadConfig::default());
    let (tx, mut rx) = unbounded_channel();

    let request = UploadRequest::new(&path, "finance").with_mode(UploadMode::AsyncPolled);
    let handle = orchestrator.spawn_upload(request, Arc::new(tx));

    wait_for(&mut rx, IngestionStatus::Processing, 1).await;
    handle.cancel();
    let result = handle.join().await;

    assert_eq!(result.status, IngestionStatus::Cancelled);
    assert_eq!(backend.polls(), 1);
    assert!(result.elapsed < Duration::from_secs(5));
    assert!(orchestrator.active_tasks().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_caller_token_cancels_upload() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture(dir.path(), "slow.pdf");
    let backend = Arc::new(ScriptedBackend::new("slow.pdf").upload_delay(Duration::from_secs(60)));
    let orchestrator = orchestrator(backend.clone(), UploadConfig::default());

    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let result = orchestrator
        .upload(UploadRequest::new(&path, "docs"), &NoProgress, &token)
        .await;

    assert_eq!(result.status, IngestionStatus::Cancelled);
    assert!(result.elapsed < Duration::from_secs(60));
    assert_eq!(orchestrator.totals().await.cancelled, 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_outstanding_tasks() {
    let dir = tempfile::tempdir().unwrap();
    let first = fixture(dir.path(), "one.pdf");
    let second = fixture(dir.path(), "two.pdf");
    let backend = Arc::new(ScriptedBackend::new("one.pdf").upload_delay(Duration::from_secs(60)));
    let orchestrator = orchestrator(backend.clone(), UploadConfig::default());
    let (tx, mut rx) = unbounded_channel();
    let progress = Arc::new(tx);

    let a = orchestrator.spawn_upload(UploadRequest::new(&first, "docs"), progress.clone());
    let b = orchestrator.spawn_upload(UploadRequest::new(&second, "docs"), progress.clone());

    wait_for(&mut rx, IngestionStatus::Uploading, 0).await;
    wait_for(&mut rx, IngestionStatus::Uploading, 0).await;
    orchestrator.shutdown();

    assert_eq!(a.join().await.status, IngestionStatus::Cancelled);
    assert_eq!(b.join().await.status, IngestionStatus::Cancelled);
    assert!(orchestrator.is_shut_down());

    // Tasks started after shutdown never reach the backend
    let late = orchestrator
        .upload(
            UploadRequest::new(&first, "docs"),
            &NoProgress,
            &CancellationToken::new(),
        )
        .await;
    assert_eq!(late.status, IngestionStatus::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn test_registry_tracks_in_flight_task() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture(dir.path(), "report.pdf");
    let backend = Arc::new(ScriptedBackend::new("report.pdf").appears_on_poll(2));
    let orchestrator = orchestrator(backend.clone(), UploadConfig::default());
    let (tx, mut rx) = unbounded_channel();

    let id = TaskId::from_label("upload-7");
    let request = UploadRequest::new(&path, "finance")
        .with_mode(UploadMode::AsyncPolled)
        .with_task_id(id.clone());
    let handle = orchestrator.spawn_upload(request, Arc::new(tx));
    assert_eq!(handle.task_id(), &id);

    wait_for(&mut rx, IngestionStatus::Processing, 1).await;
    let snapshot = orchestrator.task(&id).await.unwrap();
    assert_eq!(snapshot.status, IngestionStatus::Processing);
    assert_eq!(snapshot.attempts, 1);
    assert_eq!(snapshot.task_token.as_deref(), Some("task-42"));
    assert_eq!(snapshot.collection, "finance");

    let result = handle.join().await;
    assert_eq!(result.status, IngestionStatus::Completed);
    assert!(orchestrator.task(&id).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_task_id_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture(dir.path(), "slow.pdf");
    let backend = Arc::new(ScriptedBackend::new("slow.pdf").upload_delay(Duration::from_secs(60)));
    let orchestrator = orchestrator(backend.clone(), UploadConfig::default());
    let (tx, mut rx) = unbounded_channel();

    let id = TaskId::from_label("shared");
    let first = orchestrator.spawn_upload(
        UploadRequest::new(&path, "docs").with_task_id(id.clone()),
        Arc::new(tx),
    );
    wait_for(&mut rx, IngestionStatus::Uploading, 0).await;

    let second = orchestrator
        .upload(
            UploadRequest::new(&path, "docs").with_task_id(id.clone()),
            &NoProgress,
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(second.failure_class(), Some(FailureClass::InvalidInput));
    assert!(orchestrator.task(&id).await.is_some());

    first.cancel();
    assert_eq!(first.join().await.status, IngestionStatus::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn test_sequential_batch_preserves_order() {
    let dir = tempfile::tempdir().unwrap();
    let names = ["a.txt", "b.txt", "c.txt"];
    let requests: Vec<UploadRequest> = names
        .iter()
        .map(|name| UploadRequest::new(fixture(dir.path(), name), "docs"))
        .collect();
    let backend = Arc::new(ScriptedBackend::new("a.txt").upload_reply(Ok(json!({}))));
    let orchestrator = orchestrator(backend.clone(), UploadConfig::default());

    let (results, report) = orchestrator
        .upload_batch_with(requests, Arc::new(NoProgress), 1)
        .await;

    let finished: Vec<&str> = results.iter().map(|r| r.file_name.as_str()).collect();
    assert_eq!(finished, names);
    let uploaded: Vec<String> = backend.uploads().into_iter().map(|u| u.file_name).collect();
    assert_eq!(uploaded, names);
    assert_eq!(report.completed, 3);
    assert!(report.all_completed());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_batch_counts_outcomes() {
    let dir = tempfile::tempdir().unwrap();
    let mut requests: Vec<UploadRequest> = ["a.txt", "b.txt"]
        .iter()
        .map(|name| UploadRequest::new(fixture(dir.path(), name), "docs"))
        .collect();
    requests.push(UploadRequest::new(dir.path().join("missing.txt"), "docs"));

    let backend = Arc::new(ScriptedBackend::new("a.txt").upload_reply(Ok(json!({}))));
    let orchestrator = orchestrator(backend.clone(), UploadConfig::default());

    let (results, report) = orchestrator
        .upload_batch_with(requests, Arc::new(NoProgress), 3)
        .await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[2].file_name, "missing.txt");
    assert_eq!(report.completed, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(orchestrator.totals().await.total(), 3);
}
