//! Upload orchestration for the ragbridge document-ingestion backend
//!
//! Drives each document upload to a terminal state, either through a blocking
//! backend request or through an asynchronous request paired with list polling,
//! and tracks many concurrent uploads with progress and cancellation.
//!
//! # Features
//!
//! - Blocking and async-polled upload modes
//! - Configurable polling interval and attempt budget
//! - Progress events on every transition and poll attempt
//! - Task registry for looking up in-flight uploads
//! - Sequential or bounded-concurrency batch uploads
//! - Cooperative cancellation and process-wide shutdown

pub mod document;
pub mod orchestrator;
pub mod progress;
pub mod registry;

// Re-exports
pub use document::SourceDocument;
pub use orchestrator::{
    BatchReport, IngestionOrchestrator, IngestionResult, UploadHandle, UploadRequest,
};
pub use progress::{NoProgress, ProgressCallback, ProgressEvent, ProgressSink};
pub use registry::TaskRegistry;

use ragbridge_core::{CoreError, FailureClass};
use ragbridge_sdk::ClientError;

/// Error types for ingestion operations
#[derive(Debug, thiserror::Error)]
pub enum IngestionError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Config(#[from] CoreError),

    #[error("Duplicate task id: {0}")]
    DuplicateTask(String),
}

impl IngestionError {
    pub fn class(&self) -> FailureClass {
        match self {
            IngestionError::Client(e) => e.class(),
            IngestionError::InvalidInput(_)
            | IngestionError::Config(_)
            | IngestionError::DuplicateTask(_) => FailureClass::InvalidInput,
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestionError>;
