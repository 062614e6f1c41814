use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{CoreError, FailureClass};

/// Identifier of one ingestion task, either generated or chosen by the caller
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(String);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_label(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How an upload waits for backend processing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UploadMode {
    /// The backend returns only after chunking and vectorization finish
    #[default]
    Blocking,
    /// The backend returns immediately; completion is detected by list polling
    #[serde(alias = "async")]
    AsyncPolled,
}

impl UploadMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadMode::Blocking => "blocking",
            UploadMode::AsyncPolled => "async-polled",
        }
    }
}

impl std::fmt::Display for UploadMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blocking" | "sync" => Ok(UploadMode::Blocking),
            "async" | "async-polled" | "async_polled" => Ok(UploadMode::AsyncPolled),
            other => Err(CoreError::InvalidInput(format!("unknown upload mode '{other}'"))),
        }
    }
}

/// Lifecycle of an ingestion task.
///
/// `Uploading -> Processing -> Completed | Failed | TimedOut`, with `Cancelled`
/// reachable from any non-terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum IngestionStatus {
    Uploading,
    Processing,
    Completed,
    Failed { class: FailureClass, reason: String },
    TimedOut,
    Cancelled,
}

impl IngestionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, IngestionStatus::Uploading | IngestionStatus::Processing)
    }

    pub fn label(&self) -> &'static str {
        match self {
            IngestionStatus::Uploading => "uploading",
            IngestionStatus::Processing => "processing",
            IngestionStatus::Completed => "completed",
            IngestionStatus::Failed { .. } => "failed",
            IngestionStatus::TimedOut => "timed-out",
            IngestionStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for IngestionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestionStatus::Failed { class, reason } => write!(f, "failed ({class}): {reason}"),
            other => f.write_str(other.label()),
        }
    }
}

/// Point-in-time view of an in-flight ingestion task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub file_name: String,
    pub collection: String,
    pub mode: UploadMode,
    pub status: IngestionStatus,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub task_token: Option<String>,
    pub attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Per-call conversational context.
///
/// Replaces any process-wide "current collection": callers own it and pass it
/// into every chat call.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionContext {
    pub collection: Option<String>,
    pub use_knowledge_base: bool,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self.use_knowledge_base = true;
        self
    }

    pub fn with_knowledge_base(mut self, enabled: bool) -> Self {
        self.use_knowledge_base = enabled;
        self
    }

    /// The collection to ground answers in, if retrieval is active
    pub fn active_collection(&self) -> Option<&str> {
        if self.use_knowledge_base {
            self.collection.as_deref().filter(|c| !c.is_empty())
        } else {
            None
        }
    }
}

/// One entry of a collection's metadata schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Canonical view of a collection as reported by the ingestion backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_dimension: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata_schema: Vec<FieldDescriptor>,
}

impl CollectionSummary {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            embedding_dimension: None,
            metadata_schema: Vec::new(),
        }
    }
}

/// Canonical view of one document inside a collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Display name; not guaranteed unique across re-uploads
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl DocumentRecord {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
        }
    }

    /// Backend identifier when present, otherwise the display name
    pub fn identity(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.name)
    }
}
