//! Request and response models for the ragbridge backends

use serde::{Deserialize, Serialize};
use serde_json::Value;

use ragbridge_core::{FieldDescriptor, UploadConfig};

/// Text splitting applied by the ingestion backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitOptions {
    pub chunk_size: u32,
    pub chunk_overlap: u32,
}

/// JSON directive carried in the `data` part of a document upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadDirective {
    pub collection_name: String,
    pub blocking: bool,
    pub split_options: SplitOptions,
    #[serde(default)]
    pub custom_metadata: Vec<Value>,
    #[serde(default)]
    pub generate_summary: bool,
}

impl UploadDirective {
    pub fn from_config(collection: impl Into<String>, blocking: bool, config: &UploadConfig) -> Self {
        Self {
            collection_name: collection.into(),
            blocking,
            split_options: SplitOptions {
                chunk_size: config.chunk_size,
                chunk_overlap: config.chunk_overlap,
            },
            custom_metadata: Vec::new(),
            generate_summary: config.generate_summary,
        }
    }
}

/// File contents prepared for a multipart upload
#[derive(Debug, Clone)]
pub struct DocumentPayload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: bytes::Bytes,
}

/// Body of `POST /collection`
#[derive(Debug, Clone, Serialize)]
pub(crate) struct CreateCollectionRequest<'a> {
    pub collection_name: &'a str,
    pub embedding_dimension: u32,
    pub metadata_schema: &'a [FieldDescriptor],
}

/// One per-document failure reported in an upload acknowledgement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedDocument {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl std::fmt::Display for FailedDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "{}: {}", self.name, reason),
            None => f.write_str(&self.name),
        }
    }
}

/// Canonical upload acknowledgement
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UploadAck {
    /// Backend-issued task token; diagnostic only
    pub task_token: Option<String>,
    pub failures: Vec<FailedDocument>,
    pub message: Option<String>,
}

impl UploadAck {
    /// Whether the backend reported any per-document failure
    pub fn is_partial_failure(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn failure_summary(&self) -> String {
        self.failures
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Result of a generation backend health probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub healthy: bool,
    /// HTTP status, absent when the backend was unreachable
    pub status: Option<u16>,
    /// Raw body; its shape is backend-defined
    pub body: Option<Value>,
    /// Why the probe failed
    pub reason: Option<String>,
}
