//! Knowledge-base (document-ingestion backend) client

use ragbridge_core::{
    CollectionConfig, CollectionSummary, DocumentRecord, FieldDescriptor, IngestionEndpointConfig,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::error::{ClientError, Result};
use crate::models::{CreateCollectionRequest, DocumentPayload, UploadAck, UploadDirective};
use crate::normalize::{self, ShapeKind};
use crate::transport::{HttpResponse, MultipartBody, Transport};

/// Client for collections and documents on the ingestion backend.
///
/// Every list response passes through [`crate::normalize`] before use.
#[derive(Clone)]
pub struct KnowledgeBaseClient {
    transport: Arc<dyn Transport>,
    deadline: Duration,
    default_dimension: u32,
}

impl std::fmt::Debug for KnowledgeBaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeBaseClient")
            .field("deadline", &self.deadline)
            .field("default_dimension", &self.default_dimension)
            .finish_non_exhaustive()
    }
}

impl KnowledgeBaseClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoint: &IngestionEndpointConfig,
        collections: &CollectionConfig,
    ) -> Self {
        Self {
            transport,
            deadline: endpoint.request_timeout(),
            default_dimension: collections.default_embedding_dimension,
        }
    }

    /// Deadline for list, create, and delete calls
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    #[instrument(skip(self))]
    pub async fn list_collections(&self) -> Result<Vec<CollectionSummary>> {
        let response = self.transport.get("/collections", &[], self.deadline).await?;
        let value = normalize::parse_body(&response.body, ShapeKind::CollectionList)?;
        let collections = normalize::collections(&value)?;
        debug!(count = collections.len(), "Listed collections");
        Ok(collections)
    }

    /// Create a collection; returns the backend's message, if any
    #[instrument(skip(self, metadata_schema))]
    pub async fn create_collection(
        &self,
        name: &str,
        embedding_dimension: Option<u32>,
        metadata_schema: &[FieldDescriptor],
    ) -> Result<Option<String>> {
        let name = required("collection name", name)?;
        let request = CreateCollectionRequest {
            collection_name: name,
            embedding_dimension: embedding_dimension.unwrap_or(self.default_dimension),
            metadata_schema,
        };

        let body = serde_json::to_value(&request)?;
        let response = self.transport.post_json("/collection", &body, self.deadline).await?;
        info!(collection = %name, "Created collection");
        Ok(message(&response))
    }

    #[instrument(skip(self))]
    pub async fn delete_collection(&self, name: &str) -> Result<Option<String>> {
        let name = required("collection name", name)?;
        let body = Value::from(vec![name]);
        let response = self
            .transport
            .delete("/collections", &[], Some(&body), self.deadline)
            .await?;
        info!(collection = %name, "Deleted collection");
        Ok(message(&response))
    }

    #[instrument(skip(self))]
    pub async fn list_documents(&self, collection: &str) -> Result<Vec<DocumentRecord>> {
        let collection = required("collection name", collection)?;
        let response = self
            .transport
            .get("/documents", &[("collection_name", collection)], self.deadline)
            .await?;
        let value = normalize::parse_body(&response.body, ShapeKind::DocumentList)?;
        Ok(normalize::documents(&value)?)
    }

    /// Remove documents by display name
    #[instrument(skip(self, names), fields(count = names.len()))]
    pub async fn delete_documents(&self, collection: &str, names: &[String]) -> Result<Option<String>> {
        let collection = required("collection name", collection)?;
        if names.is_empty() {
            return Err(ClientError::InvalidInput(
                "at least one document name is required".into(),
            ));
        }

        let body = Value::from(names.to_vec());
        let response = self
            .transport
            .delete(
                "/documents",
                &[("collection_name", collection)],
                Some(&body),
                self.deadline,
            )
            .await?;
        info!(collection = %collection, count = names.len(), "Deleted documents");
        Ok(message(&response))
    }

    /// Issue one multipart upload and normalize the acknowledgement
    #[instrument(skip(self, document, directive), fields(file_name = %document.file_name, blocking = directive.blocking))]
    pub async fn upload_document(
        &self,
        document: DocumentPayload,
        directive: &UploadDirective,
        deadline: Duration,
    ) -> Result<UploadAck> {
        required("collection name", &directive.collection_name)?;

        let body = MultipartBody::new()
            .file(
                "documents",
                document.file_name,
                document.mime_type,
                document.bytes,
            )
            .text("data", serde_json::to_string(directive)?);

        let response = self
            .transport
            .post_multipart("/documents", body, deadline)
            .await?;
        let value = normalize::parse_body(&response.body, ShapeKind::UploadAck)?;
        Ok(normalize::upload_ack(&value)?)
    }
}

fn required<'a>(what: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ClientError::InvalidInput(format!("{} must not be empty", what)))
    } else {
        Ok(trimmed)
    }
}

/// The `message` field of a passthrough response, when it is JSON
fn message(response: &HttpResponse) -> Option<String> {
    serde_json::from_slice::<Value>(&response.body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
}
