//! Scripted ingestion backend for orchestrator tests

#![allow(dead_code)]

use async_trait::async_trait;
use ragbridge_core::{CollectionConfig, IngestionEndpointConfig, UploadConfig};
use ragbridge_ingestion::IngestionOrchestrator;
use ragbridge_sdk::{
    HttpResponse, KnowledgeBaseClient, MultipartBody, StreamingResponse, Transport,
    TransportError,
};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A recorded multipart upload
#[derive(Debug, Clone)]
pub struct UploadCall {
    pub file_name: String,
    pub directive: Value,
    pub deadline: Duration,
}

/// Answers uploads with a fixed reply and lists the uploaded file once a
/// configured number of polls has been made
pub struct ScriptedBackend {
    listed_name: String,
    upload_reply: Result<Value, TransportError>,
    upload_delay: Duration,
    appears_on_poll: Option<u32>,
    poll_error: Option<TransportError>,
    polls: AtomicU32,
    uploads: Mutex<Vec<UploadCall>>,
}

impl ScriptedBackend {
    pub fn new(listed_name: &str) -> Self {
        Self {
            listed_name: listed_name.to_string(),
            upload_reply: Ok(json!({"message": "Document upload started", "task_id": "task-42"})),
            upload_delay: Duration::ZERO,
            appears_on_poll: None,
            poll_error: None,
            polls: AtomicU32::new(0),
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub fn upload_reply(mut self, reply: Result<Value, TransportError>) -> Self {
        self.upload_reply = reply;
        self
    }

    pub fn upload_delay(mut self, delay: Duration) -> Self {
        self.upload_delay = delay;
        self
    }

    pub fn appears_on_poll(mut self, poll: u32) -> Self {
        self.appears_on_poll = Some(poll);
        self
    }

    pub fn poll_error(mut self, error: TransportError) -> Self {
        self.poll_error = Some(error);
        self
    }

    pub fn polls(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn uploads(&self) -> Vec<UploadCall> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedBackend {
    async fn get(
        &self,
        path: &str,
        query: &[(&str, &str)],
        _deadline: Duration,
    ) -> Result<HttpResponse, TransportError> {
        assert_eq!(path, "/documents");
        assert!(query.iter().any(|(k, _)| *k == "collection_name"));

        let poll = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(error) = &self.poll_error {
            return Err(error.clone());
        }

        let mut documents = vec![json!({"document_name": "unrelated.txt"})];
        if self.appears_on_poll.is_some_and(|n| poll >= n) {
            documents.push(json!({"document_name": self.listed_name}));
        }
        Ok(HttpResponse::json(200, &json!({"documents": documents})))
    }

    async fn post_json(
        &self,
        _path: &str,
        _body: &Value,
        _deadline: Duration,
    ) -> Result<HttpResponse, TransportError> {
        Err(TransportError::InvalidRequest("not scripted".into()))
    }

    async fn post_multipart(
        &self,
        path: &str,
        body: MultipartBody,
        deadline: Duration,
    ) -> Result<HttpResponse, TransportError> {
        assert_eq!(path, "/documents");
        let directive: Value =
            serde_json::from_str(body.text_part("data").unwrap_or("null")).unwrap();
        self.uploads.lock().unwrap().push(UploadCall {
            file_name: body.file_name("documents").unwrap_or_default().to_string(),
            directive,
            deadline,
        });

        if !self.upload_delay.is_zero() {
            tokio::time::sleep(self.upload_delay).await;
        }

        self.upload_reply
            .clone()
            .map(|reply| HttpResponse::json(200, &reply))
    }

    async fn delete(
        &self,
        _path: &str,
        _query: &[(&str, &str)],
        _body: Option<&Value>,
        _deadline: Duration,
    ) -> Result<HttpResponse, TransportError> {
        Err(TransportError::InvalidRequest("not scripted".into()))
    }

    async fn post_json_stream(
        &self,
        _path: &str,
        _body: &Value,
        _deadline: Duration,
    ) -> Result<StreamingResponse, TransportError> {
        Err(TransportError::InvalidRequest("not scripted".into()))
    }
}

pub fn orchestrator(backend: Arc<ScriptedBackend>, config: UploadConfig) -> IngestionOrchestrator {
    let kb = KnowledgeBaseClient::new(
        backend,
        &IngestionEndpointConfig::new("http://kb.test"),
        &CollectionConfig::default(),
    );
    IngestionOrchestrator::new(kb, config).unwrap()
}

/// Write a small file named `name` under `dir`
pub fn fixture(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"quarterly numbers").unwrap();
    path
}
