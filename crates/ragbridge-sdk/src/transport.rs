//! HTTP transport shared by every ragbridge client
//!
//! The [`Transport`] trait is the seam between business logic and the network:
//! clients and the ingestion orchestrator only ever talk to a `dyn Transport`,
//! so tests substitute a scripted fake.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, TryStreamExt};
use ragbridge_infra::with_deadline;
use reqwest::{header, Client, RequestBuilder};
use serde_json::Value;
use std::io;
use std::pin::Pin;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;
use tracing::{debug, instrument};
use url::Url;

use crate::error::TransportError;
use crate::streaming::LineStream;

/// A fully materialized successful response
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn json(status: u16, body: &Value) -> Self {
        Self::new(status, body.to_string())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A successful response whose body is consumed line by line
pub struct StreamingResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub lines: LineStream,
}

impl StreamingResponse {
    /// Whether the backend answered with one JSON object instead of an event stream
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.to_ascii_lowercase().starts_with("application/json"))
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// One part of a multipart body
#[derive(Debug, Clone, PartialEq)]
pub enum MultipartPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        mime_type: String,
        bytes: Bytes,
    },
}

/// Transport-neutral multipart body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultipartBody {
    parts: Vec<MultipartPart>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(MultipartPart::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        self.parts.push(MultipartPart::File {
            name: name.into(),
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        });
        self
    }

    pub fn parts(&self) -> &[MultipartPart] {
        &self.parts
    }

    /// Value of the first text part with the given field name
    pub fn text_part(&self, field: &str) -> Option<&str> {
        self.parts.iter().find_map(|part| match part {
            MultipartPart::Text { name, value } if name == field => Some(value.as_str()),
            _ => None,
        })
    }

    /// File name of the first file part with the given field name
    pub fn file_name(&self, field: &str) -> Option<&str> {
        self.parts.iter().find_map(|part| match part {
            MultipartPart::File { name, file_name, .. } if name == field => Some(file_name.as_str()),
            _ => None,
        })
    }

    fn into_form(self) -> Result<reqwest::multipart::Form, TransportError> {
        let mut form = reqwest::multipart::Form::new();
        for part in self.parts {
            form = match part {
                MultipartPart::Text { name, value } => form.text(name, value),
                MultipartPart::File {
                    name,
                    file_name,
                    mime_type,
                    bytes,
                } => {
                    let part = reqwest::multipart::Part::bytes(bytes.to_vec())
                        .file_name(file_name)
                        .mime_str(&mime_type)
                        .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
                    form.part(name, part)
                }
            };
        }
        Ok(form)
    }
}

/// Uniform HTTP operations with caller-supplied deadlines.
///
/// Non-success statuses are returned as [`TransportError::Server`]; exceeding the
/// deadline is always [`TransportError::Timeout`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(
        &self,
        path: &str,
        query: &[(&str, &str)],
        deadline: Duration,
    ) -> Result<HttpResponse, TransportError>;

    async fn post_json(
        &self,
        path: &str,
        body: &Value,
        deadline: Duration,
    ) -> Result<HttpResponse, TransportError>;

    async fn post_multipart(
        &self,
        path: &str,
        body: MultipartBody,
        deadline: Duration,
    ) -> Result<HttpResponse, TransportError>;

    async fn delete(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
        deadline: Duration,
    ) -> Result<HttpResponse, TransportError>;

    /// POST a JSON body and expose the response as a live line source.
    ///
    /// The deadline bounds the wait for response headers and each subsequent
    /// line read.
    async fn post_json_stream(
        &self,
        path: &str,
        body: &Value,
        deadline: Duration,
    ) -> Result<StreamingResponse, TransportError>;
}

/// Builder for creating an [`HttpTransport`]
#[derive(Default)]
pub struct HttpTransportBuilder {
    base_url: Option<String>,
    connect_timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl HttpTransportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URL; request paths are appended to it
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn build(self) -> Result<HttpTransport, TransportError> {
        let raw = self
            .base_url
            .ok_or_else(|| TransportError::InvalidRequest("base URL is required".into()))?;

        // Url::join replaces the last path segment unless the base ends in '/'
        let normalized = if raw.ends_with('/') {
            raw
        } else {
            format!("{}/", raw)
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| TransportError::InvalidRequest(format!("{}: {}", normalized, e)))?;

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("ragbridge-sdk/{}", env!("CARGO_PKG_VERSION")));

        let mut builder = Client::builder().user_agent(user_agent);
        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        Ok(HttpTransport { http, base_url })
    }
}

/// [`Transport`] backed by `reqwest`
#[derive(Clone)]
pub struct HttpTransport {
    http: Client,
    base_url: Url,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

impl HttpTransport {
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::new()
    }

    /// Create a transport with default settings
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        Self::builder().base_url(base_url).build()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url, TransportError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| TransportError::InvalidRequest(format!("{}: {}", path, e)))
    }

    /// Send a request and materialize the body within `deadline`
    async fn execute(
        &self,
        request: RequestBuilder,
        deadline: Duration,
    ) -> Result<HttpResponse, TransportError> {
        let exchange = async {
            let response = request.send().await.map_err(|e| classify(e, deadline))?;
            let status = response.status().as_u16();
            let body = response.bytes().await.map_err(|e| classify(e, deadline))?;
            Ok::<_, TransportError>((status, body))
        };

        let (status, body) = with_deadline("http_request", deadline, exchange)
            .await
            .map_err(|e| TransportError::Timeout(e.duration))??;

        debug!(status, bytes = body.len(), "Received response");

        if (200..300).contains(&status) {
            Ok(HttpResponse { status, body })
        } else {
            Err(TransportError::Server {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            })
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, query), fields(base = %self.base_url))]
    async fn get(
        &self,
        path: &str,
        query: &[(&str, &str)],
        deadline: Duration,
    ) -> Result<HttpResponse, TransportError> {
        let request = self.http.get(self.url(path)?).query(query);
        self.execute(request, deadline).await
    }

    #[instrument(skip(self, body), fields(base = %self.base_url))]
    async fn post_json(
        &self,
        path: &str,
        body: &Value,
        deadline: Duration,
    ) -> Result<HttpResponse, TransportError> {
        let request = self
            .http
            .post(self.url(path)?)
            .header(header::ACCEPT, "application/json")
            .json(body);
        self.execute(request, deadline).await
    }

    #[instrument(skip(self, body), fields(base = %self.base_url, parts = body.parts().len()))]
    async fn post_multipart(
        &self,
        path: &str,
        body: MultipartBody,
        deadline: Duration,
    ) -> Result<HttpResponse, TransportError> {
        let request = self.http.post(self.url(path)?).multipart(body.into_form()?);
        self.execute(request, deadline).await
    }

    #[instrument(skip(self, query, body), fields(base = %self.base_url))]
    async fn delete(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
        deadline: Duration,
    ) -> Result<HttpResponse, TransportError> {
        let mut request = self.http.delete(self.url(path)?).query(query);
        if let Some(body) = body {
            request = request.json(body);
        }
        self.execute(request, deadline).await
    }

    #[instrument(skip(self, body), fields(base = %self.base_url))]
    async fn post_json_stream(
        &self,
        path: &str,
        body: &Value,
        deadline: Duration,
    ) -> Result<StreamingResponse, TransportError> {
        let request = self
            .http
            .post(self.url(path)?)
            .header(header::ACCEPT, "text/event-stream, application/json")
            .json(body);

        let response = with_deadline("http_stream_open", deadline, request.send())
            .await
            .map_err(|e| TransportError::Timeout(e.duration))?
            .map_err(|e| classify(e, deadline))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = with_deadline("http_stream_error_body", deadline, response.text())
                .await
                .ok()
                .and_then(|r| r.ok())
                .unwrap_or_default();
            return Err(TransportError::Server { status, body });
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes: Pin<Box<dyn futures::Stream<Item = io::Result<Bytes>> + Send>> = Box::pin(
            response
                .bytes_stream()
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e)),
        );

        Ok(StreamingResponse {
            status,
            content_type,
            lines: split_lines(bytes, deadline),
        })
    }
}

/// Split a byte stream on `\n`, enforcing `idle` between consecutive lines
fn split_lines(
    bytes: Pin<Box<dyn futures::Stream<Item = io::Result<Bytes>> + Send>>,
    idle: Duration,
) -> LineStream {
    let segments = StreamReader::new(bytes).split(b'\n');

    let lines = stream::unfold(Some(segments), move |state| async move {
        let mut segments = state?;
        match tokio::time::timeout(idle, segments.next_segment()).await {
            Err(_) => Some((Err(TransportError::Timeout(idle)), None)),
            Ok(Ok(Some(segment))) => {
                let mut line = String::from_utf8_lossy(&segment).into_owned();
                if line.ends_with('\r') {
                    line.pop();
                }
                Some((Ok(line), Some(segments)))
            }
            Ok(Ok(None)) => None,
            Ok(Err(e)) => Some((Err(classify_io(e, idle)), None)),
        }
    });

    Box::pin(lines)
}

fn classify(error: reqwest::Error, deadline: Duration) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(deadline)
    } else if error.is_builder() {
        TransportError::InvalidRequest(error.to_string())
    } else {
        TransportError::Connection(error.to_string())
    }
}

fn classify_io(error: io::Error, deadline: Duration) -> TransportError {
    let timed_out = error
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<reqwest::Error>())
        .map(reqwest::Error::is_timeout)
        .unwrap_or(error.kind() == io::ErrorKind::TimedOut);

    if timed_out {
        TransportError::Timeout(deadline)
    } else {
        TransportError::Connection(error.to_string())
    }
}
