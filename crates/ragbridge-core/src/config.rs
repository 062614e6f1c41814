use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{CoreError, Result};
use crate::types::UploadMode;

/// Environment variable prefix used by [`AppConfig::load`].
pub const ENV_PREFIX: &str = "RAGBRIDGE";

/// Default assistant directive prepended to every chat transcript.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a professional AI assistant. Follow these rules strictly:\n\
1. Answer accurately, helpfully and in detail.\n\
2. Keep a polite and professional tone.\n\
3. Base your answers on the provided documents whenever they are relevant.";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub ingestion: IngestionEndpointConfig,
    pub generation: GenerationConfig,
    pub upload: UploadConfig,
    pub chat: ChatConfig,
    pub collection: CollectionConfig,
}

impl AppConfig {
    /// Load configuration from defaults and `RAGBRIDGE__*` environment variables
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from(None, ENV_PREFIX)
    }

    /// Load configuration from an optional file with environment overrides.
    ///
    /// Precedence, lowest first: built-in defaults, the file, the environment.
    pub fn load_from(path: Option<&Path>, prefix: &str) -> std::result::Result<Self, ConfigError> {
        let mut builder = Self::with_defaults(Config::builder())?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        config.try_deserialize()
    }

    fn with_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> std::result::Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            .set_default("ingestion.url", "http://localhost:8082")?
            .set_default("ingestion.request_timeout_secs", 30)?
            .set_default("generation.url", "http://localhost:8081/v1")?
            .set_default("generation.endpoint", "/generate")?
            .set_default("generation.stream_idle_timeout_secs", 60)?
            .set_default("generation.health_timeout_secs", 5)?
            .set_default("upload.blocking_timeout_secs", 300)?
            .set_default("upload.poll_interval_secs", 5)?
            .set_default("upload.max_poll_attempts", 60)?
            .set_default("upload.chunk_size", 512)?
            .set_default("upload.chunk_overlap", 150)?
            .set_default("upload.generate_summary", false)?
            .set_default("upload.default_mode", "blocking")?
            .set_default("upload.batch_concurrency", 1)?
            .set_default("chat.system_prompt", DEFAULT_SYSTEM_PROMPT)?
            .set_default("chat.include_system_prompt", true)?
            .set_default("chat.temperature", 0.1)?
            .set_default("chat.top_p", 0.9)?
            .set_default("chat.max_tokens", 4096)?
            .set_default("chat.reranker_top_k", 10)?
            .set_default("chat.vdb_top_k", 10)?
            .set_default("chat.confidence_threshold", 0.5)?
            .set_default("chat.minimal_max_tokens", 1000)?
            .set_default("collection.default_embedding_dimension", 2048)
    }

    /// Reject combinations the clients cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.ingestion.url.trim().is_empty() {
            return Err(CoreError::Config("ingestion.url must not be empty".into()));
        }
        if self.generation.url.trim().is_empty() {
            return Err(CoreError::Config("generation.url must not be empty".into()));
        }
        self.upload.validate()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ingestion: IngestionEndpointConfig::default(),
            generation: GenerationConfig::default(),
            upload: UploadConfig::default(),
            chat: ChatConfig::default(),
            collection: CollectionConfig::default(),
        }
    }
}

/// Document-ingestion backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionEndpointConfig {
    pub url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl IngestionEndpointConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for IngestionEndpointConfig {
    fn default() -> Self {
        Self::new("http://localhost:8082")
    }
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Conversational generation backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub url: String,
    #[serde(default = "default_generation_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_stream_idle_timeout_secs")]
    pub stream_idle_timeout_secs: u64,
    #[serde(default = "default_health_timeout_secs")]
    pub health_timeout_secs: u64,
}

impl GenerationConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            endpoint: default_generation_endpoint(),
            stream_idle_timeout_secs: default_stream_idle_timeout_secs(),
            health_timeout_secs: default_health_timeout_secs(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn stream_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_idle_timeout_secs)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self::new("http://localhost:8081/v1")
    }
}

fn default_generation_endpoint() -> String {
    "/generate".to_string()
}

fn default_stream_idle_timeout_secs() -> u64 {
    60
}

fn default_health_timeout_secs() -> u64 {
    5
}

/// Upload and completion-polling policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_blocking_timeout_secs")]
    pub blocking_timeout_secs: u64,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: u32,
    #[serde(default)]
    pub generate_summary: bool,
    #[serde(default)]
    pub default_mode: UploadMode,
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,
}

impl UploadConfig {
    pub fn blocking_timeout(&self) -> Duration {
        Duration::from_secs(self.blocking_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn with_poll_policy(mut self, interval_secs: u64, max_attempts: u32) -> Self {
        self.poll_interval_secs = interval_secs;
        self.max_poll_attempts = max_attempts;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            return Err(CoreError::Config(
                "upload.poll_interval_secs must be positive".into(),
            ));
        }
        if self.max_poll_attempts == 0 {
            return Err(CoreError::Config(
                "upload.max_poll_attempts must be positive".into(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(CoreError::Config(format!(
                "upload.chunk_overlap ({}) must be smaller than upload.chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            blocking_timeout_secs: default_blocking_timeout_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            max_poll_attempts: default_max_poll_attempts(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            generate_summary: false,
            default_mode: UploadMode::default(),
            batch_concurrency: default_batch_concurrency(),
        }
    }
}

fn default_blocking_timeout_secs() -> u64 {
    300
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_max_poll_attempts() -> u32 {
    60
}

fn default_chunk_size() -> u32 {
    512
}

fn default_chunk_overlap() -> u32 {
    150
}

fn default_batch_concurrency() -> usize {
    1
}

/// Generation parameters and the assistant directive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_true")]
    pub include_system_prompt: bool,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_top_k")]
    pub reranker_top_k: u32,
    #[serde(default = "default_top_k")]
    pub vdb_top_k: u32,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    #[serde(default = "default_minimal_max_tokens")]
    pub minimal_max_tokens: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            include_system_prompt: true,
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_tokens: default_max_tokens(),
            reranker_top_k: default_top_k(),
            vdb_top_k: default_top_k(),
            confidence_threshold: default_confidence_threshold(),
            minimal_max_tokens: default_minimal_max_tokens(),
        }
    }
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_true() -> bool {
    true
}

fn default_temperature() -> f64 {
    0.1
}

fn default_top_p() -> f64 {
    0.9
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_top_k() -> u32 {
    10
}

fn default_confidence_threshold() -> f64 {
    0.5
}

fn default_minimal_max_tokens() -> u32 {
    1000
}

/// Collection creation defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    #[serde(default = "default_embedding_dimension")]
    pub default_embedding_dimension: u32,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            default_embedding_dimension: default_embedding_dimension(),
        }
    }
}

fn default_embedding_dimension() -> u32 {
    2048
}
