//! Configuration loading and client construction for commands

use anyhow::{Context, Result};
use tracing::debug;
use ragbridge_core::{AppConfig, ENV_PREFIX};
use ragbridge_ingestion::IngestionOrchestrator;
use ragbridge_sdk::{GenerationClient, HttpTransport, KnowledgeBaseClient, Transport};
use std::path::PathBuf;
use std::sync::Arc;

use crate::output::OutputFormat;
use crate::Cli;

/// Effective configuration plus global output options
pub struct AppContext {
    pub config: AppConfig,
    /// File the configuration was read from, if any
    pub source: Option<PathBuf>,
    pub format: OutputFormat,
}

/// `<config dir>/ragbridge/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("ragbridge").join("config.toml"))
}

impl AppContext {
    /// Defaults, then the config file, then `RAGBRIDGE__*`, then command-line overrides
    pub fn load(cli: &Cli) -> Result<Self> {
        let source = match &cli.config {
            Some(path) => Some(path.clone()),
            None => default_config_path().filter(|path| path.exists()),
        };

        let mut config = AppConfig::load_from(source.as_deref(), ENV_PREFIX)
            .context("Failed to load configuration")?;

        if let Some(url) = &cli.ingestion_url {
            config.ingestion.url = url.clone();
        }
        if let Some(url) = &cli.generation_url {
            config.generation.url = url.clone();
        }
        config.validate().context("Invalid configuration")?;
        debug!(
            source = ?source,
            ingestion = %config.ingestion.url,
            generation = %config.generation.url,
            "Loaded configuration"
        );

        let format = cli
            .format
            .parse::<OutputFormat>()
            .map_err(|e| anyhow::anyhow!(e))?;

        Ok(Self {
            config,
            source,
            format,
        })
    }

    fn transport(url: &str) -> Result<Arc<dyn Transport>> {
        let transport = HttpTransport::builder()
            .base_url(url)
            .user_agent(format!("ragbridge-cli/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .with_context(|| format!("Invalid backend URL {}", url))?;
        Ok(Arc::new(transport))
    }

    pub fn knowledge_base(&self) -> Result<KnowledgeBaseClient> {
        let transport = Self::transport(&self.config.ingestion.url)?;
        Ok(KnowledgeBaseClient::new(
            transport,
            &self.config.ingestion,
            &self.config.collection,
        ))
    }

    pub fn generation(&self) -> Result<GenerationClient> {
        let transport = Self::transport(&self.config.generation.url)?;
        Ok(GenerationClient::new(transport, self.config.generation.clone()))
    }

    pub fn orchestrator(&self) -> Result<IngestionOrchestrator> {
        Ok(IngestionOrchestrator::new(
            self.knowledge_base()?,
            self.config.upload.clone(),
        )?)
    }
}
