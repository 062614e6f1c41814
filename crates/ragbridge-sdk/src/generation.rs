//! Generation backend client

use ragbridge_core::{ChatConfig, GenerationConfig};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, warn};

use crate::chat::ChatSession;
use crate::models::HealthReport;
use crate::transport::Transport;

/// Health probing plus a factory for chat sessions
#[derive(Clone)]
pub struct GenerationClient {
    transport: Arc<dyn Transport>,
    config: GenerationConfig,
}

impl std::fmt::Debug for GenerationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl GenerationClient {
    pub fn new(transport: Arc<dyn Transport>, config: GenerationConfig) -> Self {
        Self { transport, config }
    }

    pub fn health_timeout(&self) -> Duration {
        self.config.health_timeout()
    }

    /// Probe `GET /health`, optionally asking the backend to check its dependencies.
    ///
    /// Never fails: an unreachable or unhealthy backend is reported through the
    /// returned [`HealthReport`].
    #[instrument(skip(self))]
    pub async fn health(&self, check_dependencies: bool) -> HealthReport {
        let query: &[(&str, &str)] = if check_dependencies {
            &[("check_dependencies", "true")]
        } else {
            &[]
        };

        match self
            .transport
            .get("/health", query, self.config.health_timeout())
            .await
        {
            Ok(response) => {
                let body = serde_json::from_slice::<Value>(&response.body)
                    .unwrap_or_else(|_| Value::String(response.text()));
                HealthReport {
                    healthy: true,
                    status: Some(response.status),
                    body: Some(body),
                    reason: None,
                }
            }
            Err(e) => {
                warn!(error = %e, class = %e.class(), "Health check failed");
                HealthReport {
                    healthy: false,
                    status: e.status_code(),
                    body: None,
                    reason: Some(format!("{} ({})", e, e.class())),
                }
            }
        }
    }

    /// A chat session bound to this backend
    pub fn chat_session(&self, chat: &ChatConfig) -> ChatSession {
        ChatSession::new(self.transport.clone(), &self.config, chat)
    }
}
