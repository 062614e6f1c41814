//! # ragbridge SDK
//!
//! Clients for a document-ingestion backend and a streaming generation backend.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ragbridge_core::{AppConfig, ChatMessage, SessionContext};
//! use ragbridge_sdk::{ChatSession, HttpTransport};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let transport = Arc::new(HttpTransport::new(&config.generation.url)?);
//!     let session = ChatSession::new(transport, &config.generation, &config.chat);
//!
//!     let transcript = vec![ChatMessage::user("What does the handbook say about leave?")];
//!     let ctx = SessionContext::new().with_collection("handbook");
//!     let answer = session
//!         .complete(&transcript, &session.default_params(), &ctx, &CancellationToken::new())
//!         .await?;
//!     println!("{}", answer);
//!
//!     Ok(())
//! }
//! ```

mod chat;
mod error;
mod generation;
mod kb;
mod models;
pub mod normalize;
mod streaming;
mod transport;

pub use chat::{ChatSession, GenerationParams, RequestVariant};
pub use error::{ChatError, ClientError, Result, ShapeError, ShapeErrorKind, TransportError};
pub use generation::GenerationClient;
pub use kb::KnowledgeBaseClient;
pub use models::*;
pub use normalize::{Canonical, ShapeKind};
pub use streaming::{ChatStream, LineOutcome, LineStream, StreamChunk, StreamDecoder};
pub use transport::{
    HttpResponse, HttpTransport, HttpTransportBuilder, MultipartBody, MultipartPart,
    StreamingResponse, Transport,
};

/// SDK version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
