//! Streaming chat against the generation backend

use futures::{stream, Stream, StreamExt};
use ragbridge_core::{ChatConfig, ChatMessage, GenerationConfig, Role, SessionContext};
use ragbridge_infra::{FallbackChain, ResilienceError};
use serde_json::{json, Value};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::error::{ChatError, TransportError};
use crate::normalize::{self, ShapeKind};
use crate::streaming::{ChatStream, LineOutcome, LineStream, StreamChunk, StreamDecoder};
use crate::transport::Transport;

type OutcomeStream = Pin<Box<dyn Stream<Item = Result<LineOutcome, TransportError>> + Send>>;

/// Request payload shapes, tried in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestVariant {
    /// Retrieval, reranking, and citations
    Full,
    /// Knowledge base disabled
    Simplified,
    /// Messages and sampling only
    Minimal,
}

impl RequestVariant {
    pub const FALLBACK_ORDER: [RequestVariant; 3] = [
        RequestVariant::Full,
        RequestVariant::Simplified,
        RequestVariant::Minimal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestVariant::Full => "full",
            RequestVariant::Simplified => "simplified",
            RequestVariant::Minimal => "minimal",
        }
    }

    /// Build the JSON body for this variant
    pub fn build_payload(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams,
        ctx: &SessionContext,
    ) -> Value {
        match self {
            RequestVariant::Full => {
                let collection = ctx.active_collection();
                json!({
                    "messages": messages,
                    "collection_names": collection.map(|c| vec![c]).unwrap_or_default(),
                    "temperature": params.temperature,
                    "top_p": params.top_p,
                    "max_tokens": params.max_tokens,
                    "reranker_top_k": params.reranker_top_k,
                    "vdb_top_k": params.vdb_top_k,
                    "confidence_threshold": params.confidence_threshold,
                    "use_knowledge_base": collection.is_some(),
                    "enable_citations": true,
                    "enable_guardrails": false,
                    "stream": true,
                })
            }
            RequestVariant::Simplified => json!({
                "messages": messages,
                "collection_names": Vec::<String>::new(),
                "temperature": params.temperature,
                "top_p": params.top_p,
                "max_tokens": params.max_tokens,
                "reranker_top_k": params.reranker_top_k,
                "vdb_top_k": params.vdb_top_k,
                "confidence_threshold": params.confidence_threshold,
                "use_knowledge_base": false,
                "enable_citations": false,
                "enable_guardrails": false,
                "stream": true,
            }),
            RequestVariant::Minimal => json!({
                "messages": messages,
                "use_knowledge_base": false,
                "temperature": params.temperature,
                "max_tokens": params.max_tokens.min(params.minimal_max_tokens),
                "stream": true,
            }),
        }
    }
}

impl std::fmt::Display for RequestVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sampling and retrieval parameters for one request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
    pub reranker_top_k: u32,
    pub vdb_top_k: u32,
    pub confidence_threshold: f64,
    /// Upper bound on `max_tokens` for the minimal variant
    pub minimal_max_tokens: u32,
}

impl From<&ChatConfig> for GenerationParams {
    fn from(config: &ChatConfig) -> Self {
        Self {
            temperature: config.temperature,
            top_p: config.top_p,
            max_tokens: config.max_tokens,
            reranker_top_k: config.reranker_top_k,
            vdb_top_k: config.vdb_top_k,
            confidence_threshold: config.confidence_threshold,
            minimal_max_tokens: config.minimal_max_tokens,
        }
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self::from(&ChatConfig::default())
    }
}

/// Sends transcripts to the generation backend and streams the answer back.
///
/// Each call walks the fallback chain of [`RequestVariant`]s. A variant wins as
/// soon as it produces its first delta; later stream errors are surfaced to the
/// caller instead of triggering another variant.
#[derive(Clone)]
pub struct ChatSession {
    transport: Arc<dyn Transport>,
    endpoint: String,
    system_prompt: String,
    include_system_prompt: bool,
    defaults: GenerationParams,
    deadline: Duration,
    variants: FallbackChain<RequestVariant>,
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("endpoint", &self.endpoint)
            .field("include_system_prompt", &self.include_system_prompt)
            .field("variants", &self.variants.variants())
            .finish()
    }
}

impl ChatSession {
    pub fn new(
        transport: Arc<dyn Transport>,
        generation: &GenerationConfig,
        chat: &ChatConfig,
    ) -> Self {
        Self {
            transport,
            endpoint: generation.endpoint.clone(),
            system_prompt: chat.system_prompt.clone(),
            include_system_prompt: chat.include_system_prompt,
            defaults: GenerationParams::from(chat),
            deadline: generation.stream_idle_timeout(),
            variants: FallbackChain::new("chat", RequestVariant::FALLBACK_ORDER),
        }
    }

    /// Opt in or out of the leading system directive
    pub fn with_system_prompt(mut self, include: bool) -> Self {
        self.include_system_prompt = include;
        self
    }

    /// Replace the fallback list
    pub fn with_variants(mut self, variants: impl IntoIterator<Item = RequestVariant>) -> Self {
        self.variants = FallbackChain::new("chat", variants);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn default_params(&self) -> GenerationParams {
        self.defaults.clone()
    }

    /// The transcript actually sent: the caller's messages in order, led by the
    /// system directive exactly once unless opted out
    pub fn prepare_messages(&self, transcript: &[ChatMessage]) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(transcript.len() + 1);
        let already_present = transcript
            .first()
            .map(|m| m.role == Role::System && m.content == self.system_prompt)
            .unwrap_or(false);

        if self.include_system_prompt && !already_present && !self.system_prompt.is_empty() {
            messages.push(ChatMessage::system(self.system_prompt.clone()));
        }
        messages.extend_from_slice(transcript);
        messages
    }

    /// Send a transcript and stream the answer's text deltas
    #[instrument(skip(self, transcript, params, ctx, cancel), fields(collection = ?ctx.collection, messages = transcript.len()))]
    pub async fn send(
        &self,
        transcript: &[ChatMessage],
        params: &GenerationParams,
        ctx: &SessionContext,
        cancel: &CancellationToken,
    ) -> Result<ChatStream, ChatError> {
        let messages = self.prepare_messages(transcript);

        let result = self
            .variants
            .run(
                cancel,
                |variant| {
                    let payload = variant.build_payload(&messages, params, ctx);
                    self.open(variant, payload, cancel.clone())
                },
                ChatError::should_fall_back,
            )
            .await;

        match result {
            Ok(success) => {
                info!(
                    variant = %success.value.variant(),
                    attempt = success.variant_index + 1,
                    "Chat stream established"
                );
                Ok(success.value)
            }
            Err(ResilienceError::Cancelled) => Err(ChatError::Cancelled),
            Err(ResilienceError::Empty) => Err(ChatError::NoVariants),
            Err(ResilienceError::Aborted(e)) | Err(ResilienceError::Exhausted(e)) => Err(e),
        }
    }

    /// Send a transcript and collect the whole answer
    pub async fn complete(
        &self,
        transcript: &[ChatMessage],
        params: &GenerationParams,
        ctx: &SessionContext,
        cancel: &CancellationToken,
    ) -> Result<String, ChatError> {
        self.send(transcript, params, ctx, cancel)
            .await?
            .collect_content()
            .await
    }

    /// Open one variant and wait for its first delta
    async fn open(
        &self,
        variant: RequestVariant,
        payload: Value,
        cancel: CancellationToken,
    ) -> Result<ChatStream, ChatError> {
        let response = self
            .transport
            .post_json_stream(&self.endpoint, &payload, self.deadline)
            .await?;

        let json_header = response.is_json();
        let mut lines = response.lines;
        if json_header {
            return Self::json_answer(lines, variant).await;
        }

        // The content type is not trusted; a bare JSON body is still one answer
        let mut leading = Vec::new();
        let json_body = loop {
            match lines.next().await {
                Some(Ok(line)) => {
                    let blank = line.trim().is_empty();
                    let opens_json = StreamDecoder::opens_json_body(&line);
                    leading.push(line);
                    if !blank {
                        break opens_json;
                    }
                }
                Some(Err(e)) => return Err(e.into()),
                None => break false,
            }
        };
        let lines: LineStream = Box::pin(stream::iter(leading.into_iter().map(Ok)).chain(lines));
        if json_body {
            debug!(%variant, "Treating untyped body as a JSON completion");
            return Self::json_answer(lines, variant).await;
        }

        let mut outcomes: OutcomeStream = Box::pin(StreamDecoder::outcomes(lines));
        let mut saw_frame = false;

        let first = loop {
            match outcomes.next().await {
                None | Some(Ok(LineOutcome::Chunk(StreamChunk::Done))) => {
                    debug!(%variant, "Stream ended without content");
                    return Ok(ChatStream::from_deltas(Vec::new(), variant));
                }
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(LineOutcome::Chunk(StreamChunk::Text(text)))) => break text,
                Some(Ok(LineOutcome::Malformed(payload))) if !saw_frame => {
                    return Err(ChatError::MalformedFrame(payload));
                }
                Some(Ok(LineOutcome::Malformed(payload))) => {
                    debug!(%variant, payload = %payload, "Skipping malformed stream frame");
                }
                Some(Ok(LineOutcome::NoDelta)) => saw_frame = true,
                Some(Ok(LineOutcome::Skipped)) => {}
            }
        };

        let rest = remaining_deltas(outcomes, cancel);
        let deltas = stream::once(async move { Ok::<_, ChatError>(first) }).chain(rest);
        Ok(ChatStream::new(Box::pin(deltas), variant))
    }

    /// A complete JSON answer delivered as a single delta
    async fn json_answer(lines: LineStream, variant: RequestVariant) -> Result<ChatStream, ChatError> {
        let lines: Vec<String> = lines
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<_, _>>()?;
        let body = lines.join("\n");

        let value = normalize::parse_body(body.as_bytes(), ShapeKind::Completion)?;
        let text = normalize::completion(&value)?;

        let deltas = if text.is_empty() { Vec::new() } else { vec![text] };
        Ok(ChatStream::from_deltas(deltas, variant))
    }
}

/// Deltas after the first one; cancellation ends the stream with `Cancelled`
fn remaining_deltas(
    outcomes: OutcomeStream,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<String, ChatError>> + Send {
    stream::unfold(Some((outcomes, cancel)), |state| async move {
        let (mut outcomes, cancel) = state?;
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Some((Err(ChatError::Cancelled), None)),
                next = outcomes.next() => next,
            };

            match next {
                None | Some(Ok(LineOutcome::Chunk(StreamChunk::Done))) => return None,
                Some(Ok(LineOutcome::Chunk(StreamChunk::Text(text)))) => {
                    return Some((Ok(text), Some((outcomes, cancel))));
                }
                Some(Ok(LineOutcome::Malformed(payload))) => {
                    debug!(payload = %payload, "Skipping malformed stream frame");
                }
                Some(Ok(LineOutcome::NoDelta | LineOutcome::Skipped)) => {}
                Some(Err(e)) => return Some((Err(e.into()), None)),
            }
        }
    })
}
