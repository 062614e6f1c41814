//! Event-stream decoding for chat responses
//!
//! [`StreamDecoder`] turns the line source exposed by the transport into ordered
//! [`StreamChunk`]s. It never accumulates text: every chunk carries exactly one
//! delta, and concatenation is the caller's job.

use futures::{stream, Stream, StreamExt};
use serde_json::Value;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::debug;

use crate::chat::RequestVariant;
use crate::error::{ChatError, TransportError};
use crate::normalize;

/// Lines of a response body in arrival order
pub type LineStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// One decoded unit of a response stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    /// Non-empty text to append
    Text(String),
    /// Terminal marker
    Done,
}

/// What a single line decoded to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Chunk(StreamChunk),
    /// A data frame whose payload is not JSON
    Malformed(String),
    /// A decoded data frame without a text delta
    NoDelta,
    /// Blank line, comment, or any line without the data prefix
    Skipped,
}

/// Stateless decoder for `data: {...}` event streams
pub struct StreamDecoder;

impl StreamDecoder {
    /// Decode one line
    pub fn decode_line(line: &str) -> LineOutcome {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            return LineOutcome::Skipped;
        }

        let payload = match line.strip_prefix(DATA_PREFIX) {
            Some(rest) => rest.strip_prefix(' ').unwrap_or(rest),
            None => return LineOutcome::Skipped,
        };

        if payload.trim() == DONE_SENTINEL {
            return LineOutcome::Chunk(StreamChunk::Done);
        }

        match serde_json::from_str::<Value>(payload) {
            Ok(envelope) => match normalize::delta_content(&envelope) {
                Some(delta) if !delta.is_empty() => {
                    LineOutcome::Chunk(StreamChunk::Text(delta.to_string()))
                }
                _ => LineOutcome::NoDelta,
            },
            Err(_) => LineOutcome::Malformed(payload.to_string()),
        }
    }

    /// Whether the first non-blank line of a body starts a bare JSON document
    pub fn opens_json_body(line: &str) -> bool {
        line.trim_start().starts_with('{')
    }

    /// Decode every line, stopping after the terminal sentinel.
    ///
    /// A transport error is yielded after whatever was already decoded and ends
    /// the sequence.
    pub fn outcomes<S>(lines: S) -> impl Stream<Item = Result<LineOutcome, TransportError>>
    where
        S: Stream<Item = Result<String, TransportError>> + Unpin,
    {
        stream::unfold(Some(lines), |state| async move {
            let mut lines = state?;
            match lines.next().await {
                None => None,
                Some(Err(e)) => Some((Err(e), None)),
                Some(Ok(line)) => {
                    let outcome = Self::decode_line(&line);
                    let rest = match outcome {
                        LineOutcome::Chunk(StreamChunk::Done) => None,
                        _ => Some(lines),
                    };
                    Some((Ok(outcome), rest))
                }
            }
        })
    }

    /// Decode lines into chunks, silently skipping malformed frames
    pub fn decode<S>(lines: S) -> impl Stream<Item = Result<StreamChunk, TransportError>>
    where
        S: Stream<Item = Result<String, TransportError>> + Unpin,
    {
        Self::outcomes(lines).filter_map(|outcome| async move {
            match outcome {
                Ok(LineOutcome::Chunk(chunk)) => Some(Ok(chunk)),
                Ok(LineOutcome::Malformed(payload)) => {
                    debug!(payload = %payload, "Skipping malformed stream frame");
                    None
                }
                Ok(LineOutcome::NoDelta | LineOutcome::Skipped) => None,
                Err(e) => Some(Err(e)),
            }
        })
    }
}

/// Ordered text deltas of one chat answer
pub struct ChatStream {
    inner: Pin<Box<dyn Stream<Item = Result<String, ChatError>> + Send>>,
    variant: RequestVariant,
}

impl ChatStream {
    pub fn new(
        stream: Pin<Box<dyn Stream<Item = Result<String, ChatError>> + Send>>,
        variant: RequestVariant,
    ) -> Self {
        Self {
            inner: stream,
            variant,
        }
    }

    /// A stream over already-known deltas
    pub fn from_deltas<I>(deltas: I, variant: RequestVariant) -> Self
    where
        I: IntoIterator<Item = String>,
        I::IntoIter: Send + 'static,
    {
        Self::new(Box::pin(stream::iter(deltas.into_iter().map(Ok))), variant)
    }

    /// The request variant that produced this answer
    pub fn variant(&self) -> RequestVariant {
        self.variant
    }

    /// Collect all content from the stream into a single string
    pub async fn collect_content(mut self) -> Result<String, ChatError> {
        let mut content = String::new();

        while let Some(delta) = self.next().await {
            content.push_str(&delta?);
        }

        Ok(content)
    }
}

impl Stream for ChatStream {
    type Item = Result<String, ChatError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl std::fmt::Debug for ChatStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatStream")
            .field("variant", &self.variant)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_opens_json_body() {
        assert!(StreamDecoder::opens_json_body(r#"{"choices": []}"#));
        assert!(StreamDecoder::opens_json_body("  {"));
        assert!(!StreamDecoder::opens_json_body(r#"data: {"choices": []}"#));
        assert!(!StreamDecoder::opens_json_body(": keep-alive"));
    }

    fn lines(raw: &[&str]) -> LineStream {
        let owned: Vec<Result<String, TransportError>> =
            raw.iter().map(|l| Ok(l.to_string())).collect();
        Box::pin(stream::iter(owned))
    }

    fn frame(delta: &str) -> String {
        format!(
            "data: {}",
            serde_json::json!({"choices": [{"delta": {"content": delta}}]})
        )
    }

    #[tokio::test]
    async fn test_well_formed_sequence() {
        let input = [
            "data: {\"choices\":[{\"delta\":{\"content\":\"A\"}}]}",
            "data: {\"choices\":[{\"delta\":{\"content\":\"B\"}}]}",
            "data: [DONE]",
        ];
        let chunks: Vec<_> = StreamDecoder::decode(lines(&input)).collect().await;
        let chunks: Vec<StreamChunk> = chunks.into_iter().map(|c| c.unwrap()).collect();

        assert_eq!(
            chunks,
            vec![
                StreamChunk::Text("A".into()),
                StreamChunk::Text("B".into()),
                StreamChunk::Done
            ]
        );
    }

    #[tokio::test]
    async fn test_malformed_frame_is_skipped() {
        let a = frame("A");
        let b = frame("B");
        let input = [a.as_str(), "data: {\"choices\": [", b.as_str(), "data: [DONE]"];
        let text: String = StreamDecoder::decode(lines(&input))
            .filter_map(|c| async move {
                match c {
                    Ok(StreamChunk::Text(t)) => Some(t),
                    _ => None,
                }
            })
            .collect()
            .await;

        assert_eq!(text, "AB");
    }

    #[tokio::test]
    async fn test_stops_at_sentinel() {
        let after = frame("ignored");
        let input = ["data: [DONE]", after.as_str()];
        let chunks: Vec<_> = StreamDecoder::decode(lines(&input)).collect().await;
        assert_eq!(chunks, vec![Ok(StreamChunk::Done)]);
    }

    #[tokio::test]
    async fn test_transport_error_after_partial_content() {
        let first = frame("partial");
        let source: Vec<Result<String, TransportError>> = vec![
            Ok(first),
            Err(TransportError::Connection("reset by peer".into())),
            Ok(frame("never")),
        ];
        let chunks: Vec<_> = StreamDecoder::decode(stream::iter(source)).collect().await;

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], Ok(StreamChunk::Text("partial".into())));
        assert!(matches!(chunks[1], Err(TransportError::Connection(_))));
    }

    #[test]
    fn test_decode_line_variants() {
        assert_eq!(StreamDecoder::decode_line(""), LineOutcome::Skipped);
        assert_eq!(StreamDecoder::decode_line(": keep-alive"), LineOutcome::Skipped);
        assert_eq!(StreamDecoder::decode_line("event: message"), LineOutcome::Skipped);
        assert_eq!(
            StreamDecoder::decode_line("data:[DONE]"),
            LineOutcome::Chunk(StreamChunk::Done)
        );
        assert_eq!(
            StreamDecoder::decode_line("data: [DONE] \r"),
            LineOutcome::Chunk(StreamChunk::Done)
        );
        assert_eq!(
            StreamDecoder::decode_line("data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}"),
            LineOutcome::NoDelta
        );
        assert_eq!(
            StreamDecoder::decode_line("data: {\"choices\":[{\"delta\":{\"content\":\"\"}}]}"),
            LineOutcome::NoDelta
        );
        assert_eq!(
            StreamDecoder::decode_line("data: not json"),
            LineOutcome::Malformed("not json".into())
        );
    }

    #[test]
    fn test_delta_preserves_whitespace() {
        assert_eq!(
            StreamDecoder::decode_line(&frame("  indented\n")),
            LineOutcome::Chunk(StreamChunk::Text("  indented\n".into()))
        );
    }

    #[tokio::test]
    async fn test_chat_stream_collect() {
        let stream = ChatStream::from_deltas(
            vec!["Hello, ".to_string(), "world!".to_string()],
            RequestVariant::Full,
        );
        assert_eq!(stream.variant(), RequestVariant::Full);
        assert_eq!(stream.collect_content().await.unwrap(), "Hello, world!");
    }

    #[tokio::test]
    async fn test_chat_stream_collect_surfaces_error() {
        let items: Vec<Result<String, ChatError>> = vec![
            Ok("partial".to_string()),
            Err(ChatError::Transport(TransportError::Timeout(std::time::Duration::from_secs(1)))),
        ];
        let stream = ChatStream::new(Box::pin(stream::iter(items)), RequestVariant::Minimal);
        assert!(matches!(
            stream.collect_content().await,
            Err(ChatError::Transport(TransportError::Timeout(_)))
        ));
    }
}
