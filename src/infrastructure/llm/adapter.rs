//! Pieces shared by the vendor adapters: the SSE driver, tool-call buffering and
//! request plumbing

use std::collections::{BTreeMap, VecDeque};

use eventsource_stream::{Event, EventStream, EventStreamError, Eventsource};
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use super::http_client::{ByteStream, HttpClientTrait};
use crate::domain::llm::{RawChunk, RawChunkStream, RawToolCall, SendContext, ToolArguments};
use crate::domain::DomainError;

/// Vendor-specific mapping from SSE events to pre-chunks
pub trait EventDecoder: Send + 'static {
    fn decode(&mut self, event: &Event) -> Result<Vec<RawChunk>, DomainError>;

    /// Called once when the byte stream ends
    fn finish(&mut self) -> Result<Vec<RawChunk>, DomainError> {
        Ok(Vec::new())
    }
}

/// Named event type, `None` for the SSE default
pub fn event_name(event: &Event) -> Option<&str> {
    Some(event.event.as_str()).filter(|name| !name.is_empty() && *name != "message")
}

fn stream_error(error: EventStreamError<DomainError>) -> DomainError {
    match error {
        EventStreamError::Transport(e) => e,
        other => DomainError::transport("sse", format!("Malformed event stream: {}", other)),
    }
}

struct SseState<D> {
    events: EventStream<ByteStream>,
    decoder: D,
    pending: VecDeque<Result<RawChunk, DomainError>>,
    cancel: CancellationToken,
    done: bool,
}

impl<D: EventDecoder> SseState<D> {
    fn decode(&mut self, event: &Event) {
        match self.decoder.decode(event) {
            Ok(chunks) => self.pending.extend(chunks.into_iter().map(Ok)),
            Err(e) => {
                self.pending.push_back(Err(e));
                self.done = true;
            }
        }
    }

    fn finish(&mut self) {
        self.done = true;
        match self.decoder.finish() {
            Ok(chunks) => self.pending.extend(chunks.into_iter().map(Ok)),
            Err(e) => self.pending.push_back(Err(e)),
        }
    }
}

/// Drive a vendor byte stream through `eventsource` framing and `decoder`.
///
/// The byte stream (and with it the connection) is dropped as soon as `cancel` fires or an
/// error is produced.
pub fn adapt_sse<D: EventDecoder>(
    bytes: ByteStream,
    decoder: D,
    cancel: CancellationToken,
) -> RawChunkStream {
    let state = SseState {
        events: bytes.eventsource(),
        decoder,
        pending: VecDeque::new(),
        cancel,
        done: false,
    };

    let stream = stream::unfold(Some(state), |state| async move {
        let mut state = state?;
        loop {
            if let Some(item) = state.pending.pop_front() {
                let next = if item.is_err() { None } else { Some(state) };
                return Some((item, next));
            }
            if state.done {
                return None;
            }

            let next = tokio::select! {
                biased;
                _ = state.cancel.cancelled() => {
                    return Some((Err(DomainError::aborted("Request aborted")), None));
                }
                next = state.events.next() => next,
            };

            match next {
                Some(Ok(event)) => state.decode(&event),
                Some(Err(e)) => return Some((Err(stream_error(e)), None)),
                None => state.finish(),
            }
        }
    });

    Box::pin(stream)
}

/// Stream over chunks decoded from a complete (non-streamed) body
pub fn once(chunks: Vec<RawChunk>) -> RawChunkStream {
    Box::pin(stream::iter(chunks.into_iter().map(Ok)))
}

/// Issue the request in the mode `ctx` asks for and adapt the response
pub async fn send_with<C, D, F>(
    client: &C,
    url: &str,
    headers: Vec<(&str, &str)>,
    body: &serde_json::Value,
    ctx: &SendContext,
    decoder: D,
    decode_body: F,
) -> Result<RawChunkStream, DomainError>
where
    C: HttpClientTrait,
    D: EventDecoder,
    F: FnOnce(serde_json::Value) -> Result<Vec<RawChunk>, DomainError>,
{
    if ctx.stream {
        let bytes = client.post_json_stream(url, headers, body).await?;
        Ok(adapt_sse(bytes, decoder, ctx.cancel.clone()))
    } else {
        let json = client.post_json(url, headers, body).await?;
        Ok(once(decode_body(json)?))
    }
}

/// Join a configured host and an API path, tolerating hosts given with or without `/v1`
pub fn endpoint(host: &str, path: &str) -> String {
    let host = host.trim_end_matches('/');
    match (host.strip_suffix("/v1"), path.strip_prefix("/v1")) {
        (Some(_), Some(rest)) => format!("{}{}", host, rest),
        _ => format!("{}{}", host, path),
    }
}

/// Extra headers configured on the provider, borrowed in the shape the client takes
pub fn header_refs(extra: &[(String, String)]) -> impl Iterator<Item = (&str, &str)> {
    extra.iter().map(|(k, v)| (k.as_str(), v.as_str()))
}

#[derive(Debug, Default)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
}

/// Buffers streamed tool-call fragments by index until the vendor marks them complete
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    calls: BTreeMap<usize, PartialCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        index: usize,
        id: Option<&str>,
        name: Option<&str>,
        arguments: Option<&str>,
    ) {
        let call = self.calls.entry(index).or_default();
        if let Some(id) = id.filter(|id| !id.is_empty()) {
            call.id = id.to_string();
        }
        if let Some(name) = name.filter(|name| !name.is_empty()) {
            call.name.push_str(name);
        }
        if let Some(arguments) = arguments {
            call.arguments.push_str(arguments);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Completed calls in index order; arguments that are not JSON are kept raw
    pub fn drain(&mut self) -> Vec<RawToolCall> {
        std::mem::take(&mut self.calls)
            .into_iter()
            .filter(|(_, call)| !call.name.is_empty())
            .map(|(index, call)| RawToolCall {
                id: if call.id.is_empty() {
                    format!("call_{}", index)
                } else {
                    call.id
                },
                name: call.name,
                arguments: ToolArguments::parse(&call.arguments),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use serde_json::json;

    struct EchoDecoder;

    impl EventDecoder for EchoDecoder {
        fn decode(&mut self, event: &Event) -> Result<Vec<RawChunk>, DomainError> {
            if event.data == "boom" {
                return Err(DomainError::provider("test", "boom"));
            }
            Ok(vec![RawChunk::TextDelta(event.data.clone())])
        }

        fn finish(&mut self) -> Result<Vec<RawChunk>, DomainError> {
            Ok(vec![RawChunk::Finish(crate::domain::FinishReason::Stop)])
        }
    }

    fn bytes(pieces: &[&'static str]) -> ByteStream {
        Box::pin(stream::iter(
            pieces
                .iter()
                .copied()
                .map(|p| Ok(Bytes::from_static(p.as_bytes())))
                .collect::<Vec<_>>(),
        ))
    }

    #[tokio::test]
    async fn test_adapt_sse_reassembles_events() {
        let stream = adapt_sse(
            bytes(&["data: he", "llo\n\nda", "ta: world\n\n"]),
            EchoDecoder,
            CancellationToken::new(),
        );
        let chunks: Vec<_> = stream.map(|c| c.unwrap()).collect().await;

        assert_eq!(
            chunks,
            vec![
                RawChunk::TextDelta("hello".to_string()),
                RawChunk::TextDelta("world".to_string()),
                RawChunk::Finish(crate::domain::FinishReason::Stop),
            ]
        );
    }

    struct NamedDecoder;

    impl EventDecoder for NamedDecoder {
        fn decode(&mut self, event: &Event) -> Result<Vec<RawChunk>, DomainError> {
            let name = event_name(event).unwrap_or("-");
            Ok(vec![RawChunk::TextDelta(format!("{}:{}", name, event.data))])
        }
    }

    #[tokio::test]
    async fn test_adapt_sse_event_names_and_comments() {
        let stream = adapt_sse(
            bytes(&[
                ": keep-alive\r\n",
                "event: message_start\r\ndata: {\"a\":1}\r\n\r\n",
                "data: a\ndata: b\n\n",
            ]),
            NamedDecoder,
            CancellationToken::new(),
        );
        let chunks: Vec<_> = stream.map(|c| c.unwrap()).collect().await;

        assert_eq!(
            chunks,
            vec![
                RawChunk::TextDelta("message_start:{\"a\":1}".to_string()),
                RawChunk::TextDelta("-:a\nb".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_adapt_sse_split_multibyte_character() {
        let payload = "data: héllo\n\n".as_bytes();
        let split = payload.iter().position(|b| *b == 0xC3).unwrap() + 1;
        let pieces: ByteStream = Box::pin(stream::iter(vec![
            Ok(Bytes::copy_from_slice(&payload[..split])),
            Ok(Bytes::copy_from_slice(&payload[split..])),
        ]));

        let chunks: Vec<_> = adapt_sse(pieces, NamedDecoder, CancellationToken::new())
            .map(|c| c.unwrap())
            .collect()
            .await;

        assert_eq!(chunks, vec![RawChunk::TextDelta("-:héllo".to_string())]);
    }

    #[tokio::test]
    async fn test_adapt_sse_transport_error_passes_through() {
        let failing: ByteStream = Box::pin(stream::iter(vec![
            Ok(Bytes::from_static(b"data: one\n\n")),
            Err(DomainError::transport("test", "connection reset")),
        ]));

        let items: Vec<_> = adapt_sse(failing, EchoDecoder, CancellationToken::new())
            .collect()
            .await;

        assert_eq!(items.len(), 2);
        assert!(matches!(items[1], Err(DomainError::Transport { .. })));
    }

    #[tokio::test]
    async fn test_adapt_sse_stops_after_error() {
        let stream = adapt_sse(
            bytes(&["data: boom\n\ndata: after\n\n"]),
            EchoDecoder,
            CancellationToken::new(),
        );
        let items: Vec<_> = stream.collect().await;

        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(DomainError::Provider { .. })));
    }

    #[tokio::test]
    async fn test_adapt_sse_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let pending: ByteStream = Box::pin(stream::pending());
        let items: Vec<_> = adapt_sse(pending, EchoDecoder, token).collect().await;

        assert_eq!(items.len(), 1);
        assert!(items[0].as_ref().unwrap_err().is_abort());
    }

    #[test]
    fn test_tool_call_fragments() {
        let mut acc = ToolCallAccumulator::new();
        acc.push(0, Some("call_a"), Some("weather"), Some("{\"ci"));
        acc.push(1, Some("call_b"), Some("clock"), None);
        acc.push(0, None, None, Some("ty\": \"Oslo\"}"));

        let calls = acc.drain();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "weather");
        assert_eq!(calls[0].arguments, ToolArguments::Parsed(json!({"city": "Oslo"})));
        assert_eq!(calls[1].arguments, ToolArguments::Parsed(json!({})));
        assert!(acc.is_empty());
    }

    #[test]
    fn test_malformed_arguments_kept_raw() {
        let mut acc = ToolCallAccumulator::new();
        acc.push(0, None, Some("search"), Some("{not json"));

        let calls = acc.drain();
        assert_eq!(calls[0].id, "call_0");
        assert_eq!(calls[0].arguments, ToolArguments::Raw("{not json".to_string()));
    }

    #[test]
    fn test_endpoint_joins_hosts() {
        assert_eq!(
            endpoint("https://api.openai.com", "/v1/chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            endpoint("https://openrouter.ai/api/v1/", "/v1/chat/completions"),
            "https://openrouter.ai/api/v1/chat/completions"
        );
    }
}
