//! One request/response round: raw vendor chunks in, canonical chunks out

use std::time::Instant;

use futures::StreamExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::metrics::CallTimer;
use super::reasoning::{TagExtractor, TagSegment};
use super::sink::ChunkSink;
use crate::domain::llm::{
    AssistantTurn, Chunk, FinishReason, Metrics, RawChunk, RawChunkStream, RawToolCall, Usage,
};
use crate::domain::DomainError;

/// Delivers chunks for a whole call, stamping timing and enforcing ordering
pub struct Emitter<'a> {
    sink: &'a mut dyn ChunkSink,
    cancel: CancellationToken,
    timer: CallTimer,
    created: bool,
    thinking_closed: bool,
}

impl<'a> Emitter<'a> {
    pub fn new(sink: &'a mut dyn ChunkSink, cancel: CancellationToken, timer: CallTimer) -> Self {
        Self {
            sink,
            cancel,
            timer,
            created: false,
            thinking_closed: false,
        }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn check_cancelled(&self) -> Result<(), DomainError> {
        if self.cancel.is_cancelled() {
            return Err(DomainError::aborted("Request aborted"));
        }
        Ok(())
    }

    /// `RESPONSE_CREATED`, once per call
    pub async fn ensure_created(&mut self) -> Result<(), DomainError> {
        if !self.created {
            self.check_cancelled()?;
            self.created = true;
            self.sink.send(Chunk::ResponseCreated).await?;
        }
        Ok(())
    }

    /// Emit a non-terminal chunk
    pub async fn emit(&mut self, chunk: Chunk) -> Result<(), DomainError> {
        self.check_cancelled()?;
        self.ensure_created().await?;

        let now = Instant::now();
        self.timer.mark_first_event_at(now);
        match &chunk {
            Chunk::ThinkingComplete { .. } => self.thinking_closed = true,
            Chunk::ThinkingDelta { .. } => {}
            _ => self.mark_after_thinking(now),
        }

        self.sink.send(chunk).await
    }

    /// Emit the terminal chunk; never refused by cancellation
    pub async fn emit_terminal(&mut self, chunk: Chunk) -> Result<(), DomainError> {
        let now = Instant::now();
        self.mark_after_thinking(now);
        self.timer.finish_at(now);
        self.sink.send(chunk).await
    }

    fn mark_after_thinking(&mut self, at: Instant) {
        if self.thinking_closed {
            self.timer.mark_after_thinking_at(at);
            self.thinking_closed = false;
        }
    }

    pub fn metrics(&self, usage: &Usage) -> Metrics {
        self.timer.metrics(usage)
    }
}

/// What one round produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoundOutcome {
    /// Visible answer text
    pub text: String,
    /// Answer text including prompt-mode tool markup
    pub answer_raw: String,
    pub reasoning: String,
    pub tool_calls: Vec<RawToolCall>,
    pub native_items: Option<Vec<Value>>,
    pub usage: Option<Usage>,
    pub finish: Option<FinishReason>,
}

impl RoundOutcome {
    /// Assistant side of a tool round, restricted to the calls that will be answered
    pub fn assistant_turn(&self, calls: Vec<RawToolCall>) -> AssistantTurn {
        AssistantTurn {
            text: self.answer_raw.clone(),
            reasoning: self.reasoning.clone(),
            tool_calls: calls,
            native_items: self.native_items.clone(),
        }
    }
}

struct ThinkingSpan {
    started: Instant,
    text: String,
}

/// Turns one round's raw stream into canonical chunks
pub struct RoundProcessor {
    reasoning: Option<TagExtractor>,
    tool_markup: Option<TagExtractor>,
    span: Option<ThinkingSpan>,
    outcome: RoundOutcome,
}

impl RoundProcessor {
    /// `reasoning` splits inline thinking tags, `tool_markup` hides prompt-mode tool blocks
    pub fn new(reasoning: Option<TagExtractor>, tool_markup: Option<TagExtractor>) -> Self {
        Self {
            reasoning,
            tool_markup,
            span: None,
            outcome: RoundOutcome::default(),
        }
    }

    pub async fn run(
        mut self,
        mut stream: RawChunkStream,
        emitter: &mut Emitter<'_>,
    ) -> Result<RoundOutcome, DomainError> {
        let cancel = emitter.cancel_token().clone();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(DomainError::aborted("Request aborted"));
                }
                item = stream.next() => item,
            };

            match next {
                Some(Ok(chunk)) => self.handle(chunk, emitter).await?,
                Some(Err(e)) => return Err(e),
                None => break,
            }
        }

        self.finish(emitter).await
    }

    async fn handle(&mut self, chunk: RawChunk, emitter: &mut Emitter<'_>) -> Result<(), DomainError> {
        match chunk {
            RawChunk::Created => emitter.ensure_created().await?,
            RawChunk::TextDelta(text) => {
                let segments = match self.reasoning.as_mut() {
                    Some(extractor) => extractor.push(&text),
                    None => vec![TagSegment::Plain(text)],
                };
                self.apply(segments, emitter).await?;
            }
            RawChunk::ReasoningDelta(text) => self.on_thinking(text, emitter).await?,
            RawChunk::ToolCalls(calls) => self.outcome.tool_calls.extend(calls),
            RawChunk::WebSearch { results, source } => {
                self.close_span(emitter).await?;
                emitter
                    .emit(Chunk::WebSearchComplete { results, source })
                    .await?;
            }
            RawChunk::ImageCreated => {
                self.close_span(emitter).await?;
                emitter.emit(Chunk::ImageCreated).await?;
            }
            RawChunk::ImageComplete(images) => {
                self.close_span(emitter).await?;
                emitter.emit(Chunk::ImageComplete { images }).await?;
            }
            RawChunk::Usage(usage) => self.outcome.usage = Some(usage),
            RawChunk::Finish(reason) => self.outcome.finish = Some(reason),
            RawChunk::NativeItems(items) => self.outcome.native_items = Some(items),
        }
        Ok(())
    }

    async fn apply(
        &mut self,
        segments: Vec<TagSegment>,
        emitter: &mut Emitter<'_>,
    ) -> Result<(), DomainError> {
        for segment in segments {
            match segment {
                TagSegment::Tagged(text) => self.on_thinking(text, emitter).await?,
                TagSegment::Closed => self.close_span(emitter).await?,
                TagSegment::Plain(text) => self.on_answer(text, emitter).await?,
            }
        }
        Ok(())
    }

    async fn on_thinking(&mut self, text: String, emitter: &mut Emitter<'_>) -> Result<(), DomainError> {
        if text.is_empty() {
            return Ok(());
        }

        let span = self.span.get_or_insert_with(|| ThinkingSpan {
            started: Instant::now(),
            text: String::new(),
        });
        span.text.push_str(&text);
        let elapsed_ms = span.started.elapsed().as_millis() as u64;

        emitter.emit(Chunk::ThinkingDelta { text, elapsed_ms }).await
    }

    async fn close_span(&mut self, emitter: &mut Emitter<'_>) -> Result<(), DomainError> {
        if let Some(span) = self.span.take() {
            let elapsed_ms = span.started.elapsed().as_millis() as u64;
            self.outcome.reasoning.push_str(&span.text);
            emitter
                .emit(Chunk::ThinkingComplete {
                    text: span.text,
                    elapsed_ms,
                })
                .await?;
        }
        Ok(())
    }

    async fn on_answer(&mut self, text: String, emitter: &mut Emitter<'_>) -> Result<(), DomainError> {
        self.outcome.answer_raw.push_str(&text);

        let visible = match self.tool_markup.as_mut() {
            Some(extractor) => plain_text(extractor.push(&text)),
            None => text,
        };
        self.emit_text(visible, emitter).await
    }

    async fn emit_text(&mut self, text: String, emitter: &mut Emitter<'_>) -> Result<(), DomainError> {
        if text.is_empty() {
            return Ok(());
        }
        self.close_span(emitter).await?;
        self.outcome.text.push_str(&text);
        emitter.emit(Chunk::TextDelta { text }).await
    }

    async fn finish(mut self, emitter: &mut Emitter<'_>) -> Result<RoundOutcome, DomainError> {
        if let Some(mut extractor) = self.reasoning.take() {
            let segments = extractor.flush();
            self.apply(segments, emitter).await?;
        }
        if let Some(mut extractor) = self.tool_markup.take() {
            let visible = plain_text(extractor.flush());
            self.emit_text(visible, emitter).await?;
        }
        self.close_span(emitter).await?;

        if !self.outcome.text.is_empty() {
            emitter
                .emit(Chunk::TextComplete {
                    text: self.outcome.text.clone(),
                })
                .await?;
        }

        Ok(self.outcome)
    }
}

fn plain_text(segments: Vec<TagSegment>) -> String {
    segments
        .into_iter()
        .filter_map(|segment| match segment {
            TagSegment::Plain(text) => Some(text),
            _ => None,
        })
        .collect()
}
