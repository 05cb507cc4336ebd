use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use eventsource_stream::Event;
use serde::Deserialize;
use serde_json::{json, Value};

use super::adapter::{endpoint, header_refs, send_with, EventDecoder};
use super::http_client::HttpClientTrait;
use crate::domain::llm::{
    AssistantTurn, Citation, ContentPart, Conversation, FileContent, Message, MessageRole,
    RawChunk, RawChunkStream, RawToolCall, RequestPlan, SendContext, ToolArguments,
    ToolCallResult, VendorAdapter, VendorKind, WebSearchSource,
};
use crate::domain::{DomainError, FinishReason, Usage};

const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const PROVIDER: &str = "anthropic";
const DEFAULT_MAX_TOKENS: u32 = 4096;
const MIN_THINKING_BUDGET: u32 = 1024;

/// Anthropic Messages protocol
#[derive(Debug)]
pub struct AnthropicAdapter<C: HttpClientTrait> {
    client: C,
    base_url: String,
    extra_headers: Vec<(String, String)>,
}

impl<C: HttpClientTrait> AnthropicAdapter<C> {
    pub fn new(client: C) -> Self {
        Self::with_base_url(client, DEFAULT_ANTHROPIC_BASE_URL)
    }

    pub fn with_base_url(client: C, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            extra_headers: Vec::new(),
        }
    }

    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.extra_headers = headers;
        self
    }

    fn messages_url(&self) -> String {
        endpoint(&self.base_url, "/v1/messages")
    }

    fn message_item(message: &Message) -> Value {
        let role = match message.role {
            MessageRole::Assistant => "assistant",
            _ => "user",
        };

        if message.role == MessageRole::Assistant {
            return json!({
                "role": role,
                "content": [{ "type": "text", "text": message.content_text() }],
            });
        }

        let blocks: Vec<Value> = message
            .content_parts()
            .iter()
            .filter_map(content_block)
            .collect();
        json!({ "role": role, "content": blocks })
    }
}

fn content_block(part: &ContentPart) -> Option<Value> {
    match part {
        ContentPart::Text { text } => Some(json!({ "type": "text", "text": text })),
        ContentPart::ImageUrl { url } => Some(json!({
            "type": "image",
            "source": { "type": "url", "url": url },
        })),
        ContentPart::ImageBase64 { data, media_type } => Some(json!({
            "type": "image",
            "source": { "type": "base64", "media_type": media_type, "data": data },
        })),
        ContentPart::File {
            name,
            content: FileContent::Text { text },
            ..
        } => Some(json!({
            "type": "text",
            "text": crate::domain::llm::format_file_text(name, text),
        })),
        ContentPart::File {
            media_type,
            content: FileContent::Base64 { data },
            ..
        } if media_type == "application/pdf" => Some(json!({
            "type": "document",
            "source": { "type": "base64", "media_type": media_type, "data": data },
        })),
        ContentPart::File { .. } => None,
    }
}

/// Assistant content of one round, restricted to the tool uses being answered
fn replay_blocks(blocks: &[Value], answered: &HashSet<&str>) -> Vec<Value> {
    blocks
        .iter()
        .filter(|block| match block["type"].as_str() {
            Some("tool_use") => block["id"]
                .as_str()
                .is_some_and(|id| answered.contains(id)),
            _ => true,
        })
        .cloned()
        .collect()
}

#[async_trait]
impl<C: HttpClientTrait + 'static> VendorAdapter for AnthropicAdapter<C> {
    fn vendor(&self) -> VendorKind {
        VendorKind::Anthropic
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    fn build_conversation(&self, system: Option<&str>, messages: &[Message]) -> Conversation {
        Conversation {
            system: system.map(str::to_string),
            items: messages.iter().map(Self::message_item).collect(),
        }
    }

    fn append_messages(&self, conversation: &mut Conversation, messages: &[Message]) {
        conversation
            .items
            .extend(messages.iter().map(Self::message_item));
    }

    fn append_tool_round(
        &self,
        conversation: &mut Conversation,
        turn: &AssistantTurn,
        results: &[ToolCallResult],
    ) {
        let content = match &turn.native_items {
            Some(blocks) => {
                let answered: HashSet<&str> =
                    turn.tool_calls.iter().map(|c| c.id.as_str()).collect();
                replay_blocks(blocks, &answered)
            }
            None => {
                let mut blocks = Vec::new();
                if !turn.text.is_empty() {
                    blocks.push(json!({ "type": "text", "text": turn.text }));
                }
                blocks.extend(turn.tool_calls.iter().map(|call| {
                    json!({
                        "type": "tool_use",
                        "id": call.id,
                        "name": call.name,
                        "input": call.arguments.to_value(),
                    })
                }));
                blocks
            }
        };
        conversation
            .items
            .push(json!({ "role": "assistant", "content": content }));

        let tool_results: Vec<Value> = results
            .iter()
            .map(|result| {
                json!({
                    "type": "tool_result",
                    "tool_use_id": result.id,
                    "content": result.output.to_text(),
                    "is_error": result.is_error(),
                })
            })
            .collect();
        conversation
            .items
            .push(json!({ "role": "user", "content": tool_results }));
    }

    fn build_request(&self, conversation: &Conversation, plan: &RequestPlan) -> Value {
        let max_tokens = plan.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
        let mut body = json!({
            "model": plan.model_id(),
            "messages": conversation.items,
            "max_tokens": max_tokens,
            "stream": plan.stream,
        });

        if let Some(system) = &conversation.system {
            body["system"] = json!(system);
        }

        let thinking = plan
            .reasoning
            .filter(|r| r.is_enabled() && max_tokens > MIN_THINKING_BUDGET)
            .map(|r| {
                r.budget_tokens
                    .unwrap_or(MIN_THINKING_BUDGET)
                    .clamp(MIN_THINKING_BUDGET, max_tokens - 1)
            });

        match thinking {
            Some(budget) => {
                body["thinking"] = json!({ "type": "enabled", "budget_tokens": budget });
            }
            None => {
                // Sampling parameters are rejected while extended thinking is on
                if let Some(temp) = plan.temperature {
                    body["temperature"] = json!(temp);
                }
                if let Some(top_p) = plan.top_p {
                    body["top_p"] = json!(top_p);
                }
            }
        }

        let mut tools: Vec<Value> = plan
            .tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description.clone().unwrap_or_default(),
                    "input_schema": tool.input_schema,
                })
            })
            .collect();
        if plan.web_search {
            tools.push(json!({
                "type": "web_search_20250305",
                "name": "web_search",
                "max_uses": 5,
            }));
        }
        if !tools.is_empty() {
            body["tools"] = json!(tools);
        }

        plan.apply_custom_parameters(&mut body);
        body
    }

    async fn send(&self, body: Value, ctx: &SendContext) -> Result<RawChunkStream, DomainError> {
        let url = self.messages_url();
        let mut headers = vec![
            ("x-api-key", ctx.api_key.as_str()),
            ("anthropic-version", ANTHROPIC_VERSION),
            ("Content-Type", "application/json"),
        ];
        headers.extend(header_refs(&self.extra_headers));

        send_with(
            &self.client,
            &url,
            headers,
            &body,
            ctx,
            AnthropicStreamDecoder::default(),
            decode_message_body,
        )
        .await
    }
}

/// Maps Messages-API stream events onto pre-chunks, rebuilding the final content blocks
#[derive(Debug, Default)]
pub struct AnthropicStreamDecoder {
    blocks: BTreeMap<usize, Value>,
    /// Streamed text per (block index, field), written into the block when it stops
    text: BTreeMap<(usize, &'static str), String>,
    tool_json: BTreeMap<usize, String>,
    calls: Vec<RawToolCall>,
    input_tokens: u32,
    output_tokens: u32,
    stop_reason: Option<String>,
    stopped: bool,
}

/// Block fields that arrive as deltas
const STREAMED_FIELDS: [&str; 3] = ["text", "thinking", "signature"];

impl AnthropicStreamDecoder {
    fn on_block_start(&mut self, index: usize, block: Value, out: &mut Vec<RawChunk>) {
        match block["type"].as_str() {
            Some("text") => {
                if let Some(text) = block["text"].as_str().filter(|t| !t.is_empty()) {
                    out.push(RawChunk::TextDelta(text.to_string()));
                }
            }
            Some("thinking") => {
                if let Some(text) = block["thinking"].as_str().filter(|t| !t.is_empty()) {
                    out.push(RawChunk::ReasoningDelta(text.to_string()));
                }
            }
            Some("tool_use") => {
                self.tool_json.insert(index, String::new());
            }
            Some("web_search_tool_result") => {
                let results = search_results(&block);
                if !results.is_empty() {
                    out.push(RawChunk::WebSearch {
                        results,
                        source: WebSearchSource::Anthropic,
                    });
                }
            }
            _ => {}
        }
        self.blocks.insert(index, block);
    }

    fn buffer(&mut self, index: usize, field: &'static str) -> &mut String {
        self.text.entry((index, field)).or_default()
    }

    fn on_block_delta(&mut self, index: usize, delta: &Value, out: &mut Vec<RawChunk>) {
        if !self.blocks.contains_key(&index) {
            return;
        }

        match delta["type"].as_str() {
            Some("text_delta") => {
                let text = delta["text"].as_str().unwrap_or_default();
                self.buffer(index, "text").push_str(text);
                if !text.is_empty() {
                    out.push(RawChunk::TextDelta(text.to_string()));
                }
            }
            Some("thinking_delta") => {
                let text = delta["thinking"].as_str().unwrap_or_default();
                self.buffer(index, "thinking").push_str(text);
                if !text.is_empty() {
                    out.push(RawChunk::ReasoningDelta(text.to_string()));
                }
            }
            Some("signature_delta") => {
                let signature = delta["signature"].as_str().unwrap_or_default();
                self.buffer(index, "signature").push_str(signature);
            }
            Some("input_json_delta") => {
                if let Some(buffer) = self.tool_json.get_mut(&index) {
                    buffer.push_str(delta["partial_json"].as_str().unwrap_or_default());
                }
            }
            _ => {}
        }
    }

    fn flush_text(&mut self, index: usize) {
        let Some(block) = self.blocks.get_mut(&index) else {
            return;
        };
        for field in STREAMED_FIELDS {
            if let Some(streamed) = self.text.remove(&(index, field)) {
                let mut value = block[field].as_str().unwrap_or_default().to_string();
                value.push_str(&streamed);
                block[field] = Value::String(value);
            }
        }
    }

    fn on_block_stop(&mut self, index: usize) {
        self.flush_text(index);
        let Some(raw) = self.tool_json.remove(&index) else {
            return;
        };
        let Some(block) = self.blocks.get_mut(&index) else {
            return;
        };

        let arguments = ToolArguments::parse(&raw);
        block["input"] = arguments.to_value();
        self.calls.push(RawToolCall {
            id: block["id"].as_str().unwrap_or_default().to_string(),
            name: block["name"].as_str().unwrap_or_default().to_string(),
            arguments,
        });
    }

    fn on_message_stop(&mut self) -> Vec<RawChunk> {
        self.stopped = true;
        let open: Vec<usize> = self.text.keys().map(|(index, _)| *index).collect();
        for index in open {
            self.flush_text(index);
        }

        let mut out = Vec::new();
        let has_calls = !self.calls.is_empty();
        if has_calls {
            out.push(RawChunk::ToolCalls(std::mem::take(&mut self.calls)));
        }

        let blocks: Vec<Value> = std::mem::take(&mut self.blocks).into_values().collect();
        if !blocks.is_empty() {
            out.push(RawChunk::NativeItems(blocks));
        }

        out.push(RawChunk::Usage(Usage::new(self.input_tokens, self.output_tokens)));
        let reason = match self.stop_reason.as_deref() {
            _ if has_calls => FinishReason::ToolCalls,
            Some(reason) => FinishReason::parse(reason),
            None => FinishReason::Stop,
        };
        out.push(RawChunk::Finish(reason));
        out
    }
}

impl EventDecoder for AnthropicStreamDecoder {
    fn decode(&mut self, event: &Event) -> Result<Vec<RawChunk>, DomainError> {
        let data: StreamEvent = serde_json::from_str(&event.data).map_err(|e| {
            DomainError::provider(PROVIDER, format!("Failed to parse stream event: {}", e))
        })?;

        let mut out = Vec::new();
        match data.kind.as_str() {
            "message_start" => {
                if let Some(usage) = data.message.as_ref().and_then(|m| m.usage.as_ref()) {
                    self.input_tokens = usage.input_tokens.unwrap_or(0);
                    self.output_tokens = usage.output_tokens.unwrap_or(0);
                }
                out.push(RawChunk::Created);
            }
            "content_block_start" => {
                if let Some(block) = data.content_block {
                    self.on_block_start(data.index.unwrap_or(0), block, &mut out);
                }
            }
            "content_block_delta" => {
                if let Some(delta) = &data.delta {
                    self.on_block_delta(data.index.unwrap_or(0), delta, &mut out);
                }
            }
            "content_block_stop" => self.on_block_stop(data.index.unwrap_or(0)),
            "message_delta" => {
                if let Some(reason) = data.delta.as_ref().and_then(|d| d["stop_reason"].as_str()) {
                    self.stop_reason = Some(reason.to_string());
                }
                if let Some(usage) = &data.usage {
                    if let Some(tokens) = usage.output_tokens {
                        self.output_tokens = tokens;
                    }
                    if let Some(tokens) = usage.input_tokens {
                        self.input_tokens = tokens;
                    }
                }
            }
            "message_stop" => out.extend(self.on_message_stop()),
            "error" => {
                let message = data
                    .error
                    .map(|e| e.message)
                    .unwrap_or_else(|| "Unknown error".to_string());
                return Err(DomainError::provider(PROVIDER, message));
            }
            _ => {}
        }

        Ok(out)
    }

    fn finish(&mut self) -> Result<Vec<RawChunk>, DomainError> {
        if self.stopped {
            Ok(Vec::new())
        } else {
            Err(DomainError::provider(PROVIDER, "Stream ended before message_stop"))
        }
    }
}

fn search_results(block: &Value) -> Vec<Citation> {
    block["content"]
        .as_array()
        .into_iter()
        .flatten()
        .filter(|r| r["type"].as_str() == Some("web_search_result"))
        .filter_map(|r| {
            let url = r["url"].as_str()?;
            Some(Citation::new(url).with_title(r["title"].as_str().map(str::to_string)))
        })
        .collect()
}

/// Decode a complete `stream: false` message
pub fn decode_message_body(json: Value) -> Result<Vec<RawChunk>, DomainError> {
    if json["type"].as_str() == Some("error") {
        let message = json["error"]["message"].as_str().unwrap_or("Unknown error");
        return Err(DomainError::provider(PROVIDER, message));
    }

    let content = json["content"]
        .as_array()
        .ok_or_else(|| DomainError::provider(PROVIDER, "No content in response"))?;

    let mut decoder = AnthropicStreamDecoder::default();
    let mut out = vec![RawChunk::Created];
    for (index, block) in content.iter().enumerate() {
        if block["type"].as_str() == Some("tool_use") {
            let input = block["input"].clone();
            decoder.blocks.insert(index, block.clone());
            decoder.tool_json.insert(index, input.to_string());
            decoder.on_block_stop(index);
        } else {
            decoder.on_block_start(index, block.clone(), &mut out);
        }
    }

    decoder.input_tokens = json["usage"]["input_tokens"].as_u64().unwrap_or(0) as u32;
    decoder.output_tokens = json["usage"]["output_tokens"].as_u64().unwrap_or(0) as u32;
    decoder.stop_reason = json["stop_reason"].as_str().map(str::to_string);
    out.extend(decoder.on_message_stop());
    Ok(out)
}

// Anthropic API types

#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(rename = "type")]
    kind: String,
    index: Option<usize>,
    message: Option<StreamMessage>,
    content_block: Option<Value>,
    delta: Option<Value>,
    usage: Option<StreamUsage>,
    error: Option<StreamError>,
}

#[derive(Debug, Deserialize)]
struct StreamMessage {
    usage: Option<StreamUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamUsage {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    message: String,
}
