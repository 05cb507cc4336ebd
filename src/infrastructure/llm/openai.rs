use async_trait::async_trait;
use eventsource_stream::Event;
use serde::Deserialize;
use serde_json::{json, Value};

use super::adapter::{endpoint, header_refs, send_with, EventDecoder, ToolCallAccumulator};
use super::http_client::HttpClientTrait;
use crate::domain::capability::{base_model_id, is_openai_reasoning_model, supports_temperature_and_top_p};
use crate::domain::llm::{
    AssistantTurn, Citation, ContentPart, Conversation, FileContent, GeneratedImage, Message,
    MessageRole, RawChunk, RawChunkStream, RequestPlan, SendContext, ToolCallResult,
    VendorAdapter, VendorKind, WebSearchSource,
};
use crate::domain::{DomainError, FinishReason, Usage};

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
const PROVIDER: &str = "openai";

/// OpenAI chat completions protocol, also spoken by most compatible vendors
#[derive(Debug)]
pub struct OpenAiChatAdapter<C: HttpClientTrait> {
    client: C,
    base_url: String,
    extra_headers: Vec<(String, String)>,
}

impl<C: HttpClientTrait> OpenAiChatAdapter<C> {
    pub fn new(client: C) -> Self {
        Self::with_base_url(client, DEFAULT_OPENAI_BASE_URL)
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

    fn chat_completions_url(&self) -> String {
        endpoint(&self.base_url, "/v1/chat/completions")
    }

    fn message_item(message: &Message) -> Value {
        let role = match message.role {
            MessageRole::System => "system",
            MessageRole::Assistant => "assistant",
            // Tool output outside a tool round is replayed as plain user text
            MessageRole::User | MessageRole::Tool => "user",
        };

        if message.role != MessageRole::User || !message.has_images() {
            return json!({ "role": role, "content": message.content_text() });
        }

        let parts: Vec<Value> = message
            .content_parts()
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(json!({ "type": "text", "text": text })),
                ContentPart::ImageUrl { .. } | ContentPart::ImageBase64 { .. } => part
                    .image_url()
                    .map(|url| json!({ "type": "image_url", "image_url": { "url": url } })),
                ContentPart::File {
                    name,
                    content: FileContent::Text { text },
                    ..
                } => Some(json!({
                    "type": "text",
                    "text": crate::domain::llm::format_file_text(name, text),
                })),
                ContentPart::File { .. } => None,
            })
            .collect();

        json!({ "role": role, "content": parts })
    }
}

#[async_trait]
impl<C: HttpClientTrait + 'static> VendorAdapter for OpenAiChatAdapter<C> {
    fn vendor(&self) -> VendorKind {
        VendorKind::OpenAiChat
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    fn supports_tag_reasoning(&self) -> bool {
        true
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
        let tool_calls: Vec<Value> = turn
            .tool_calls
            .iter()
            .map(|call| {
                json!({
                    "id": call.id,
                    "type": "function",
                    "function": {
                        "name": call.name,
                        "arguments": call.arguments.to_json_string(),
                    }
                })
            })
            .collect();

        let content = if turn.text.is_empty() {
            Value::Null
        } else {
            Value::String(turn.text.clone())
        };
        conversation.items.push(json!({
            "role": "assistant",
            "content": content,
            "tool_calls": tool_calls,
        }));

        for result in results {
            conversation.items.push(json!({
                "role": "tool",
                "tool_call_id": result.id,
                "content": result.output.to_text(),
            }));
        }
    }

    fn build_request(&self, conversation: &Conversation, plan: &RequestPlan) -> Value {
        let mut messages = Vec::with_capacity(conversation.items.len() + 1);
        if let Some(system) = &conversation.system {
            let role = if is_openai_reasoning_model(&plan.model) {
                "developer"
            } else {
                "system"
            };
            messages.push(json!({ "role": role, "content": system }));
        }
        messages.extend(conversation.items.iter().cloned());

        let mut body = json!({
            "model": plan.model_id(),
            "messages": messages,
            "stream": plan.stream,
        });

        if plan.stream {
            body["stream_options"] = json!({ "include_usage": true });
        }

        if supports_temperature_and_top_p(&plan.model) {
            if let Some(temp) = plan.temperature {
                body["temperature"] = json!(temp);
            }
            if let Some(top_p) = plan.top_p {
                body["top_p"] = json!(top_p);
            }
        }

        if let Some(max_tokens) = plan.max_tokens {
            if is_openai_reasoning_model(&plan.model) {
                body["max_completion_tokens"] = json!(max_tokens);
            } else {
                body["max_tokens"] = json!(max_tokens);
            }
        }

        if let Some(reasoning) = &plan.reasoning {
            if reasoning.effort_param {
                body["reasoning_effort"] = json!(reasoning.effort.as_str());
            } else if let Some(budget) = reasoning.budget_tokens {
                body["enable_thinking"] = json!(reasoning.is_enabled());
                if reasoning.is_enabled() {
                    body["thinking_budget"] = json!(budget);
                }
            }
        }

        if !plan.tools.is_empty() {
            let tools: Vec<Value> = plan
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description.clone().unwrap_or_default(),
                            "parameters": tool.input_schema,
                        }
                    })
                })
                .collect();
            body["tools"] = json!(tools);
        }

        if plan.web_search {
            if base_model_id(plan.model_id()).starts_with("qwen") {
                body["enable_search"] = json!(true);
            } else {
                body["web_search_options"] = json!({});
            }
        }

        if plan.generate_image {
            body["modalities"] = json!(["image", "text"]);
        }

        plan.apply_custom_parameters(&mut body);
        body
    }

    async fn send(&self, body: Value, ctx: &SendContext) -> Result<RawChunkStream, DomainError> {
        let url = self.chat_completions_url();
        let auth = format!("Bearer {}", ctx.api_key);
        let mut headers = vec![
            ("Authorization", auth.as_str()),
            ("Content-Type", "application/json"),
        ];
        headers.extend(header_refs(&self.extra_headers));

        send_with(
            &self.client,
            &url,
            headers,
            &body,
            ctx,
            ChatStreamDecoder::default(),
            decode_chat_body,
        )
        .await
    }
}

/// Maps chat-completion deltas onto pre-chunks
#[derive(Debug, Default)]
pub struct ChatStreamDecoder {
    created: bool,
    tools: ToolCallAccumulator,
    citations: Vec<Citation>,
    search_source: Option<WebSearchSource>,
    images_started: bool,
    finish: Option<FinishReason>,
    finished: bool,
}

impl ChatStreamDecoder {
    fn close(&mut self) -> Vec<RawChunk> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;

        let mut out = Vec::new();
        if !self.citations.is_empty() {
            out.push(RawChunk::WebSearch {
                results: std::mem::take(&mut self.citations),
                source: self.search_source.unwrap_or(WebSearchSource::OpenAi),
            });
        }
        let calls = self.tools.drain();
        if !calls.is_empty() {
            out.push(RawChunk::ToolCalls(calls));
        }
        if let Some(reason) = self.finish {
            out.push(RawChunk::Finish(reason));
        }
        out
    }
}

impl EventDecoder for ChatStreamDecoder {
    fn decode(&mut self, event: &Event) -> Result<Vec<RawChunk>, DomainError> {
        let data = event.data.trim();
        if data == "[DONE]" {
            return Ok(self.close());
        }

        let chunk: ChatStreamChunk = serde_json::from_str(data).map_err(|e| {
            DomainError::provider(PROVIDER, format!("Failed to parse stream chunk: {}", e))
        })?;

        if let Some(error) = chunk.error {
            return Err(DomainError::provider(PROVIDER, error.message));
        }

        let mut out = Vec::new();
        if !self.created {
            self.created = true;
            out.push(RawChunk::Created);
        }

        if let Some(urls) = chunk.citations {
            if self.citations.is_empty() {
                self.search_source = Some(WebSearchSource::Perplexity);
                self.citations = urls.into_iter().map(Citation::new).collect();
            }
        }

        for choice in chunk.choices {
            let delta = choice.delta;

            if let Some(reasoning) = delta.reasoning_content.or(delta.reasoning) {
                if !reasoning.is_empty() {
                    out.push(RawChunk::ReasoningDelta(reasoning));
                }
            }

            if let Some(content) = delta.content {
                if !content.is_empty() {
                    out.push(RawChunk::TextDelta(content));
                }
            }

            for call in delta.tool_calls.unwrap_or_default() {
                let function = call.function.unwrap_or_default();
                self.tools.push(
                    call.index.unwrap_or(0),
                    call.id.as_deref(),
                    function.name.as_deref(),
                    function.arguments.as_deref(),
                );
            }

            for annotation in delta.annotations.unwrap_or_default() {
                if let Some(citation) = annotation.into_citation() {
                    self.citations.push(citation);
                }
            }

            let images = delta.images.unwrap_or_default();
            if !images.is_empty() {
                if !self.images_started {
                    self.images_started = true;
                    out.push(RawChunk::ImageCreated);
                }
                out.push(RawChunk::ImageComplete(
                    images.into_iter().map(ChatImage::into_generated).collect(),
                ));
            }

            if let Some(reason) = choice.finish_reason {
                self.finish = Some(FinishReason::parse(&reason));
            }
        }

        // Usage arrives in a trailing chunk with no choices
        if let Some(usage) = chunk.usage {
            out.push(RawChunk::Usage(usage.into_usage()));
        }

        Ok(out)
    }

    fn finish(&mut self) -> Result<Vec<RawChunk>, DomainError> {
        Ok(self.close())
    }
}

/// Decode a complete `stream: false` body
pub fn decode_chat_body(json: Value) -> Result<Vec<RawChunk>, DomainError> {
    let response: ChatResponse = serde_json::from_value(json).map_err(|e| {
        DomainError::provider(PROVIDER, format!("Failed to parse response: {}", e))
    })?;

    if let Some(error) = response.error {
        return Err(DomainError::provider(PROVIDER, error.message));
    }

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| DomainError::provider(PROVIDER, "No choices in response"))?;

    let mut out = vec![RawChunk::Created];
    let message = choice.message;

    if let Some(reasoning) = message.reasoning_content.or(message.reasoning) {
        if !reasoning.is_empty() {
            out.push(RawChunk::ReasoningDelta(reasoning));
        }
    }
    if let Some(content) = message.content {
        if !content.is_empty() {
            out.push(RawChunk::TextDelta(content));
        }
    }

    let mut citations: Vec<Citation> = message
        .annotations
        .unwrap_or_default()
        .into_iter()
        .filter_map(ChatAnnotation::into_citation)
        .collect();
    let mut source = WebSearchSource::OpenAi;
    if citations.is_empty() {
        if let Some(urls) = response.citations {
            citations = urls.into_iter().map(Citation::new).collect();
            source = WebSearchSource::Perplexity;
        }
    }
    if !citations.is_empty() {
        out.push(RawChunk::WebSearch {
            results: citations,
            source,
        });
    }

    let mut tools = ToolCallAccumulator::new();
    for (index, call) in message.tool_calls.unwrap_or_default().into_iter().enumerate() {
        let function = call.function.unwrap_or_default();
        tools.push(
            index,
            call.id.as_deref(),
            function.name.as_deref(),
            function.arguments.as_deref(),
        );
    }
    let calls = tools.drain();
    if !calls.is_empty() {
        out.push(RawChunk::ToolCalls(calls));
    }

    if let Some(usage) = response.usage {
        out.push(RawChunk::Usage(usage.into_usage()));
    }
    if let Some(reason) = choice.finish_reason {
        out.push(RawChunk::Finish(FinishReason::parse(&reason)));
    }

    Ok(out)
}

// OpenAI API types

#[derive(Debug, Deserialize)]
struct ChatError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: Option<u32>,
}

impl ChatUsage {
    fn into_usage(self) -> Usage {
        let mut usage = Usage::new(self.prompt_tokens, self.completion_tokens);
        if let Some(total) = self.total_tokens {
            usage.total_tokens = total;
        }
        usage
    }
}

#[derive(Debug, Default, Deserialize)]
struct ChatFunction {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatToolCall {
    index: Option<usize>,
    id: Option<String>,
    function: Option<ChatFunction>,
}

#[derive(Debug, Deserialize)]
struct ChatAnnotation {
    #[serde(rename = "type")]
    kind: String,
    url_citation: Option<UrlCitation>,
}

#[derive(Debug, Deserialize)]
struct UrlCitation {
    url: String,
    title: Option<String>,
}

impl ChatAnnotation {
    fn into_citation(self) -> Option<Citation> {
        if self.kind != "url_citation" {
            return None;
        }
        let cite = self.url_citation?;
        Some(Citation::new(cite.url).with_title(cite.title))
    }
}

#[derive(Debug, Deserialize)]
struct ChatImage {
    image_url: ChatImageUrl,
}

#[derive(Debug, Deserialize)]
struct ChatImageUrl {
    url: String,
}

impl ChatImage {
    fn into_generated(self) -> GeneratedImage {
        let url = self.image_url.url;
        match url
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(";base64,"))
        {
            Some((media_type, data)) => GeneratedImage::Base64 {
                data: data.to_string(),
                media_type: media_type.to_string(),
            },
            None => GeneratedImage::Url { url },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ChatDelta {
    content: Option<String>,
    reasoning_content: Option<String>,
    reasoning: Option<String>,
    tool_calls: Option<Vec<ChatToolCall>>,
    annotations: Option<Vec<ChatAnnotation>>,
    images: Option<Vec<ChatImage>>,
}

#[derive(Debug, Deserialize)]
struct ChatStreamChoice {
    #[serde(default)]
    delta: ChatDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatStreamChunk {
    #[serde(default)]
    choices: Vec<ChatStreamChoice>,
    usage: Option<ChatUsage>,
    citations: Option<Vec<String>>,
    error: Option<ChatError>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
    reasoning_content: Option<String>,
    reasoning: Option<String>,
    tool_calls: Option<Vec<ChatToolCall>>,
    annotations: Option<Vec<ChatAnnotation>>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: ChatResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
    citations: Option<Vec<String>>,
    error: Option<ChatError>,
}
