use std::collections::HashSet;

use async_trait::async_trait;
use eventsource_stream::Event;
use serde::Deserialize;
use serde_json::{json, Value};

use super::adapter::{endpoint, header_refs, send_with, EventDecoder};
use super::http_client::HttpClientTrait;
use crate::domain::llm::{
    AssistantTurn, Citation, ContentPart, Conversation, FileContent, GeneratedImage, Message,
    MessageRole, RawChunk, RawChunkStream, RawToolCall, ReasoningEffort, RequestPlan,
    SendContext, ToolArguments, ToolCallResult, VendorAdapter, VendorKind, WebSearchSource,
};
use crate::domain::{DomainError, FinishReason, Usage};

const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const PROVIDER: &str = "gemini";

/// Google Gemini `generateContent` protocol
#[derive(Debug)]
pub struct GeminiAdapter<C: HttpClientTrait> {
    client: C,
    base_url: String,
    extra_headers: Vec<(String, String)>,
}

impl<C: HttpClientTrait> GeminiAdapter<C> {
    pub fn new(client: C) -> Self {
        Self::with_base_url(client, DEFAULT_GEMINI_BASE_URL)
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

    fn generate_url(&self, model: &str, stream: bool) -> String {
        let path = if stream {
            format!("/v1beta/models/{}:streamGenerateContent?alt=sse", model)
        } else {
            format!("/v1beta/models/{}:generateContent", model)
        };
        endpoint(&self.base_url, &path)
    }

    fn content_item(message: &Message) -> Value {
        let role = match message.role {
            MessageRole::Assistant => "model",
            _ => "user",
        };

        let parts: Vec<Value> = if message.role == MessageRole::Assistant {
            vec![json!({ "text": message.content_text() })]
        } else {
            message.content_parts().iter().filter_map(part_value).collect()
        };

        json!({ "role": role, "parts": parts })
    }
}

fn part_value(part: &ContentPart) -> Option<Value> {
    match part {
        ContentPart::Text { text } => Some(json!({ "text": text })),
        ContentPart::ImageBase64 { data, media_type } => Some(json!({
            "inlineData": { "mimeType": media_type, "data": data },
        })),
        ContentPart::ImageUrl { url } => match split_data_url(url) {
            Some((media_type, data)) => Some(json!({
                "inlineData": { "mimeType": media_type, "data": data },
            })),
            None => {
                let mime = mime_guess::from_path(url).first_or(mime_guess::mime::IMAGE_JPEG);
                Some(json!({
                    "fileData": { "fileUri": url, "mimeType": mime.essence_str() },
                }))
            }
        },
        ContentPart::File {
            name,
            content: FileContent::Text { text },
            ..
        } => Some(json!({ "text": crate::domain::llm::format_file_text(name, text) })),
        ContentPart::File {
            media_type,
            content: FileContent::Base64 { data },
            ..
        } => Some(json!({
            "inlineData": { "mimeType": media_type, "data": data },
        })),
    }
}

fn split_data_url(url: &str) -> Option<(&str, &str)> {
    url.strip_prefix("data:")?.split_once(";base64,")
}

/// Model parts of one round, restricted to the function calls being answered
fn replay_parts(parts: &[Value], answered: &HashSet<&str>) -> Vec<Value> {
    parts
        .iter()
        .filter(|part| match part["functionCall"]["name"].as_str() {
            Some(name) => answered.contains(name),
            None => true,
        })
        .cloned()
        .collect()
}

#[async_trait]
impl<C: HttpClientTrait + 'static> VendorAdapter for GeminiAdapter<C> {
    fn vendor(&self) -> VendorKind {
        VendorKind::Gemini
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    fn build_conversation(&self, system: Option<&str>, messages: &[Message]) -> Conversation {
        Conversation {
            system: system.map(str::to_string),
            items: messages.iter().map(Self::content_item).collect(),
        }
    }

    fn append_messages(&self, conversation: &mut Conversation, messages: &[Message]) {
        conversation
            .items
            .extend(messages.iter().map(Self::content_item));
    }

    fn append_tool_round(
        &self,
        conversation: &mut Conversation,
        turn: &AssistantTurn,
        results: &[ToolCallResult],
    ) {
        let parts = match &turn.native_items {
            Some(parts) => {
                let answered: HashSet<&str> =
                    turn.tool_calls.iter().map(|c| c.name.as_str()).collect();
                replay_parts(parts, &answered)
            }
            None => {
                let mut parts = Vec::new();
                if !turn.text.is_empty() {
                    parts.push(json!({ "text": turn.text }));
                }
                parts.extend(turn.tool_calls.iter().map(|call| {
                    json!({
                        "functionCall": { "name": call.name, "args": call.arguments.to_value() },
                    })
                }));
                parts
            }
        };
        conversation
            .items
            .push(json!({ "role": "model", "parts": parts }));

        let responses: Vec<Value> = results
            .iter()
            .map(|result| {
                let key = if result.is_error() { "error" } else { "content" };
                json!({
                    "functionResponse": {
                        "name": result.tool.name,
                        "response": { key: result.output.to_text() },
                    }
                })
            })
            .collect();
        conversation
            .items
            .push(json!({ "role": "user", "parts": responses }));
    }

    fn build_request(&self, conversation: &Conversation, plan: &RequestPlan) -> Value {
        let mut body = json!({ "contents": conversation.items });

        if let Some(system) = &conversation.system {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }

        let mut generation = serde_json::Map::new();
        if let Some(temp) = plan.temperature {
            generation.insert("temperature".to_string(), json!(temp));
        }
        if let Some(top_p) = plan.top_p {
            generation.insert("topP".to_string(), json!(top_p));
        }
        if let Some(max_tokens) = plan.max_tokens {
            generation.insert("maxOutputTokens".to_string(), json!(max_tokens));
        }
        if let Some(reasoning) = &plan.reasoning {
            let budget: i64 = match (reasoning.effort, reasoning.budget_tokens) {
                (ReasoningEffort::None, _) => 0,
                (ReasoningEffort::Auto, _) | (_, None) => -1,
                (_, Some(budget)) => i64::from(budget),
            };
            generation.insert(
                "thinkingConfig".to_string(),
                json!({ "thinkingBudget": budget, "includeThoughts": budget != 0 }),
            );
        }
        if plan.generate_image {
            generation.insert("responseModalities".to_string(), json!(["TEXT", "IMAGE"]));
        }
        if !generation.is_empty() {
            body["generationConfig"] = Value::Object(generation);
        }

        let mut tools = Vec::new();
        if !plan.tools.is_empty() {
            let declarations: Vec<Value> = plan
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "name": tool.name,
                        "description": tool.description.clone().unwrap_or_default(),
                        "parameters": tool.input_schema,
                    })
                })
                .collect();
            tools.push(json!({ "functionDeclarations": declarations }));
        }
        if plan.web_search {
            tools.push(json!({ "googleSearch": {} }));
        }
        if !tools.is_empty() {
            body["tools"] = json!(tools);
        }

        plan.apply_custom_parameters(&mut body);
        body
    }

    async fn send(&self, body: Value, ctx: &SendContext) -> Result<RawChunkStream, DomainError> {
        let url = self.generate_url(&ctx.model_id, ctx.stream);
        let mut headers = vec![
            ("x-goog-api-key", ctx.api_key.as_str()),
            ("Content-Type", "application/json"),
        ];
        headers.extend(header_refs(&self.extra_headers));

        send_with(
            &self.client,
            &url,
            headers,
            &body,
            ctx,
            GeminiStreamDecoder::default(),
            decode_generate_body,
        )
        .await
    }
}

/// Maps `GenerateContentResponse` chunks onto pre-chunks
#[derive(Debug, Default)]
pub struct GeminiStreamDecoder {
    created: bool,
    images_started: bool,
    /// Answer parts in arrival order, replayed verbatim once any of them is signed
    native_parts: Vec<Value>,
    has_signature: bool,
    calls: Vec<RawToolCall>,
    citations: Vec<Citation>,
    usage: Option<Usage>,
    finish: Option<FinishReason>,
}

impl GeminiStreamDecoder {
    fn on_response(&mut self, response: GenerateResponse) -> Result<Vec<RawChunk>, DomainError> {
        if let Some(error) = response.error {
            return Err(DomainError::provider(PROVIDER, error.message));
        }

        let mut out = Vec::new();
        if !self.created {
            self.created = true;
            out.push(RawChunk::Created);
        }

        for candidate in response.candidates {
            for raw in candidate.content.map(|c| c.parts).unwrap_or_default() {
                self.on_part(raw, &mut out)?;
            }

            if let Some(grounding) = candidate.grounding_metadata {
                for chunk in grounding.grounding_chunks {
                    if let Some(web) = chunk.web {
                        self.citations.push(Citation::new(web.uri).with_title(web.title));
                    }
                }
            }

            if let Some(reason) = candidate.finish_reason {
                self.finish = Some(FinishReason::parse(&reason));
            }
        }

        if let Some(usage) = response.usage_metadata {
            self.usage = Some(usage.into_usage());
        }

        Ok(out)
    }

    fn on_part(&mut self, raw: Value, out: &mut Vec<RawChunk>) -> Result<(), DomainError> {
        let part: Part = serde_json::from_value(raw.clone()).map_err(|e| {
            DomainError::provider(PROVIDER, format!("Failed to parse part: {}", e))
        })?;

        if part.thought_signature.is_some() {
            self.has_signature = true;
        }

        if let Some(call) = part.function_call {
            let id = call
                .id
                .unwrap_or_else(|| format!("{}_{}", call.name, self.calls.len()));
            self.calls.push(RawToolCall {
                id,
                name: call.name,
                arguments: ToolArguments::Parsed(call.args.unwrap_or_else(|| json!({}))),
            });
            self.native_parts.push(raw);
            return Ok(());
        }

        if let Some(inline) = part.inline_data {
            if !self.images_started {
                self.images_started = true;
                out.push(RawChunk::ImageCreated);
            }
            out.push(RawChunk::ImageComplete(vec![GeneratedImage::Base64 {
                data: inline.data,
                media_type: inline.mime_type,
            }]));
            return Ok(());
        }

        if let Some(text) = part.text.filter(|t| !t.is_empty()) {
            if part.thought {
                out.push(RawChunk::ReasoningDelta(text));
            } else {
                if part.thought_signature.is_some() {
                    self.native_parts.push(raw);
                } else {
                    append_plain_text(&mut self.native_parts, &text);
                }
                out.push(RawChunk::TextDelta(text));
            }
        }

        Ok(())
    }

    fn close(&mut self) -> Vec<RawChunk> {
        let mut out = Vec::new();
        if !self.citations.is_empty() {
            out.push(RawChunk::WebSearch {
                results: std::mem::take(&mut self.citations),
                source: WebSearchSource::Gemini,
            });
        }

        let has_calls = !self.calls.is_empty();
        if has_calls {
            out.push(RawChunk::ToolCalls(std::mem::take(&mut self.calls)));
        }

        if self.has_signature {
            out.push(RawChunk::NativeItems(std::mem::take(&mut self.native_parts)));
        }

        if let Some(usage) = self.usage.take() {
            out.push(RawChunk::Usage(usage));
        }

        let reason = if has_calls {
            Some(FinishReason::ToolCalls)
        } else {
            self.finish.take()
        };
        if let Some(reason) = reason {
            out.push(RawChunk::Finish(reason));
        }
        out
    }
}

/// Merge unsigned text into the previous part when that part is plain text too
fn append_plain_text(parts: &mut Vec<Value>, text: &str) {
    if let Some(Value::Object(last)) = parts.last_mut() {
        if last.len() == 1 {
            if let Some(Value::String(existing)) = last.get_mut("text") {
                existing.push_str(text);
                return;
            }
        }
    }
    parts.push(json!({ "text": text }));
}

impl EventDecoder for GeminiStreamDecoder {
    fn decode(&mut self, event: &Event) -> Result<Vec<RawChunk>, DomainError> {
        let response: GenerateResponse = serde_json::from_str(&event.data).map_err(|e| {
            DomainError::provider(PROVIDER, format!("Failed to parse stream chunk: {}", e))
        })?;
        self.on_response(response)
    }

    fn finish(&mut self) -> Result<Vec<RawChunk>, DomainError> {
        Ok(self.close())
    }
}

/// Decode a complete `generateContent` response
pub fn decode_generate_body(json: Value) -> Result<Vec<RawChunk>, DomainError> {
    let response: GenerateResponse = serde_json::from_value(json).map_err(|e| {
        DomainError::provider(PROVIDER, format!("Failed to parse response: {}", e))
    })?;

    let mut decoder = GeminiStreamDecoder::default();
    let mut out = decoder.on_response(response)?;
    out.extend(decoder.close());
    Ok(out)
}

// Gemini API types

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
    thought_signature: Option<String>,
    function_call: Option<FunctionCall>,
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    id: Option<String>,
    name: String,
    args: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    web: Option<WebSource>,
}

#[derive(Debug, Deserialize)]
struct WebSource {
    uri: String,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    thoughts_token_count: u32,
    total_token_count: Option<u32>,
}

impl UsageMetadata {
    fn into_usage(self) -> Usage {
        let mut usage = Usage::new(
            self.prompt_token_count,
            self.candidates_token_count + self.thoughts_token_count,
        );
        if let Some(total) = self.total_token_count {
            usage.total_tokens = total;
        }
        usage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::capability::ReasoningSettings;
    use crate::domain::llm::{ToolCallStatus, ToolDefinition, ToolOutput};
    use crate::domain::Model;
    use crate::infrastructure::llm::http_client::mock::MockHttpClient;
    use futures::StreamExt;
    use tokio_util::sync::CancellationToken;

    const STREAM_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:streamGenerateContent?alt=sse";
    const BODY_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent";

    fn ctx(stream: bool) -> SendContext {
        SendContext {
            model_id: "gemini-2.5-flash".to_string(),
            api_key: "g-key".to_string(),
            stream,
            cancel: CancellationToken::new(),
        }
    }

    async fn decode(events: &[Value]) -> (Vec<RawChunk>, MockHttpClient) {
        let pieces: Vec<String> = events.iter().map(|e| format!("data: {}\r\n\r\n", e)).collect();
        let refs: Vec<&str> = pieces.iter().map(String::as_str).collect();
        let adapter = GeminiAdapter::new(MockHttpClient::new().with_sse(STREAM_URL, &refs));
        let chunks = adapter
            .send(json!({}), &ctx(true))
            .await
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await;
        (chunks, adapter.client)
    }

    #[tokio::test]
    async fn test_thoughts_text_and_usage() {
        let (chunks, client) = decode(&[
            json!({"candidates": [{"content": {"role": "model", "parts": [{"text": "Thinking", "thought": true}]}}]}),
            json!({"candidates": [{"content": {"role": "model", "parts": [{"text": "Answer"}]}, "finishReason": "STOP"}],
                   "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 2, "thoughtsTokenCount": 3, "totalTokenCount": 9}}),
        ])
        .await;

        assert_eq!(
            chunks,
            vec![
                RawChunk::Created,
                RawChunk::ReasoningDelta("Thinking".to_string()),
                RawChunk::TextDelta("Answer".to_string()),
                RawChunk::Usage(Usage::new(4, 5)),
                RawChunk::Finish(FinishReason::Stop),
            ]
        );
        assert_eq!(client.requests()[0].header("x-goog-api-key"), Some("g-key"));
    }

    #[tokio::test]
    async fn test_function_call_with_signature() {
        let (chunks, _) = decode(&[json!({"candidates": [{"content": {"parts": [
            {"functionCall": {"name": "clock", "args": {"tz": "UTC"}}, "thoughtSignature": "c2ln"}
        ]}, "finishReason": "STOP"}]})])
        .await;

        let calls = chunks
            .iter()
            .find_map(|c| match c {
                RawChunk::ToolCalls(calls) => Some(calls.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(calls[0].id, "clock_0");
        assert_eq!(calls[0].arguments, ToolArguments::Parsed(json!({"tz": "UTC"})));

        let native = chunks
            .iter()
            .find_map(|c| match c {
                RawChunk::NativeItems(parts) => Some(parts.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(native[0]["thoughtSignature"], "c2ln");
        assert_eq!(chunks.last(), Some(&RawChunk::Finish(FinishReason::ToolCalls)));
    }

    #[tokio::test]
    async fn test_native_parts_keep_arrival_order() {
        let (chunks, _) = decode(&[
            json!({"candidates": [{"content": {"parts": [{"text": "Let me "}, {"text": "check."}]}}]}),
            json!({"candidates": [{"content": {"parts": [{"text": " Signed.", "thoughtSignature": "c2ln"}]}}]}),
            json!({"candidates": [{"content": {"parts": [
                {"text": " Then"},
                {"functionCall": {"name": "clock", "args": {}}},
                {"text": " done."}
            ]}, "finishReason": "STOP"}]}),
        ])
        .await;

        let native = chunks
            .iter()
            .find_map(|c| match c {
                RawChunk::NativeItems(parts) => Some(parts.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            native,
            vec![
                json!({"text": "Let me check."}),
                json!({"text": " Signed.", "thoughtSignature": "c2ln"}),
                json!({"text": " Then"}),
                json!({"functionCall": {"name": "clock", "args": {}}}),
                json!({"text": " done."}),
            ]
        );
    }

    #[tokio::test]
    async fn test_grounding_and_inline_image() {
        let (chunks, _) = decode(&[json!({"candidates": [{
            "content": {"parts": [{"inlineData": {"mimeType": "image/png", "data": "aGk="}}]},
            "groundingMetadata": {"groundingChunks": [{"web": {"uri": "https://example.com", "title": "Example"}}]},
            "finishReason": "STOP"
        }]})])
        .await;

        assert_eq!(chunks[1], RawChunk::ImageCreated);
        assert!(matches!(&chunks[2], RawChunk::ImageComplete(images) if images.len() == 1));
        assert!(chunks.iter().any(|c| matches!(
            c,
            RawChunk::WebSearch { source: WebSearchSource::Gemini, results } if results[0].url == "https://example.com"
        )));
    }

    #[tokio::test]
    async fn test_error_body_in_stream() {
        let pieces = [format!("data: {}\n\n", json!({"error": {"code": 429, "message": "Resource exhausted"}}))];
        let refs: Vec<&str> = pieces.iter().map(String::as_str).collect();
        let adapter = GeminiAdapter::new(MockHttpClient::new().with_sse(STREAM_URL, &refs));

        let items: Vec<_> = adapter.send(json!({}), &ctx(true)).await.unwrap().collect().await;
        assert!(matches!(&items[0], Err(DomainError::Provider { message, .. }) if message == "Resource exhausted"));
    }

    #[tokio::test]
    async fn test_non_streamed_body() {
        let client = MockHttpClient::new().with_response(
            BODY_URL,
            json!({
                "candidates": [{"content": {"parts": [{"text": "Hello"}]}, "finishReason": "STOP"}],
                "usageMetadata": {"promptTokenCount": 2, "candidatesTokenCount": 1}
            }),
        );
        let adapter = GeminiAdapter::new(client);

        let chunks: Vec<_> = adapter
            .send(json!({}), &ctx(false))
            .await
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await;
        assert_eq!(
            chunks,
            vec![
                RawChunk::Created,
                RawChunk::TextDelta("Hello".to_string()),
                RawChunk::Usage(Usage::new(2, 1)),
                RawChunk::Finish(FinishReason::Stop),
            ]
        );
    }

    #[test]
    fn test_request_shape() {
        let adapter = GeminiAdapter::new(MockHttpClient::new());
        let mut plan = RequestPlan::new(Model::new("gemini-2.5-flash", "gemini"));
        plan.temperature = Some(0.5);
        plan.max_tokens = Some(2048);
        plan.web_search = true;
        plan.tools = vec![ToolDefinition::new("clock")];
        plan.reasoning = Some(ReasoningSettings {
            effort: ReasoningEffort::Low,
            budget_tokens: Some(1200),
            effort_param: false,
        });

        let message = Message::user_with_parts(vec![
            ContentPart::text("Describe"),
            ContentPart::ImageUrl {
                url: "data:image/png;base64,aGk=".to_string(),
            },
        ]);
        let conversation = adapter.build_conversation(Some("Be brief."), &[message]);
        let body = adapter.build_request(&conversation, &plan);

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be brief.");
        assert_eq!(body["contents"][0]["parts"][1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 2048);
        assert_eq!(body["generationConfig"]["thinkingConfig"]["thinkingBudget"], 1200);
        assert_eq!(body["tools"][0]["functionDeclarations"][0]["name"], "clock");
        assert_eq!(body["tools"][1], json!({"googleSearch": {}}));
    }

    #[test]
    fn test_reasoning_off_sets_zero_budget() {
        let adapter = GeminiAdapter::new(MockHttpClient::new());
        let mut plan = RequestPlan::new(Model::new("gemini-2.5-flash", "gemini"));
        plan.reasoning = Some(ReasoningSettings {
            effort: ReasoningEffort::None,
            budget_tokens: Some(0),
            effort_param: false,
        });

        let conversation = adapter.build_conversation(None, &[Message::user("hi")]);
        let body = adapter.build_request(&conversation, &plan);
        assert_eq!(body["generationConfig"]["thinkingConfig"]["thinkingBudget"], 0);
        assert_eq!(body["generationConfig"]["thinkingConfig"]["includeThoughts"], false);
    }

    #[test]
    fn test_tool_round_parts() {
        let adapter = GeminiAdapter::new(MockHttpClient::new());
        let mut conversation = adapter.build_conversation(None, &[Message::user("hi")]);

        let turn = AssistantTurn {
            tool_calls: vec![RawToolCall {
                id: "clock_0".to_string(),
                name: "clock".to_string(),
                arguments: ToolArguments::parse("{}"),
            }],
            ..Default::default()
        };
        let result = ToolCallResult {
            id: "clock_0".to_string(),
            tool: ToolDefinition::new("clock"),
            arguments: ToolArguments::parse("{}"),
            status: ToolCallStatus::Success,
            output: ToolOutput::text("noon"),
        };
        adapter.append_tool_round(&mut conversation, &turn, &[result]);

        assert_eq!(conversation.items[1]["role"], "model");
        assert_eq!(conversation.items[1]["parts"][0]["functionCall"]["name"], "clock");
        assert_eq!(
            conversation.items[2]["parts"][0]["functionResponse"]["response"]["content"],
            "noon"
        );
    }
}
