use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use eventsource_stream::Event;
use serde::Deserialize;
use serde_json::{json, Value};

use super::adapter::{endpoint, event_name, header_refs, send_with, EventDecoder};
use super::http_client::HttpClientTrait;
use crate::domain::capability::{is_openai_reasoning_model, supports_temperature_and_top_p};
use crate::domain::llm::{
    AssistantTurn, Citation, ContentPart, Conversation, FileContent, GeneratedImage, Message,
    MessageRole, RawChunk, RawChunkStream, RawToolCall, RequestPlan, SendContext, ToolArguments,
    ToolCallResult, VendorAdapter, VendorKind, WebSearchSource,
};
use crate::domain::{DomainError, FinishReason, Usage};

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
const PROVIDER: &str = "openai-response";

/// OpenAI responses protocol (`/v1/responses`)
#[derive(Debug)]
pub struct OpenAiResponsesAdapter<C: HttpClientTrait> {
    client: C,
    base_url: String,
    extra_headers: Vec<(String, String)>,
}

impl<C: HttpClientTrait> OpenAiResponsesAdapter<C> {
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

    fn responses_url(&self) -> String {
        endpoint(&self.base_url, "/v1/responses")
    }

    fn input_item(message: &Message) -> Value {
        match message.role {
            MessageRole::Assistant => json!({
                "role": "assistant",
                "content": message.content_text(),
            }),
            MessageRole::System => json!({
                "role": "system",
                "content": message.content_text(),
            }),
            MessageRole::User | MessageRole::Tool => {
                let parts: Vec<Value> = message
                    .content_parts()
                    .iter()
                    .filter_map(input_part)
                    .collect();
                json!({ "role": "user", "content": parts })
            }
        }
    }
}

fn input_part(part: &ContentPart) -> Option<Value> {
    match part {
        ContentPart::Text { text } => Some(json!({ "type": "input_text", "text": text })),
        ContentPart::ImageUrl { .. } | ContentPart::ImageBase64 { .. } => part
            .image_url()
            .map(|url| json!({ "type": "input_image", "image_url": url })),
        ContentPart::File {
            name,
            content: FileContent::Text { text },
            ..
        } => Some(json!({
            "type": "input_text",
            "text": crate::domain::llm::format_file_text(name, text),
        })),
        ContentPart::File {
            name,
            media_type,
            content: FileContent::Base64 { data },
        } => Some(json!({
            "type": "input_file",
            "filename": name,
            "file_data": format!("data:{};base64,{}", media_type, data),
        })),
    }
}

/// Replayable output items of one round, restricted to the calls being answered
fn replay_items(items: &[Value], answered: &HashSet<&str>) -> Vec<Value> {
    items
        .iter()
        .filter(|item| match item["type"].as_str() {
            Some("function_call") => item["call_id"]
                .as_str()
                .is_some_and(|id| answered.contains(id)),
            _ => true,
        })
        .cloned()
        .collect()
}

#[async_trait]
impl<C: HttpClientTrait + 'static> VendorAdapter for OpenAiResponsesAdapter<C> {
    fn vendor(&self) -> VendorKind {
        VendorKind::OpenAiResponses
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    fn build_conversation(&self, system: Option<&str>, messages: &[Message]) -> Conversation {
        Conversation {
            system: system.map(str::to_string),
            items: messages.iter().map(Self::input_item).collect(),
        }
    }

    fn append_messages(&self, conversation: &mut Conversation, messages: &[Message]) {
        conversation
            .items
            .extend(messages.iter().map(Self::input_item));
    }

    fn append_tool_round(
        &self,
        conversation: &mut Conversation,
        turn: &AssistantTurn,
        results: &[ToolCallResult],
    ) {
        match &turn.native_items {
            Some(items) => {
                let answered: HashSet<&str> =
                    turn.tool_calls.iter().map(|c| c.id.as_str()).collect();
                conversation.items.extend(replay_items(items, &answered));
            }
            None => {
                if !turn.text.is_empty() {
                    conversation
                        .items
                        .push(json!({ "role": "assistant", "content": turn.text }));
                }
                for call in &turn.tool_calls {
                    conversation.items.push(json!({
                        "type": "function_call",
                        "call_id": call.id,
                        "name": call.name,
                        "arguments": call.arguments.to_json_string(),
                    }));
                }
            }
        }

        for result in results {
            conversation.items.push(json!({
                "type": "function_call_output",
                "call_id": result.id,
                "output": result.output.to_text(),
            }));
        }
    }

    fn build_request(&self, conversation: &Conversation, plan: &RequestPlan) -> Value {
        let mut body = json!({
            "model": plan.model_id(),
            "input": conversation.items,
            "stream": plan.stream,
        });

        if let Some(system) = &conversation.system {
            body["instructions"] = json!(system);
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
            body["max_output_tokens"] = json!(max_tokens);
        }

        if let Some(reasoning) = &plan.reasoning {
            if reasoning.effort_param || is_openai_reasoning_model(&plan.model) {
                body["reasoning"] = json!({
                    "effort": reasoning.effort.as_str(),
                    "summary": "auto",
                });
            }
        }

        let mut tools: Vec<Value> = plan
            .tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "name": tool.name,
                    "description": tool.description.clone().unwrap_or_default(),
                    "parameters": tool.input_schema,
                })
            })
            .collect();
        if plan.web_search {
            tools.push(json!({ "type": "web_search_preview" }));
        }
        if plan.generate_image {
            tools.push(json!({ "type": "image_generation" }));
        }
        if !tools.is_empty() {
            body["tools"] = json!(tools);
        }

        plan.apply_custom_parameters(&mut body);
        body
    }

    async fn send(&self, body: Value, ctx: &SendContext) -> Result<RawChunkStream, DomainError> {
        let url = self.responses_url();
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
            ResponsesStreamDecoder::default(),
            decode_responses_body,
        )
        .await
    }
}

/// Maps responses-API events onto pre-chunks
#[derive(Debug, Default)]
pub struct ResponsesStreamDecoder {
    /// item id -> (call id, name) for calls whose arguments are still streaming
    pending_calls: HashMap<String, (String, String)>,
    calls: Vec<RawToolCall>,
    citations: Vec<Citation>,
    images_started: bool,
    completed: bool,
}

impl ResponsesStreamDecoder {
    fn push_call(&mut self, call_id: String, name: String, arguments: &str) {
        if self.calls.iter().any(|c| c.id == call_id) {
            return;
        }
        self.calls.push(RawToolCall {
            id: call_id,
            name,
            arguments: ToolArguments::parse(arguments),
        });
    }

    fn on_item_done(&mut self, item: &Value, out: &mut Vec<RawChunk>) {
        match item["type"].as_str() {
            Some("function_call") => {
                let call_id = item["call_id"].as_str().unwrap_or_default().to_string();
                let name = item["name"].as_str().unwrap_or_default().to_string();
                let arguments = item["arguments"].as_str().unwrap_or_default();
                self.push_call(call_id, name, arguments);
            }
            Some("image_generation_call") => {
                if let Some(data) = item["result"].as_str() {
                    if !self.images_started {
                        self.images_started = true;
                        out.push(RawChunk::ImageCreated);
                    }
                    out.push(RawChunk::ImageComplete(vec![GeneratedImage::Base64 {
                        data: data.to_string(),
                        media_type: "image/png".to_string(),
                    }]));
                }
            }
            _ => {}
        }
    }

    fn on_completed(&mut self, response: &Value, incomplete: bool) -> Vec<RawChunk> {
        self.completed = true;
        let mut out = Vec::new();
        if !self.citations.is_empty() {
            out.push(RawChunk::WebSearch {
                results: std::mem::take(&mut self.citations),
                source: WebSearchSource::OpenAiResponse,
            });
        }

        let has_calls = !self.calls.is_empty();
        if has_calls {
            out.push(RawChunk::ToolCalls(std::mem::take(&mut self.calls)));
        }

        if let Some(output) = response["output"].as_array() {
            out.push(RawChunk::NativeItems(output.clone()));
        }

        if let Ok(usage) = serde_json::from_value::<ResponsesUsage>(response["usage"].clone()) {
            out.push(RawChunk::Usage(usage.into_usage()));
        }

        let reason = if has_calls {
            FinishReason::ToolCalls
        } else if incomplete {
            FinishReason::Length
        } else {
            FinishReason::Stop
        };
        out.push(RawChunk::Finish(reason));
        out
    }
}

impl EventDecoder for ResponsesStreamDecoder {
    fn decode(&mut self, event: &Event) -> Result<Vec<RawChunk>, DomainError> {
        let data: Value = serde_json::from_str(&event.data).map_err(|e| {
            DomainError::provider(PROVIDER, format!("Failed to parse stream event: {}", e))
        })?;

        let kind = data["type"]
            .as_str()
            .or(event_name(event))
            .unwrap_or_default();

        let mut out = Vec::new();
        match kind {
            "response.created" => out.push(RawChunk::Created),
            "response.output_text.delta" => {
                if let Some(delta) = data["delta"].as_str().filter(|d| !d.is_empty()) {
                    out.push(RawChunk::TextDelta(delta.to_string()));
                }
            }
            "response.reasoning_summary_text.delta" | "response.reasoning_text.delta" => {
                if let Some(delta) = data["delta"].as_str().filter(|d| !d.is_empty()) {
                    out.push(RawChunk::ReasoningDelta(delta.to_string()));
                }
            }
            "response.output_text.annotation.added" => {
                if let Some(citation) = annotation_citation(&data["annotation"]) {
                    self.citations.push(citation);
                }
            }
            "response.output_item.added" => {
                let item = &data["item"];
                match item["type"].as_str() {
                    Some("function_call") => {
                        if let Some(item_id) = item["id"].as_str() {
                            self.pending_calls.insert(
                                item_id.to_string(),
                                (
                                    item["call_id"].as_str().unwrap_or_default().to_string(),
                                    item["name"].as_str().unwrap_or_default().to_string(),
                                ),
                            );
                        }
                    }
                    Some("image_generation_call") if !self.images_started => {
                        self.images_started = true;
                        out.push(RawChunk::ImageCreated);
                    }
                    _ => {}
                }
            }
            "response.function_call_arguments.done" => {
                let item_id = data["item_id"].as_str().unwrap_or_default();
                if let Some((call_id, name)) = self.pending_calls.remove(item_id) {
                    let arguments = data["arguments"].as_str().unwrap_or_default();
                    self.push_call(call_id, name, arguments);
                }
            }
            "response.output_item.done" => self.on_item_done(&data["item"], &mut out),
            "response.completed" => out.extend(self.on_completed(&data["response"], false)),
            "response.incomplete" => out.extend(self.on_completed(&data["response"], true)),
            "response.failed" => {
                let message = data["response"]["error"]["message"]
                    .as_str()
                    .unwrap_or("Response failed");
                return Err(DomainError::provider(PROVIDER, message));
            }
            "error" => {
                let message = data["message"]
                    .as_str()
                    .or(data["error"]["message"].as_str())
                    .unwrap_or("Unknown error");
                return Err(DomainError::provider(PROVIDER, message));
            }
            _ => {}
        }

        Ok(out)
    }

    fn finish(&mut self) -> Result<Vec<RawChunk>, DomainError> {
        if self.completed {
            Ok(Vec::new())
        } else {
            Err(DomainError::provider(PROVIDER, "Stream ended before response.completed"))
        }
    }
}

fn annotation_citation(annotation: &Value) -> Option<Citation> {
    if annotation["type"].as_str() != Some("url_citation") {
        return None;
    }
    let url = annotation["url"].as_str()?;
    Some(Citation::new(url).with_title(annotation["title"].as_str().map(str::to_string)))
}

/// Decode a complete `stream: false` response object
pub fn decode_responses_body(json: Value) -> Result<Vec<RawChunk>, DomainError> {
    if let Some(message) = json["error"]["message"].as_str() {
        return Err(DomainError::provider(PROVIDER, message));
    }

    let output = json["output"]
        .as_array()
        .ok_or_else(|| DomainError::provider(PROVIDER, "No output in response"))?;

    let mut decoder = ResponsesStreamDecoder::default();
    let mut out = vec![RawChunk::Created];

    for item in output {
        match item["type"].as_str() {
            Some("reasoning") => {
                for summary in item["summary"].as_array().into_iter().flatten() {
                    if let Some(text) = summary["text"].as_str().filter(|t| !t.is_empty()) {
                        out.push(RawChunk::ReasoningDelta(text.to_string()));
                    }
                }
            }
            Some("message") => {
                for part in item["content"].as_array().into_iter().flatten() {
                    if part["type"].as_str() != Some("output_text") {
                        continue;
                    }
                    if let Some(text) = part["text"].as_str().filter(|t| !t.is_empty()) {
                        out.push(RawChunk::TextDelta(text.to_string()));
                    }
                    for annotation in part["annotations"].as_array().into_iter().flatten() {
                        if let Some(citation) = annotation_citation(annotation) {
                            decoder.citations.push(citation);
                        }
                    }
                }
            }
            _ => decoder.on_item_done(item, &mut out),
        }
    }

    let incomplete = json["status"].as_str() == Some("incomplete");
    out.extend(decoder.on_completed(&json, incomplete));
    Ok(out)
}

#[derive(Debug, Deserialize)]
struct ResponsesUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
    total_tokens: Option<u32>,
}

impl ResponsesUsage {
    fn into_usage(self) -> Usage {
        let mut usage = Usage::new(self.input_tokens, self.output_tokens);
        if let Some(total) = self.total_tokens {
            usage.total_tokens = total;
        }
        usage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::capability::ReasoningSettings;
    use crate::domain::llm::{ReasoningEffort, ToolCallStatus, ToolDefinition, ToolOutput};
    use crate::domain::Model;
    use crate::infrastructure::llm::http_client::mock::MockHttpClient;
    use futures::StreamExt;
    use tokio_util::sync::CancellationToken;

    const TEST_URL: &str = "https://api.openai.com/v1/responses";

    fn ctx(stream: bool) -> SendContext {
        SendContext {
            model_id: "gpt-5".to_string(),
            api_key: "sk-test".to_string(),
            stream,
            cancel: CancellationToken::new(),
        }
    }

    fn sse(events: &[Value]) -> Vec<String> {
        events
            .iter()
            .map(|e| format!("event: {}\ndata: {}\n\n", e["type"].as_str().unwrap(), e))
            .collect()
    }

    async fn decode(events: &[Value]) -> Vec<RawChunk> {
        let pieces = sse(events);
        let refs: Vec<&str> = pieces.iter().map(String::as_str).collect();
        let adapter = OpenAiResponsesAdapter::new(MockHttpClient::new().with_sse(TEST_URL, &refs));
        adapter
            .send(json!({}), &ctx(true))
            .await
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_reasoning_summary_and_text() {
        let chunks = decode(&[
            json!({"type": "response.created", "response": {"id": "resp_1"}}),
            json!({"type": "response.reasoning_summary_text.delta", "delta": "Plan"}),
            json!({"type": "response.output_text.delta", "delta": "Done"}),
            json!({"type": "response.completed", "response": {
                "output": [{"type": "message", "id": "msg_1"}],
                "usage": {"input_tokens": 7, "output_tokens": 4, "total_tokens": 11}
            }}),
        ])
        .await;

        assert_eq!(chunks[0], RawChunk::Created);
        assert_eq!(chunks[1], RawChunk::ReasoningDelta("Plan".to_string()));
        assert_eq!(chunks[2], RawChunk::TextDelta("Done".to_string()));
        assert!(chunks.contains(&RawChunk::Usage(Usage::new(7, 4))));
        assert_eq!(chunks.last(), Some(&RawChunk::Finish(FinishReason::Stop)));
    }

    #[tokio::test]
    async fn test_function_call_from_argument_events() {
        let chunks = decode(&[
            json!({"type": "response.created"}),
            json!({"type": "response.output_item.added", "item": {
                "type": "function_call", "id": "fc_1", "call_id": "call_1", "name": "clock"
            }}),
            json!({"type": "response.function_call_arguments.done", "item_id": "fc_1", "arguments": "{\"tz\":\"UTC\"}"}),
            json!({"type": "response.output_item.done", "item": {
                "type": "function_call", "id": "fc_1", "call_id": "call_1", "name": "clock", "arguments": "{\"tz\":\"UTC\"}"
            }}),
            json!({"type": "response.completed", "response": {"output": [
                {"type": "reasoning", "id": "rs_1", "summary": []},
                {"type": "function_call", "id": "fc_1", "call_id": "call_1", "name": "clock", "arguments": "{\"tz\":\"UTC\"}"}
            ]}}),
        ])
        .await;

        let calls = chunks
            .iter()
            .find_map(|c| match c {
                RawChunk::ToolCalls(calls) => Some(calls.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].arguments, ToolArguments::Parsed(json!({"tz": "UTC"})));
        assert!(chunks
            .iter()
            .any(|c| matches!(c, RawChunk::NativeItems(items) if items.len() == 2)));
        assert_eq!(chunks.last(), Some(&RawChunk::Finish(FinishReason::ToolCalls)));
    }

    #[tokio::test]
    async fn test_citations_and_images() {
        let chunks = decode(&[
            json!({"type": "response.output_item.added", "item": {"type": "image_generation_call", "id": "ig_1"}}),
            json!({"type": "response.output_item.done", "item": {"type": "image_generation_call", "id": "ig_1", "result": "aGk="}}),
            json!({"type": "response.output_text.annotation.added", "annotation": {
                "type": "url_citation", "url": "https://example.com", "title": "Example"
            }}),
            json!({"type": "response.completed", "response": {"output": []}}),
        ])
        .await;

        assert_eq!(chunks[0], RawChunk::ImageCreated);
        assert_eq!(
            chunks[1],
            RawChunk::ImageComplete(vec![GeneratedImage::Base64 {
                data: "aGk=".to_string(),
                media_type: "image/png".to_string()
            }])
        );
        assert!(chunks.iter().any(|c| matches!(
            c,
            RawChunk::WebSearch { source: WebSearchSource::OpenAiResponse, results } if results[0].url == "https://example.com"
        )));
    }

    #[tokio::test]
    async fn test_failed_event() {
        let pieces = sse(&[json!({"type": "response.failed", "response": {"error": {"message": "quota"}}})]);
        let refs: Vec<&str> = pieces.iter().map(String::as_str).collect();
        let adapter = OpenAiResponsesAdapter::new(MockHttpClient::new().with_sse(TEST_URL, &refs));

        let items: Vec<_> = adapter.send(json!({}), &ctx(true)).await.unwrap().collect().await;
        assert!(matches!(&items[0], Err(DomainError::Provider { message, .. }) if message == "quota"));
    }

    #[tokio::test]
    async fn test_stream_cut_before_completed() {
        let pieces = sse(&[
            json!({"type": "response.created", "response": {}}),
            json!({"type": "response.output_text.delta", "delta": "Half"}),
        ]);
        let refs: Vec<&str> = pieces.iter().map(String::as_str).collect();
        let adapter = OpenAiResponsesAdapter::new(MockHttpClient::new().with_sse(TEST_URL, &refs));

        let items: Vec<_> = adapter.send(json!({}), &ctx(true)).await.unwrap().collect().await;

        assert_eq!(items.len(), 3);
        assert!(matches!(&items[1], Ok(RawChunk::TextDelta(text)) if text == "Half"));
        assert!(matches!(&items[2], Err(DomainError::Provider { message, .. }) if message.contains("response.completed")));
    }

    #[tokio::test]
    async fn test_non_streamed_body() {
        let client = MockHttpClient::new().with_response(
            TEST_URL,
            json!({
                "status": "completed",
                "output": [
                    {"type": "reasoning", "summary": [{"type": "summary_text", "text": "Think"}]},
                    {"type": "message", "content": [{"type": "output_text", "text": "Hi", "annotations": []}]}
                ],
                "usage": {"input_tokens": 3, "output_tokens": 2, "total_tokens": 5}
            }),
        );
        let adapter = OpenAiResponsesAdapter::new(client);

        let chunks: Vec<_> = adapter
            .send(json!({}), &ctx(false))
            .await
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await;
        assert_eq!(chunks[1], RawChunk::ReasoningDelta("Think".to_string()));
        assert_eq!(chunks[2], RawChunk::TextDelta("Hi".to_string()));
        assert_eq!(chunks.last(), Some(&RawChunk::Finish(FinishReason::Stop)));
    }

    #[test]
    fn test_request_shape() {
        let adapter = OpenAiResponsesAdapter::new(MockHttpClient::new());
        let mut plan = RequestPlan::new(Model::new("gpt-5", "openai"));
        plan.max_tokens = Some(1000);
        plan.web_search = true;
        plan.tools = vec![ToolDefinition::new("clock")];
        plan.reasoning = Some(ReasoningSettings {
            effort: ReasoningEffort::Low,
            budget_tokens: None,
            effort_param: true,
        });

        let conversation = adapter.build_conversation(Some("Be brief."), &[Message::user("hi")]);
        let body = adapter.build_request(&conversation, &plan);

        assert_eq!(body["instructions"], "Be brief.");
        assert_eq!(body["input"][0]["content"][0]["type"], "input_text");
        assert_eq!(body["max_output_tokens"], 1000);
        assert_eq!(body["reasoning"]["effort"], "low");
        assert_eq!(body["tools"][0]["name"], "clock");
        assert_eq!(body["tools"][1]["type"], "web_search_preview");
    }

    #[test]
    fn test_tool_round_replays_only_answered_calls() {
        let adapter = OpenAiResponsesAdapter::new(MockHttpClient::new());
        let mut conversation = adapter.build_conversation(None, &[Message::user("hi")]);

        let turn = AssistantTurn {
            tool_calls: vec![RawToolCall {
                id: "call_1".to_string(),
                name: "clock".to_string(),
                arguments: ToolArguments::parse("{}"),
            }],
            native_items: Some(vec![
                json!({"type": "reasoning", "id": "rs_1"}),
                json!({"type": "function_call", "call_id": "call_1", "name": "clock", "arguments": "{}"}),
                json!({"type": "function_call", "call_id": "call_2", "name": "unknown", "arguments": "{}"}),
            ]),
            ..Default::default()
        };
        let result = ToolCallResult {
            id: "call_1".to_string(),
            tool: ToolDefinition::new("clock"),
            arguments: ToolArguments::parse("{}"),
            status: ToolCallStatus::Success,
            output: ToolOutput::text("noon"),
        };
        adapter.append_tool_round(&mut conversation, &turn, &[result]);

        let kinds: Vec<&str> = conversation.items[1..]
            .iter()
            .map(|i| i["type"].as_str().unwrap())
            .collect();
        assert_eq!(kinds, vec!["reasoning", "function_call", "function_call_output"]);
        assert_eq!(conversation.items[3]["output"], "noon");
    }
}
