use std::fmt::Debug;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use super::{
    Citation, FinishReason, GeneratedImage, Message, RawToolCall, ToolCallResult, ToolDefinition,
    Usage, WebSearchSource,
};
use crate::domain::capability::ReasoningSettings;
use crate::domain::{DomainError, Model};

/// Stream of pre-chunks produced by a vendor adapter
pub type RawChunkStream = Pin<Box<dyn Stream<Item = Result<RawChunk, DomainError>> + Send>>;

/// Vendor-neutral event decoded from a vendor stream, before orchestration stamps timing
#[derive(Debug, Clone, PartialEq)]
pub enum RawChunk {
    /// Vendor acknowledged the request
    Created,
    TextDelta(String),
    /// Natively separated reasoning text
    ReasoningDelta(String),
    /// Completed tool calls (fragments already buffered and parsed)
    ToolCalls(Vec<RawToolCall>),
    WebSearch {
        results: Vec<Citation>,
        source: WebSearchSource,
    },
    ImageCreated,
    ImageComplete(Vec<GeneratedImage>),
    Usage(Usage),
    Finish(FinishReason),
    /// Vendor-native assistant output to replay verbatim when resubmitting
    NativeItems(Vec<Value>),
}

/// Wire protocol family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VendorKind {
    OpenAiChat,
    OpenAiResponses,
    Anthropic,
    Gemini,
}

/// Vendor-shaped conversation, owned by the orchestrator for one call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    pub system: Option<String>,
    pub items: Vec<Value>,
}

/// Everything an adapter needs to build one vendor request
#[derive(Debug, Clone)]
pub struct RequestPlan {
    pub model: Model,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
    pub stream: bool,
    pub reasoning: Option<ReasoningSettings>,
    /// Tools offered through native function calling
    pub tools: Vec<ToolDefinition>,
    pub web_search: bool,
    pub generate_image: bool,
    pub custom_parameters: Map<String, Value>,
}

impl RequestPlan {
    pub fn new(model: Model) -> Self {
        Self {
            model,
            temperature: None,
            top_p: None,
            max_tokens: None,
            stream: true,
            reasoning: None,
            tools: Vec::new(),
            web_search: false,
            generate_image: false,
            custom_parameters: Map::new(),
        }
    }

    pub fn model_id(&self) -> &str {
        self.model.id()
    }

    /// Merge caller-supplied parameters over the generated body
    pub fn apply_custom_parameters(&self, body: &mut Value) {
        if let Value::Object(map) = body {
            for (key, value) in &self.custom_parameters {
                map.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Per-request transport context
#[derive(Debug, Clone)]
pub struct SendContext {
    pub model_id: String,
    pub api_key: String,
    pub stream: bool,
    pub cancel: CancellationToken,
}

/// What the model produced in one round, as needed to fold a tool round back in
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssistantTurn {
    pub text: String,
    pub reasoning: String,
    pub tool_calls: Vec<RawToolCall>,
    pub native_items: Option<Vec<Value>>,
}

/// Strategy implemented once per vendor family
#[async_trait]
pub trait VendorAdapter: Send + Sync + Debug {
    fn vendor(&self) -> VendorKind;

    /// Name used in logs and errors
    fn provider_name(&self) -> &'static str;

    /// Whether reasoning may arrive inline in the text stream, wrapped in tags
    fn supports_tag_reasoning(&self) -> bool {
        false
    }

    /// Convert domain messages into the vendor conversation shape
    fn build_conversation(&self, system: Option<&str>, messages: &[Message]) -> Conversation;

    /// Append further domain messages (prompt-mode tool rounds)
    fn append_messages(&self, conversation: &mut Conversation, messages: &[Message]);

    /// Append the assistant's tool-call request and the tool results in vendor shape
    fn append_tool_round(
        &self,
        conversation: &mut Conversation,
        turn: &AssistantTurn,
        results: &[ToolCallResult],
    );

    fn build_request(&self, conversation: &Conversation, plan: &RequestPlan) -> Value;

    /// Issue the request and adapt the response into pre-chunks
    async fn send(&self, body: Value, ctx: &SendContext) -> Result<RawChunkStream, DomainError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use futures::stream::{self, StreamExt};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Scripted event of a mock round
    #[derive(Debug, Clone)]
    pub enum Scripted {
        Chunk(RawChunk),
        Delayed(u64, RawChunk),
        Fail(String),
        /// Never yields; used to exercise cancellation
        Hang,
    }

    /// Vendor adapter replaying one scripted stream per request
    #[derive(Debug)]
    pub struct MockVendorAdapter {
        rounds: Mutex<VecDeque<Vec<Scripted>>>,
        requests: Mutex<Vec<Value>>,
        api_keys: Mutex<Vec<String>>,
        tag_reasoning: bool,
        connect_error: Option<String>,
    }

    impl MockVendorAdapter {
        pub fn new() -> Self {
            Self {
                rounds: Mutex::new(VecDeque::new()),
                requests: Mutex::new(Vec::new()),
                api_keys: Mutex::new(Vec::new()),
                tag_reasoning: false,
                connect_error: None,
            }
        }

        pub fn with_round(self, events: Vec<Scripted>) -> Self {
            self.rounds.lock().unwrap().push_back(events);
            self
        }

        pub fn with_text_round(self, text: &str) -> Self {
            self.with_round(vec![
                Scripted::Chunk(RawChunk::TextDelta(text.to_string())),
                Scripted::Chunk(RawChunk::Usage(Usage::new(10, 5))),
                Scripted::Chunk(RawChunk::Finish(FinishReason::Stop)),
            ])
        }

        pub fn with_tag_reasoning(mut self) -> Self {
            self.tag_reasoning = true;
            self
        }

        pub fn with_connect_error(mut self, message: impl Into<String>) -> Self {
            self.connect_error = Some(message.into());
            self
        }

        pub fn requests(&self) -> Vec<Value> {
            self.requests.lock().unwrap().clone()
        }

        pub fn api_keys(&self) -> Vec<String> {
            self.api_keys.lock().unwrap().clone()
        }
    }

    fn message_item(message: &Message) -> Value {
        serde_json::json!({
            "role": message.role,
            "content": message.content_text(),
        })
    }

    #[async_trait]
    impl VendorAdapter for MockVendorAdapter {
        fn vendor(&self) -> VendorKind {
            VendorKind::OpenAiChat
        }

        fn provider_name(&self) -> &'static str {
            "mock"
        }

        fn supports_tag_reasoning(&self) -> bool {
            self.tag_reasoning
        }

        fn build_conversation(&self, system: Option<&str>, messages: &[Message]) -> Conversation {
            Conversation {
                system: system.map(str::to_string),
                items: messages.iter().map(message_item).collect(),
            }
        }

        fn append_messages(&self, conversation: &mut Conversation, messages: &[Message]) {
            conversation
                .items
                .extend(messages.iter().map(message_item));
        }

        fn append_tool_round(
            &self,
            conversation: &mut Conversation,
            turn: &AssistantTurn,
            results: &[ToolCallResult],
        ) {
            let calls: Vec<&str> = turn.tool_calls.iter().map(|c| c.name.as_str()).collect();
            conversation.items.push(serde_json::json!({
                "role": "assistant",
                "content": turn.text,
                "tool_calls": calls,
            }));
            for result in results {
                conversation.items.push(serde_json::json!({
                    "role": "tool",
                    "tool_call_id": result.id,
                    "content": result.output.to_text(),
                }));
            }
        }

        fn build_request(&self, conversation: &Conversation, plan: &RequestPlan) -> Value {
            let mut body = serde_json::json!({
                "model": plan.model_id(),
                "system": conversation.system,
                "messages": conversation.items,
                "stream": plan.stream,
                "tools": plan.tools.iter().map(|t| t.name.clone()).collect::<Vec<_>>(),
            });
            if let Some(reasoning) = &plan.reasoning {
                body["reasoning_effort"] = serde_json::json!(reasoning.effort);
            }
            plan.apply_custom_parameters(&mut body);
            body
        }

        async fn send(&self, body: Value, ctx: &SendContext) -> Result<RawChunkStream, DomainError> {
            self.requests.lock().unwrap().push(body);
            self.api_keys.lock().unwrap().push(ctx.api_key.clone());

            if let Some(message) = &self.connect_error {
                return Err(DomainError::transport("mock", message.clone()));
            }

            let events = self
                .rounds
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| DomainError::provider("mock", "No scripted round left"))?;

            let stream = stream::iter(events).then(|event| async move {
                match event {
                    Scripted::Chunk(chunk) => Ok(chunk),
                    Scripted::Delayed(ms, chunk) => {
                        tokio::time::sleep(Duration::from_millis(ms)).await;
                        Ok(chunk)
                    }
                    Scripted::Fail(message) => Err(DomainError::transport("mock", message)),
                    Scripted::Hang => futures::future::pending().await,
                }
            });

            Ok(Box::pin(stream))
        }
    }
}
