//! Completions engine: one provider, one vendor adapter, many calls

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::domain::capability::{classify, reasoning_settings};
use crate::domain::completions::{
    build_tool_system_prompt, filter_messages, AbortRegistry, CallSetup, CallSummary, CallTimer,
    ChunkSink, Emitter, ReasoningExtraction, TagPair, TagPairSelector, ToolOrchestrator,
    ToolUseMode, DEFAULT_MAX_TOOL_ROUNDS,
};
use crate::domain::llm::{validate_request_config, RequestPlan};
use crate::domain::{
    Chunk, DomainError, Message, Model, ModelCapability, Provider, RequestConfig,
    ToolDefinition, ToolExecutor, VendorAdapter,
};
use crate::infrastructure::llm::ApiKeyRing;
use crate::infrastructure::observability::{record_completion, record_tool_call, CompletionMetricParams};

const STREAM_BUFFER: usize = 64;
const CHECK_PROMPT: &str = "hi";

/// Engine-wide defaults
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_tool_rounds: usize,
    /// Used when the request does not set `max_tokens`
    pub default_max_tokens: Option<u32>,
    /// Used when the request does not set `context_count`
    pub default_context_count: usize,
    pub reasoning_extraction: ReasoningExtraction,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            default_max_tokens: None,
            default_context_count: 5,
            reasoning_extraction: ReasoningExtraction::Auto,
        }
    }
}

/// Receives the message window actually sent upstream
pub type FilterCallback = Box<dyn FnOnce(&[Message]) + Send>;

/// Input of one top-level call
pub struct CompletionsParams {
    pub messages: Vec<Message>,
    pub model: Model,
    pub config: RequestConfig,
    pub tools: Vec<ToolDefinition>,
    pub executor: Option<Arc<dyn ToolExecutor>>,
    pub on_filter_messages: Option<FilterCallback>,
}

impl CompletionsParams {
    pub fn new(model: Model, messages: Vec<Message>) -> Self {
        Self {
            messages,
            model,
            config: RequestConfig::default(),
            tools: Vec::new(),
            executor: None,
            on_filter_messages: None,
        }
    }

    pub fn with_config(mut self, config: RequestConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>, executor: Arc<dyn ToolExecutor>) -> Self {
        self.tools = tools;
        self.executor = Some(executor);
        self
    }

    pub fn on_filter_messages(mut self, callback: impl FnOnce(&[Message]) + Send + 'static) -> Self {
        self.on_filter_messages = Some(Box::new(callback));
        self
    }

    /// Calls are keyed by the id of the message that triggered them
    fn message_id(&self) -> String {
        self.messages
            .last()
            .map(|m| m.id.clone())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    }
}

/// Runs completions against one provider
#[derive(Debug)]
pub struct CompletionsEngine {
    adapter: Arc<dyn VendorAdapter>,
    provider: Provider,
    keys: ApiKeyRing,
    registry: Arc<AbortRegistry>,
    tag_pairs: TagPairSelector,
    config: EngineConfig,
}

impl CompletionsEngine {
    pub fn new(adapter: Arc<dyn VendorAdapter>, provider: Provider, registry: Arc<AbortRegistry>) -> Self {
        Self {
            keys: ApiKeyRing::from_provider(&provider),
            adapter,
            provider,
            registry,
            tag_pairs: TagPairSelector::default(),
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_tag_pairs(mut self, tag_pairs: TagPairSelector) -> Self {
        self.tag_pairs = tag_pairs;
        self
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    pub fn registry(&self) -> &Arc<AbortRegistry> {
        &self.registry
    }

    /// Run one call, delivering chunks to `sink`. Exactly one terminal chunk is emitted,
    /// whatever the outcome; the same outcome is returned.
    pub async fn completions(
        &self,
        params: CompletionsParams,
        sink: &mut dyn ChunkSink,
    ) -> Result<CallSummary, DomainError> {
        let started = Instant::now();
        let message_id = params.message_id();
        let model = params.model.clone();
        let guard = self.registry.guard(&message_id);

        info!(
            provider = %self.provider.id,
            model = %model.id(),
            message_id = %message_id,
            "Starting completion"
        );

        let mut metered = MeteredSink { inner: sink };
        let mut emitter = Emitter::new(&mut metered, guard.token().clone(), CallTimer::start());
        let result = self.run(params, &mut emitter).await;

        let terminal = match &result {
            Ok(summary) => Chunk::BlockComplete {
                text: summary.text.clone(),
                usage: summary.usage,
                metrics: emitter.metrics(&summary.usage),
            },
            Err(e) => Chunk::Error {
                message: e.to_string(),
                code: e.code(),
            },
        };
        if let Err(e) = emitter.emit_terminal(terminal).await {
            debug!(message_id = %message_id, error = %e, "Terminal chunk not delivered");
        }
        drop(guard);

        let (usage, requests) = match &result {
            Ok(summary) => (summary.usage, summary.requests),
            Err(_) => (Default::default(), 0),
        };
        record_completion(CompletionMetricParams {
            provider: self.adapter.provider_name(),
            model: model.id(),
            duration: started.elapsed(),
            error: result.as_ref().err().map(DomainError::code),
            usage: &usage,
            requests,
        });

        match &result {
            Ok(summary) => info!(
                provider = %self.provider.id,
                model = %model.id(),
                requests = summary.requests,
                total_tokens = summary.usage.total_tokens,
                duration_ms = started.elapsed().as_millis() as u64,
                "Completion finished"
            ),
            Err(e) if e.is_abort() => info!(
                provider = %self.provider.id,
                model = %model.id(),
                message_id = %message_id,
                "Completion aborted"
            ),
            Err(e) => warn!(
                provider = %self.provider.id,
                model = %model.id(),
                error = %e,
                "Completion failed"
            ),
        }

        result
    }

    /// Run one call on a spawned task, returning its chunks as a stream
    pub fn completions_stream(self: &Arc<Self>, params: CompletionsParams) -> ReceiverStream<Chunk> {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let engine = Arc::clone(self);

        tokio::spawn(async move {
            let mut tx = tx;
            // The outcome has already been delivered as the terminal chunk
            let _ = engine.completions(params, &mut tx).await;
        });

        ReceiverStream::new(rx)
    }

    /// Cancel every in-flight request of `message_id`
    pub fn abort(&self, message_id: &str) -> bool {
        self.registry.cancel(message_id)
    }

    /// Health check: one small non-streamed request that must produce text
    pub async fn check(&self, model: &Model) -> Result<(), DomainError> {
        let config = RequestConfig {
            stream_output: false,
            ..RequestConfig::default()
        };
        let params = CompletionsParams::new(model.clone(), vec![Message::user(CHECK_PROMPT)])
            .with_config(config);

        let mut chunks: Vec<Chunk> = Vec::new();
        let summary = self.completions(params, &mut chunks).await?;

        if summary.text.trim().is_empty() {
            return Err(DomainError::empty_response(format!(
                "Model {} returned no text",
                model.id()
            )));
        }
        Ok(())
    }

    async fn run(
        &self,
        params: CompletionsParams,
        emitter: &mut Emitter<'_>,
    ) -> Result<CallSummary, DomainError> {
        let CompletionsParams {
            messages,
            model,
            config,
            tools,
            executor,
            on_filter_messages,
        } = params;

        validate_request_config(&config).map_err(|e| DomainError::validation(e.to_string()))?;

        let context_count = config
            .context_count
            .unwrap_or(self.config.default_context_count);
        let filtered = filter_messages(config.prompt.as_deref(), &messages, Some(context_count))?;
        if let Some(callback) = on_filter_messages {
            callback(&filtered.messages);
        }

        let executor = executor.filter(|_| config.enable_tool_use && !tools.is_empty());
        let tools = if executor.is_some() { tools } else { Vec::new() };
        let mode = if classify(ModelCapability::FunctionCalling, &model, Some(&self.provider)) {
            ToolUseMode::Function
        } else {
            ToolUseMode::Prompt
        };

        let system = match mode {
            ToolUseMode::Prompt if !tools.is_empty() => {
                Some(build_tool_system_prompt(filtered.system.as_deref(), &tools))
            }
            _ => filtered.system,
        };

        let native_tools = match mode {
            ToolUseMode::Function => tools.clone(),
            ToolUseMode::Prompt => Vec::new(),
        };
        let plan = self.plan(&model, &config, native_tools);
        let reasoning_tags = self.reasoning_tags(&model);

        debug!(
            provider = %self.provider.id,
            model = %model.id(),
            messages = filtered.messages.len(),
            tools = tools.len(),
            mode = ?mode,
            tag_reasoning = reasoning_tags.is_some(),
            "Prepared request"
        );

        let setup = CallSetup {
            plan,
            api_key: self.keys.next()?,
            tools,
            mode,
            reasoning_tags,
        };
        let conversation = self
            .adapter
            .build_conversation(system.as_deref(), &filtered.messages);

        let mut orchestrator = ToolOrchestrator::new(Arc::clone(&self.adapter))
            .with_max_tool_rounds(self.config.max_tool_rounds);
        if let Some(executor) = executor {
            orchestrator = orchestrator.with_executor(executor);
        }

        orchestrator.run(conversation, &setup, emitter).await
    }

    fn plan(&self, model: &Model, config: &RequestConfig, tools: Vec<ToolDefinition>) -> RequestPlan {
        let provider = Some(&self.provider);
        let max_tokens = config.max_tokens.or(self.config.default_max_tokens);

        let mut plan = RequestPlan::new(model.clone());
        plan.temperature = config.temperature;
        plan.top_p = config.top_p;
        plan.max_tokens = max_tokens;
        plan.stream = config.stream_output;
        plan.reasoning = reasoning_settings(model, provider, config.reasoning_effort, max_tokens);
        plan.tools = tools;
        plan.web_search =
            config.enable_web_search && classify(ModelCapability::WebSearch, model, provider);
        plan.generate_image = config.enable_generate_image
            && classify(ModelCapability::ImageGeneration, model, provider);
        plan.custom_parameters = config.custom_parameters.clone();
        plan
    }

    fn reasoning_tags(&self, model: &Model) -> Option<TagPair> {
        let applies = match self.config.reasoning_extraction {
            ReasoningExtraction::Never => false,
            ReasoningExtraction::Always => true,
            ReasoningExtraction::Auto => {
                self.adapter.supports_tag_reasoning()
                    && classify(ModelCapability::Reasoning, model, Some(&self.provider))
            }
        };
        applies.then(|| self.tag_pairs.select(model.id()).clone())
    }
}

/// Counts tool-call outcomes on their way to the caller
struct MeteredSink<'a> {
    inner: &'a mut dyn ChunkSink,
}

#[async_trait]
impl<'a> ChunkSink for MeteredSink<'a> {
    async fn send(&mut self, chunk: Chunk) -> Result<(), DomainError> {
        if let Chunk::ToolCallComplete { results } = &chunk {
            for result in results {
                record_tool_call(&result.tool.name, result.status);
            }
        }
        self.inner.send(chunk).await
    }
}
