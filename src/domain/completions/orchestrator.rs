//! Tool-call loop
//!
//! Sends the conversation, streams the round, and when the model asks for tools resolves
//! them against the catalog, runs them concurrently, folds request and results back into
//! the conversation and resubmits. Stops when a round has no (resolvable) tool calls.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use super::reasoning::{TagExtractor, TagPair};
use super::round::{Emitter, RoundProcessor};
use super::tool_prompt::{parse_tool_uses, tool_results_message};
use crate::domain::llm::{
    resolve_tool, Chunk, Conversation, Message, RawToolCall, RequestPlan, SendContext,
    ToolCallRequest, ToolCallResult, ToolCallStatus, ToolDefinition, ToolExecutor, ToolOutput,
    Usage, VendorAdapter,
};
use crate::domain::DomainError;

/// Default bound on tool rounds per call
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 20;

/// How tools are offered to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolUseMode {
    /// Native function calling
    Function,
    /// Tools described in the system prompt, calls parsed from markup
    Prompt,
}

/// Everything fixed for the duration of one call
#[derive(Debug, Clone)]
pub struct CallSetup {
    pub plan: RequestPlan,
    pub api_key: String,
    /// Tool catalog; empty disables the loop
    pub tools: Vec<ToolDefinition>,
    pub mode: ToolUseMode,
    /// Tag pair for inline reasoning, when extraction applies
    pub reasoning_tags: Option<TagPair>,
}

/// Result of a finished call
#[derive(Debug, Clone, PartialEq)]
pub struct CallSummary {
    /// Answer text of the final round
    pub text: String,
    /// Usage summed over all rounds
    pub usage: Usage,
    pub requests: usize,
}

#[derive(Clone)]
pub struct ToolOrchestrator {
    adapter: Arc<dyn VendorAdapter>,
    executor: Option<Arc<dyn ToolExecutor>>,
    max_tool_rounds: usize,
}

impl ToolOrchestrator {
    pub fn new(adapter: Arc<dyn VendorAdapter>) -> Self {
        Self {
            adapter,
            executor: None,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    pub fn with_executor(mut self, executor: Arc<dyn ToolExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn with_max_tool_rounds(mut self, max_tool_rounds: usize) -> Self {
        self.max_tool_rounds = max_tool_rounds;
        self
    }

    pub async fn run(
        &self,
        mut conversation: Conversation,
        setup: &CallSetup,
        emitter: &mut Emitter<'_>,
    ) -> Result<CallSummary, DomainError> {
        let provider = self.adapter.provider_name();
        let model = setup.plan.model_id().to_string();
        let tools_enabled = self.executor.is_some() && !setup.tools.is_empty();
        let mut usage = Usage::default();
        let mut tool_rounds = 0;

        loop {
            let request = tool_rounds + 1;
            let body = self.adapter.build_request(&conversation, &setup.plan);
            debug!(provider = %provider, model = %model, request = request, "Sending request");

            let outcome = self.send_round(body, setup, emitter, tools_enabled).await?;
            if let Some(round_usage) = &outcome.usage {
                usage.add(round_usage);
            }

            let finished = CallSummary {
                text: outcome.text.clone(),
                usage,
                requests: request,
            };

            if !tools_enabled {
                return Ok(finished);
            }

            let raw_calls = match setup.mode {
                ToolUseMode::Function => outcome.tool_calls.clone(),
                ToolUseMode::Prompt => parse_tool_uses(&outcome.answer_raw, tool_rounds),
            };
            if raw_calls.is_empty() {
                return Ok(finished);
            }

            let resolved = resolve_calls(&setup.tools, raw_calls);
            if resolved.is_empty() {
                return Ok(finished);
            }

            if tool_rounds >= self.max_tool_rounds {
                warn!(
                    provider = %provider,
                    model = %model,
                    limit = self.max_tool_rounds,
                    "Tool round limit reached"
                );
                return Err(DomainError::ToolRoundLimit {
                    limit: self.max_tool_rounds,
                });
            }

            let requests: Vec<ToolCallRequest> = resolved
                .iter()
                .map(|(call, tool)| ToolCallRequest {
                    id: call.id.clone(),
                    tool: tool.clone(),
                    arguments: call.arguments.clone(),
                    status: ToolCallStatus::Pending,
                })
                .collect();
            emitter
                .emit(Chunk::ToolCallPending {
                    calls: requests.clone(),
                })
                .await?;

            info!(
                provider = %provider,
                model = %model,
                round = tool_rounds + 1,
                tools = requests.len(),
                "Executing tool calls"
            );
            let results = self.execute_all(requests, emitter).await?;
            emitter
                .emit(Chunk::ToolCallComplete {
                    results: results.clone(),
                })
                .await?;

            match setup.mode {
                ToolUseMode::Function => {
                    let answered = resolved.into_iter().map(|(call, _)| call).collect();
                    let turn = outcome.assistant_turn(answered);
                    self.adapter
                        .append_tool_round(&mut conversation, &turn, &results);
                }
                ToolUseMode::Prompt => {
                    let messages = [
                        Message::assistant(outcome.answer_raw.clone()),
                        tool_results_message(&results),
                    ];
                    self.adapter.append_messages(&mut conversation, &messages);
                }
            }

            tool_rounds += 1;
        }
    }

    async fn send_round(
        &self,
        body: serde_json::Value,
        setup: &CallSetup,
        emitter: &mut Emitter<'_>,
        tools_enabled: bool,
    ) -> Result<super::round::RoundOutcome, DomainError> {
        emitter.check_cancelled()?;
        let cancel = emitter.cancel_token().clone();
        let ctx = SendContext {
            model_id: setup.plan.model_id().to_string(),
            api_key: setup.api_key.clone(),
            stream: setup.plan.stream,
            cancel: cancel.clone(),
        };

        let stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DomainError::aborted("Request aborted")),
            result = self.adapter.send(body, &ctx) => result?,
        };

        let reasoning = setup.reasoning_tags.clone().map(TagExtractor::new);
        let tool_markup = (tools_enabled && setup.mode == ToolUseMode::Prompt)
            .then(|| TagExtractor::new(TagPair::tool_use()));

        RoundProcessor::new(reasoning, tool_markup)
            .run(stream, emitter)
            .await
    }

    async fn execute_all(
        &self,
        requests: Vec<ToolCallRequest>,
        emitter: &mut Emitter<'_>,
    ) -> Result<Vec<ToolCallResult>, DomainError> {
        let Some(executor) = self.executor.as_ref() else {
            return Ok(Vec::new());
        };

        let runs = requests
            .into_iter()
            .map(|request| execute_one(Arc::clone(executor), request));

        let cancel = emitter.cancel_token().clone();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(DomainError::aborted("Request aborted")),
            results = join_all(runs) => Ok(results),
        }
    }
}

impl std::fmt::Debug for ToolOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolOrchestrator")
            .field("adapter", &self.adapter)
            .field("has_executor", &self.executor.is_some())
            .field("max_tool_rounds", &self.max_tool_rounds)
            .finish()
    }
}

/// Pair raw calls with catalog entries, dropping unknown tools
fn resolve_calls(
    catalog: &[ToolDefinition],
    calls: Vec<RawToolCall>,
) -> Vec<(RawToolCall, ToolDefinition)> {
    calls
        .into_iter()
        .filter_map(|call| match resolve_tool(catalog, &call.name) {
            Some(tool) => Some((call, tool.clone())),
            None => {
                warn!(tool = %call.name, "Model called an unknown tool, ignoring");
                None
            }
        })
        .collect()
}

async fn execute_one(executor: Arc<dyn ToolExecutor>, request: ToolCallRequest) -> ToolCallResult {
    let (status, output) = match executor.execute(&request.tool, &request.arguments).await {
        Ok(output) if output.is_error => (ToolCallStatus::Error, output),
        Ok(output) => (ToolCallStatus::Success, output),
        Err(e) => {
            warn!(tool = %request.tool.name, error = %e, "Tool execution failed");
            (
                ToolCallStatus::Error,
                ToolOutput::error(format!("Error executing tool {}: {}", request.tool.name, e)),
            )
        }
    };

    ToolCallResult {
        id: request.id,
        tool: request.tool,
        arguments: request.arguments,
        status,
        output,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::completions::metrics::CallTimer;
    use crate::domain::llm::{
        FinishReason, MockToolExecutor, MockVendorAdapter, RawChunk, Scripted, ToolArguments,
    };
    use crate::domain::Model;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Barrier;
    use tokio_util::sync::CancellationToken;

    fn tool_call_round(calls: &[(&str, &str)]) -> Vec<Scripted> {
        let calls = calls
            .iter()
            .enumerate()
            .map(|(i, (name, args))| RawToolCall {
                id: format!("call_{}", i),
                name: name.to_string(),
                arguments: ToolArguments::parse(args),
            })
            .collect();
        vec![
            Scripted::Chunk(RawChunk::ToolCalls(calls)),
            Scripted::Chunk(RawChunk::Usage(Usage::new(10, 2))),
            Scripted::Chunk(RawChunk::Finish(FinishReason::ToolCalls)),
        ]
    }

    fn setup(tools: Vec<ToolDefinition>, mode: ToolUseMode) -> CallSetup {
        CallSetup {
            plan: RequestPlan::new(Model::new("test-model", "mock")),
            api_key: "sk-test".to_string(),
            tools,
            mode,
            reasoning_tags: None,
        }
    }

    fn echo_executor() -> Arc<dyn ToolExecutor> {
        let mut executor = MockToolExecutor::new();
        executor
            .expect_execute()
            .returning(|tool, _| Ok(ToolOutput::text(format!("{} done", tool.name))));
        Arc::new(executor)
    }

    async fn run(
        orchestrator: &ToolOrchestrator,
        setup: &CallSetup,
        cancel: CancellationToken,
    ) -> (Result<CallSummary, DomainError>, Vec<Chunk>) {
        let mut sink: Vec<Chunk> = Vec::new();
        let result = {
            let mut emitter = Emitter::new(&mut sink, cancel, CallTimer::start());
            let conversation = Conversation {
                system: None,
                items: vec![serde_json::json!({"role": "user", "content": "hi"})],
            };
            orchestrator.run(conversation, setup, &mut emitter).await
        };
        (result, sink)
    }

    #[tokio::test]
    async fn test_no_tool_calls_single_request() {
        let adapter = Arc::new(MockVendorAdapter::new().with_text_round("Hello"));
        let orchestrator = ToolOrchestrator::new(adapter.clone()).with_executor(echo_executor());

        let (result, chunks) = run(
            &orchestrator,
            &setup(vec![ToolDefinition::new("clock")], ToolUseMode::Function),
            CancellationToken::new(),
        )
        .await;

        let summary = result.unwrap();
        assert_eq!(summary.text, "Hello");
        assert_eq!(summary.requests, 1);
        assert_eq!(adapter.requests().len(), 1);
        assert!(chunks.iter().all(|c| !c.is_terminal()));
    }

    #[tokio::test]
    async fn test_tool_rounds_terminate_with_final_text() {
        let adapter = Arc::new(
            MockVendorAdapter::new()
                .with_round(tool_call_round(&[("clock", "{}")]))
                .with_round(tool_call_round(&[("weather", r#"{"city":"Oslo"}"#)]))
                .with_text_round("It is noon and sunny."),
        );
        let orchestrator = ToolOrchestrator::new(adapter.clone()).with_executor(echo_executor());
        let tools = vec![ToolDefinition::new("clock"), ToolDefinition::new("weather")];

        let (result, chunks) = run(
            &orchestrator,
            &setup(tools, ToolUseMode::Function),
            CancellationToken::new(),
        )
        .await;

        let summary = result.unwrap();
        assert_eq!(adapter.requests().len(), 3);
        assert_eq!(summary.requests, 3);
        assert_eq!(summary.text, "It is noon and sunny.");
        assert_eq!(summary.usage, Usage::new(30, 9));

        let pending = chunks.iter().filter(|c| c.kind() == "TOOL_CALL_PENDING").count();
        let complete = chunks.iter().filter(|c| c.kind() == "TOOL_CALL_COMPLETE").count();
        assert_eq!((pending, complete), (2, 2));

        // Each resubmission carries the previous round's results
        let last = &adapter.requests()[2];
        let tool_messages = last["messages"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|m| m["role"] == "tool")
            .count();
        assert_eq!(tool_messages, 2);
    }

    #[tokio::test]
    async fn test_unknown_tools_are_dropped() {
        let adapter = Arc::new(
            MockVendorAdapter::new()
                .with_round(tool_call_round(&[("missing", "{}"), ("clock", "{}")]))
                .with_text_round("done"),
        );
        let orchestrator = ToolOrchestrator::new(adapter.clone()).with_executor(echo_executor());

        let (result, chunks) = run(
            &orchestrator,
            &setup(vec![ToolDefinition::new("clock")], ToolUseMode::Function),
            CancellationToken::new(),
        )
        .await;

        assert!(result.is_ok());
        let pending = chunks
            .iter()
            .find_map(|c| match c {
                Chunk::ToolCallPending { calls } => Some(calls.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].tool.name, "clock");
    }

    #[tokio::test]
    async fn test_only_unknown_tools_finishes() {
        let adapter = Arc::new(MockVendorAdapter::new().with_round(tool_call_round(&[("missing", "{}")])));
        let orchestrator = ToolOrchestrator::new(adapter.clone()).with_executor(echo_executor());

        let (result, _) = run(
            &orchestrator,
            &setup(vec![ToolDefinition::new("clock")], ToolUseMode::Function),
            CancellationToken::new(),
        )
        .await;

        assert_eq!(result.unwrap().requests, 1);
        assert_eq!(adapter.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_failing_tool_becomes_error_result() {
        let adapter = Arc::new(
            MockVendorAdapter::new()
                .with_round(tool_call_round(&[("clock", "{}")]))
                .with_text_round("sorry"),
        );
        let mut executor = MockToolExecutor::new();
        executor
            .expect_execute()
            .returning(|tool, _| Err(DomainError::tool_execution(&tool.name, "offline")));
        let orchestrator = ToolOrchestrator::new(adapter.clone()).with_executor(Arc::new(executor));

        let (result, chunks) = run(
            &orchestrator,
            &setup(vec![ToolDefinition::new("clock")], ToolUseMode::Function),
            CancellationToken::new(),
        )
        .await;

        assert_eq!(result.unwrap().text, "sorry");
        let results = chunks
            .iter()
            .find_map(|c| match c {
                Chunk::ToolCallComplete { results } => Some(results.clone()),
                _ => None,
            })
            .unwrap();
        assert!(results[0].is_error());
        assert!(results[0].output.to_text().starts_with("Error executing tool clock"));
    }

    #[tokio::test]
    async fn test_round_limit() {
        let adapter = Arc::new(
            MockVendorAdapter::new()
                .with_round(tool_call_round(&[("clock", "{}")]))
                .with_round(tool_call_round(&[("clock", "{}")]))
                .with_round(tool_call_round(&[("clock", "{}")])),
        );
        let orchestrator = ToolOrchestrator::new(adapter.clone())
            .with_executor(echo_executor())
            .with_max_tool_rounds(2);

        let (result, _) = run(
            &orchestrator,
            &setup(vec![ToolDefinition::new("clock")], ToolUseMode::Function),
            CancellationToken::new(),
        )
        .await;

        assert!(matches!(result, Err(DomainError::ToolRoundLimit { limit: 2 })));
        assert_eq!(adapter.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_prompt_mode_parses_markup() {
        let adapter = Arc::new(
            MockVendorAdapter::new()
                .with_round(vec![Scripted::Chunk(RawChunk::TextDelta(
                    "Let me look.<tool_use><name>clock</name><arguments>{}</arguments></tool_use>"
                        .to_string(),
                ))])
                .with_text_round("Noon."),
        );
        let orchestrator = ToolOrchestrator::new(adapter.clone()).with_executor(echo_executor());

        let (result, chunks) = run(
            &orchestrator,
            &setup(vec![ToolDefinition::new("clock")], ToolUseMode::Prompt),
            CancellationToken::new(),
        )
        .await;

        assert_eq!(result.unwrap().text, "Noon.");
        let visible: String = chunks
            .iter()
            .filter_map(|c| match c {
                Chunk::TextDelta { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(visible, "Let me look.Noon.");

        let second = &adapter.requests()[1];
        let last_message = second["messages"].as_array().unwrap().last().unwrap().clone();
        assert_eq!(last_message["role"], "user");
        assert!(last_message["content"]
            .as_str()
            .unwrap()
            .contains("<result>clock done</result>"));
    }

    struct BarrierExecutor {
        barrier: Barrier,
    }

    #[async_trait]
    impl ToolExecutor for BarrierExecutor {
        async fn execute(
            &self,
            tool: &ToolDefinition,
            _arguments: &ToolArguments,
        ) -> Result<ToolOutput, DomainError> {
            self.barrier.wait().await;
            Ok(ToolOutput::text(tool.name.clone()))
        }
    }

    #[tokio::test]
    async fn test_tools_run_concurrently() {
        let adapter = Arc::new(
            MockVendorAdapter::new()
                .with_round(tool_call_round(&[("a", "{}"), ("b", "{}"), ("c", "{}")]))
                .with_text_round("all done"),
        );
        let executor = Arc::new(BarrierExecutor {
            barrier: Barrier::new(3),
        });
        let orchestrator = ToolOrchestrator::new(adapter).with_executor(executor);
        let tools = vec![
            ToolDefinition::new("a"),
            ToolDefinition::new("b"),
            ToolDefinition::new("c"),
        ];

        // Sequential execution would never get past the barrier
        let (result, _) = tokio::time::timeout(
            Duration::from_secs(5),
            run(
                &orchestrator,
                &setup(tools, ToolUseMode::Function),
                CancellationToken::new(),
            ),
        )
        .await
        .expect("tool calls should run concurrently");

        assert_eq!(result.unwrap().text, "all done");
    }

    #[tokio::test]
    async fn test_cancel_mid_stream() {
        let adapter = Arc::new(MockVendorAdapter::new().with_round(vec![
            Scripted::Chunk(RawChunk::TextDelta("partial".to_string())),
            Scripted::Hang,
        ]));
        let orchestrator = ToolOrchestrator::new(adapter);
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let (result, chunks) = run(&orchestrator, &setup(vec![], ToolUseMode::Function), token).await;

        assert!(result.unwrap_err().is_abort());
        assert_eq!(
            chunks,
            vec![
                Chunk::ResponseCreated,
                Chunk::TextDelta {
                    text: "partial".to_string()
                }
            ]
        );
    }
}
