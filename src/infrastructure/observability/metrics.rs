//! Completion metrics through the `metrics` facade
//!
//! No recorder is installed here; embedding applications choose their own exporter.

use std::time::Duration;

use metrics::{counter, histogram};

use crate::domain::llm::ToolCallStatus;
use crate::domain::{ErrorCode, Usage};

/// Parameters for completion metrics
pub struct CompletionMetricParams<'a> {
    pub provider: &'a str,
    pub model: &'a str,
    pub duration: Duration,
    /// `None` on success
    pub error: Option<ErrorCode>,
    pub usage: &'a Usage,
    pub requests: usize,
}

impl CompletionMetricParams<'_> {
    fn status(&self) -> &'static str {
        match self.error {
            None => "success",
            Some(ErrorCode::Aborted) => "aborted",
            Some(_) => "error",
        }
    }
}

/// Record one finished top-level call
pub fn record_completion(params: CompletionMetricParams) {
    let labels = [
        ("provider", params.provider.to_string()),
        ("model", params.model.to_string()),
        ("status", params.status().to_string()),
    ];

    counter!("llm_completions_total", &labels).increment(1);
    histogram!("llm_completion_duration_seconds", &labels).record(params.duration.as_secs_f64());
    counter!("llm_requests_total", &labels).increment(params.requests as u64);

    if !params.usage.is_empty() {
        counter!("llm_input_tokens_total", &labels).increment(u64::from(params.usage.prompt_tokens));
        counter!("llm_output_tokens_total", &labels)
            .increment(u64::from(params.usage.completion_tokens));
    }

    if let Some(code) = params.error {
        let labels = [
            ("provider", params.provider.to_string()),
            ("code", code.as_str().to_string()),
        ];
        counter!("llm_errors_total", &labels).increment(1);
    }
}

/// Record the outcome of one executed tool call
pub fn record_tool_call(tool: &str, status: ToolCallStatus) {
    let status = match status {
        ToolCallStatus::Success => "success",
        ToolCallStatus::Error => "error",
        ToolCallStatus::Pending => "pending",
    };
    let labels = [("tool", tool.to_string()), ("status", status.to_string())];

    counter!("llm_tool_calls_total", &labels).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(error: Option<ErrorCode>, usage: &Usage) -> CompletionMetricParams<'_> {
        CompletionMetricParams {
            provider: "openai",
            model: "gpt-4o",
            duration: Duration::from_millis(120),
            error,
            usage,
            requests: 2,
        }
    }

    #[test]
    fn test_status_labels() {
        let usage = Usage::new(10, 5);
        assert_eq!(params(None, &usage).status(), "success");
        assert_eq!(params(Some(ErrorCode::Aborted), &usage).status(), "aborted");
        assert_eq!(params(Some(ErrorCode::Transport), &usage).status(), "error");
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        let usage = Usage::new(10, 5);
        record_completion(params(Some(ErrorCode::Provider), &usage));
        record_tool_call("weather", ToolCallStatus::Success);
    }
}
