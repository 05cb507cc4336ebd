use serde::{Deserialize, Serialize};

/// Reason why the generation finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
    Error,
}

impl FinishReason {
    /// Map the finish markers used by the supported vendors
    pub fn parse(reason: &str) -> Self {
        match reason {
            "stop" | "end_turn" | "stop_sequence" | "STOP" | "completed" => Self::Stop,
            "length" | "max_tokens" | "MAX_TOKENS" | "max_output_tokens" | "incomplete" => {
                Self::Length
            }
            "content_filter" | "SAFETY" | "RECITATION" | "PROHIBITED_CONTENT" | "refusal" => {
                Self::ContentFilter
            }
            "tool_calls" | "function_call" | "tool_use" => Self::ToolCalls,
            "error" | "failed" | "MALFORMED_FUNCTION_CALL" => Self::Error,
            _ => Self::Stop,
        }
    }
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    /// Accumulate another round's usage
    pub fn add(&mut self, other: &Usage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }

    pub fn is_empty(&self) -> bool {
        self.total_tokens == 0 && self.prompt_tokens == 0 && self.completion_tokens == 0
    }
}

/// Latency measurements attached to `BLOCK_COMPLETE`, in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    pub completion_tokens: u32,
    pub time_to_first_token_ms: u64,
    pub time_to_completion_ms: u64,
    pub time_thinking_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_calculation() {
        let usage = Usage::new(10, 20);
        assert_eq!(usage.total_tokens, 30);
    }

    #[test]
    fn test_usage_accumulation() {
        let mut total = Usage::default();
        assert!(total.is_empty());

        total.add(&Usage::new(10, 5));
        total.add(&Usage::new(20, 7));

        assert_eq!(total, Usage::new(30, 12));
    }

    #[test]
    fn test_finish_reason_parsing() {
        assert_eq!(FinishReason::parse("end_turn"), FinishReason::Stop);
        assert_eq!(FinishReason::parse("tool_use"), FinishReason::ToolCalls);
        assert_eq!(FinishReason::parse("MAX_TOKENS"), FinishReason::Length);
        assert_eq!(FinishReason::parse("SAFETY"), FinishReason::ContentFilter);
        assert_eq!(FinishReason::parse("something-new"), FinishReason::Stop);
    }
}
