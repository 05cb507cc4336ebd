//! Observability infrastructure - completion and tool-call metrics

mod metrics;

pub use metrics::{record_completion, record_tool_call, CompletionMetricParams};
