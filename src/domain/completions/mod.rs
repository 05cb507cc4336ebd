//! Completion orchestration - context selection, reasoning extraction, tool loop, aborts

mod abort;
mod context;
mod metrics;
mod orchestrator;
mod reasoning;
mod round;
mod sink;
mod tool_prompt;

pub use abort::{AbortGuard, AbortRegistry};
pub use context::{filter_messages, FilteredContext};
pub use metrics::CallTimer;
pub use orchestrator::{CallSetup, CallSummary, ToolOrchestrator, ToolUseMode, DEFAULT_MAX_TOOL_ROUNDS};
pub use reasoning::{
    ReasoningExtraction, TagExtractor, TagPair, TagPairSelector, TagRule, TagSegment,
};
pub use round::{Emitter, RoundOutcome, RoundProcessor};
pub use sink::{CallbackSink, ChunkSink};
pub use tool_prompt::{build_tool_system_prompt, parse_tool_uses, tool_results_message};
