//! LLM request/response contract shared by every vendor adapter

mod chunk;
mod message;
mod provider;
mod request;
mod response;
mod tool;
mod validation;

pub use chunk::{Chunk, Citation, GeneratedImage, WebSearchSource};
pub use message::{format_file_text, ContentPart, FileContent, Message, MessageRole};
pub use provider::{
    AssistantTurn, Conversation, RawChunk, RawChunkStream, RequestPlan, SendContext,
    VendorAdapter, VendorKind,
};
pub use request::{ReasoningEffort, RequestConfig, RequestConfigBuilder};
pub use response::{FinishReason, Metrics, Usage};
pub use tool::{
    resolve_tool, RawToolCall, ToolArguments, ToolCallRequest, ToolCallResult, ToolCallStatus,
    ToolContent, ToolDefinition, ToolExecutor, ToolOutput,
};
pub use validation::{
    validate_request_config, validate_temperature, validate_top_p, RequestValidationError,
};

#[cfg(test)]
pub use provider::mock::{MockVendorAdapter, Scripted};
#[cfg(test)]
pub use tool::MockToolExecutor;
