//! Domain layer - Core types and vendor-neutral logic

pub mod capability;
pub mod completions;
pub mod error;
pub mod llm;
pub mod model;

pub use error::{DomainError, ErrorCode};
pub use llm::{
    Chunk, ContentPart, FinishReason, Message, MessageRole, ReasoningEffort, RequestConfig,
    ToolDefinition, ToolExecutor, Usage, VendorAdapter, VendorKind,
};
pub use model::{CapabilityOverride, Model, ModelCapability, Provider, ProviderType};
