//! Model entity and capability overrides

use serde::{Deserialize, Serialize};

/// Feature kinds the capability classifier decides on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelCapability {
    Embedding,
    Rerank,
    Vision,
    Reasoning,
    FunctionCalling,
    WebSearch,
    /// Dedicated image models (DALL-E, Flux, ...) that cannot chat
    TextToImage,
    /// Chat models that can emit images inline with text
    ImageGeneration,
}

impl ModelCapability {
    pub const ALL: [ModelCapability; 8] = [
        ModelCapability::Embedding,
        ModelCapability::Rerank,
        ModelCapability::Vision,
        ModelCapability::Reasoning,
        ModelCapability::FunctionCalling,
        ModelCapability::WebSearch,
        ModelCapability::TextToImage,
        ModelCapability::ImageGeneration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Embedding => "embedding",
            Self::Rerank => "rerank",
            Self::Vision => "vision",
            Self::Reasoning => "reasoning",
            Self::FunctionCalling => "function_calling",
            Self::WebSearch => "web_search",
            Self::TextToImage => "text_to_image",
            Self::ImageGeneration => "image_generation",
        }
    }
}

impl std::fmt::Display for ModelCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability entry attached to a model by configuration.
///
/// Only entries with `is_user_selected` set are treated as overrides; an entry without
/// it is informational (for example a capability reported by the vendor's model list).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityOverride {
    #[serde(rename = "type")]
    pub kind: ModelCapability,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_user_selected: Option<bool>,
}

impl CapabilityOverride {
    pub fn enabled(kind: ModelCapability) -> Self {
        Self {
            kind,
            is_user_selected: Some(true),
        }
    }

    pub fn disabled(kind: ModelCapability) -> Self {
        Self {
            kind,
            is_user_selected: Some(false),
        }
    }
}

/// A model as configured for a provider. Immutable for the duration of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// Vendor machine id (e.g. "gpt-4o", "anthropic/claude-sonnet-4")
    id: String,

    /// Human display name
    name: String,

    /// Owning provider id
    provider: String,

    #[serde(default)]
    group: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    capabilities: Vec<CapabilityOverride>,
}

impl Model {
    pub fn new(id: impl Into<String>, provider: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            group: String::new(),
            id,
            provider: provider.into(),
            capabilities: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn with_capability(mut self, capability: CapabilityOverride) -> Self {
        self.capabilities.retain(|c| c.kind != capability.kind);
        self.capabilities.push(capability);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn capabilities(&self) -> &[CapabilityOverride] {
        &self.capabilities
    }

    /// The user's explicit decision for a capability, if any
    pub fn user_override(&self, kind: ModelCapability) -> Option<bool> {
        self.capabilities
            .iter()
            .find(|c| c.kind == kind)
            .and_then(|c| c.is_user_selected)
    }
}
