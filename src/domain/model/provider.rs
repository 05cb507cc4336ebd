//! Provider configuration as seen by the engine

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Wire protocol family a provider speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderType {
    /// OpenAI chat completions and compatible vendors
    #[serde(rename = "openai")]
    OpenAi,
    /// OpenAI responses API
    #[serde(rename = "openai-response")]
    OpenAiResponse,
    Anthropic,
    Gemini,
    /// Gateways that route each model family to its native protocol
    Aggregator,
}

/// A configured LLM provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(rename = "type")]
    pub provider_type: ProviderType,

    pub api_host: String,

    /// One or more API keys, comma separated
    #[serde(default)]
    pub api_key: String,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra_headers: HashMap<String, String>,
}

impl Provider {
    pub fn new(
        id: impl Into<String>,
        provider_type: ProviderType,
        api_host: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            provider_type,
            api_host: api_host.into(),
            api_key: String::new(),
            extra_headers: HashMap::new(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(name.into(), value.into());
        self
    }

    /// Individual keys from the comma-joined `api_key` field
    pub fn api_keys(&self) -> Vec<String> {
        self.api_key
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect()
    }
}
