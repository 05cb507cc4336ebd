use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::completions::{
    ReasoningExtraction, TagPairSelector, TagRule, DEFAULT_MAX_TOOL_ROUNDS,
};
use crate::domain::{CapabilityOverride, DomainError, Model, Provider, ProviderType};
use crate::infrastructure::services::EngineConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub reasoning: ReasoningConfig,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub max_tool_rounds: usize,
    pub default_max_tokens: Option<u32>,
    pub default_context_count: usize,
    /// Connect timeout; streamed responses are never cut off
    pub request_timeout_secs: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            default_max_tokens: Some(4096),
            default_context_count: 5,
            request_timeout_secs: 30,
        }
    }
}

impl EngineSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReasoningConfig {
    pub extraction: ReasoningExtraction,
    /// Ordered `pattern -> tag pair` rules; first match wins, `<think>` otherwise
    pub tag_rules: Vec<TagRule>,
}

/// A provider entry of the config file
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    #[serde(default)]
    pub api_host: String,
    /// Comma-separated keys
    #[serde(default)]
    pub api_key: String,
    /// Environment variable holding the keys, read when `api_key` is empty
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub models: Vec<ModelConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<CapabilityOverride>,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn provider(&self, id: &str) -> Result<&ProviderConfig, DomainError> {
        self.providers
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| DomainError::not_found(format!("Provider {} is not configured", id)))
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_tool_rounds: self.engine.max_tool_rounds,
            default_max_tokens: self.engine.default_max_tokens,
            default_context_count: self.engine.default_context_count,
            reasoning_extraction: self.reasoning.extraction,
        }
    }

    pub fn tag_pairs(&self) -> Result<TagPairSelector, DomainError> {
        TagPairSelector::new(&self.reasoning.tag_rules)
    }
}

impl ProviderConfig {
    pub fn to_provider(&self) -> Provider {
        let api_key = match &self.api_key_env {
            Some(var) if self.api_key.trim().is_empty() => std::env::var(var).unwrap_or_default(),
            _ => self.api_key.clone(),
        };

        let mut provider = Provider::new(self.id.clone(), self.provider_type, self.api_host.clone())
            .with_api_key(api_key);
        if let Some(name) = &self.name {
            provider.name = name.clone();
        }
        for (name, value) in &self.headers {
            provider = provider.with_header(name.clone(), value.clone());
        }
        provider
    }

    /// The configured model with this id, or a bare model when it is not listed
    pub fn model(&self, id: &str) -> Model {
        let Some(config) = self.models.iter().find(|m| m.id == id) else {
            return Model::new(id, self.id.clone());
        };

        let mut model = Model::new(config.id.clone(), self.id.clone());
        if let Some(name) = &config.name {
            model = model.with_name(name.clone());
        }
        if let Some(group) = &config.group {
            model = model.with_group(group.clone());
        }
        for capability in &config.capabilities {
            model = model.with_capability(capability.clone());
        }
        model
    }
}
