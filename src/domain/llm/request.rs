use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How much hidden computation a reasoning-capable model may spend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    /// Thinking explicitly switched off
    None,
    Minimal,
    Low,
    Medium,
    High,
    /// Let the vendor decide (dynamic budget)
    Auto,
}

impl ReasoningEffort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Minimal => "minimal",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Auto => "auto",
        }
    }

    /// Share of the model's thinking-token range this effort maps to
    pub fn budget_ratio(&self) -> Option<f64> {
        match self {
            Self::None => Some(0.0),
            Self::Minimal | Self::Low => Some(0.05),
            Self::Medium => Some(0.5),
            Self::High => Some(0.8),
            Self::Auto => None,
        }
    }
}

impl std::str::FromStr for ReasoningEffort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(Self::None),
            "minimal" => Ok(Self::Minimal),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "auto" => Ok(Self::Auto),
            other => Err(format!("unknown reasoning effort '{}'", other)),
        }
    }
}

/// Per-call assistant settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestConfig {
    /// System prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<ReasoningEffort>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Number of previous messages kept in the window; `None` keeps all
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_count: Option<usize>,
    #[serde(default = "default_stream_output")]
    pub stream_output: bool,
    #[serde(default)]
    pub enable_tool_use: bool,
    #[serde(default)]
    pub enable_web_search: bool,
    #[serde(default)]
    pub enable_generate_image: bool,
    /// Merged verbatim into the vendor request body
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub custom_parameters: Map<String, Value>,
}

fn default_stream_output() -> bool {
    true
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            prompt: None,
            temperature: None,
            top_p: None,
            reasoning_effort: None,
            max_tokens: None,
            context_count: None,
            stream_output: true,
            enable_tool_use: false,
            enable_web_search: false,
            enable_generate_image: false,
            custom_parameters: Map::new(),
        }
    }
}

impl RequestConfig {
    pub fn builder() -> RequestConfigBuilder {
        RequestConfigBuilder::new()
    }
}

/// Builder for RequestConfig
#[derive(Debug, Default)]
pub struct RequestConfigBuilder {
    config: RequestConfig,
}

impl RequestConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.config.temperature = Some(temp);
        self
    }

    pub fn top_p(mut self, top_p: f32) -> Self {
        self.config.top_p = Some(top_p);
        self
    }

    pub fn reasoning_effort(mut self, effort: ReasoningEffort) -> Self {
        self.config.reasoning_effort = Some(effort);
        self
    }

    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.config.max_tokens = Some(tokens);
        self
    }

    pub fn context_count(mut self, count: usize) -> Self {
        self.config.context_count = Some(count);
        self
    }

    pub fn stream_output(mut self, stream: bool) -> Self {
        self.config.stream_output = stream;
        self
    }

    pub fn enable_tool_use(mut self, enabled: bool) -> Self {
        self.config.enable_tool_use = enabled;
        self
    }

    pub fn enable_web_search(mut self, enabled: bool) -> Self {
        self.config.enable_web_search = enabled;
        self
    }

    pub fn enable_generate_image(mut self, enabled: bool) -> Self {
        self.config.enable_generate_image = enabled;
        self
    }

    pub fn custom_parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.config.custom_parameters.insert(name.into(), value);
        self
    }

    pub fn build(self) -> RequestConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_config_builder() {
        let config = RequestConfig::builder()
            .prompt("You are a helpful assistant")
            .temperature(0.7)
            .max_tokens(100)
            .reasoning_effort(ReasoningEffort::High)
            .enable_tool_use(true)
            .custom_parameter("seed", serde_json::json!(42))
            .build();

        assert_eq!(config.prompt.as_deref(), Some("You are a helpful assistant"));
        assert_eq!(config.temperature, Some(0.7));
        assert_eq!(config.max_tokens, Some(100));
        assert_eq!(config.reasoning_effort, Some(ReasoningEffort::High));
        assert!(config.stream_output);
        assert!(config.enable_tool_use);
        assert!(!config.enable_web_search);
        assert_eq!(config.custom_parameters["seed"], 42);
    }

    #[test]
    fn test_stream_output_defaults_to_true_when_deserialized() {
        let config: RequestConfig = serde_json::from_str("{}").unwrap();
        assert!(config.stream_output);
        assert!(config.custom_parameters.is_empty());
    }

    #[test]
    fn test_reasoning_effort_parsing() {
        assert_eq!("HIGH".parse::<ReasoningEffort>(), Ok(ReasoningEffort::High));
        assert_eq!("off".parse::<ReasoningEffort>(), Ok(ReasoningEffort::None));
        assert!("extreme".parse::<ReasoningEffort>().is_err());
    }

    #[test]
    fn test_budget_ratio() {
        assert_eq!(ReasoningEffort::Medium.budget_ratio(), Some(0.5));
        assert_eq!(ReasoningEffort::Auto.budget_ratio(), None);
    }
}
