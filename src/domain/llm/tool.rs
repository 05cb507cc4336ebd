//! Tool catalog, tool-call requests/results and the execution collaborator

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// A callable capability exposed to the model (typically an MCP tool)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema of the arguments object
    #[serde(default = "empty_object_schema")]
    pub input_schema: Value,
    /// MCP server the tool belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
}

fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            description: None,
            input_schema: empty_object_schema(),
            server_name: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server_name = Some(server.into());
        self
    }
}

/// Arguments of a tool call: parsed JSON, or the raw text when it did not parse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolArguments {
    Parsed(Value),
    Raw(String),
}

impl ToolArguments {
    /// Parse accumulated argument text. Never fails: malformed JSON is kept verbatim.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::Parsed(Value::Object(Default::default()));
        }

        match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => Self::Parsed(value),
            Err(e) => {
                tracing::debug!(error = %e, "Tool arguments are not valid JSON, passing raw text");
                Self::Raw(raw.to_string())
            }
        }
    }

    /// JSON value form (raw text becomes a JSON string)
    pub fn to_value(&self) -> Value {
        match self {
            Self::Parsed(value) => value.clone(),
            Self::Raw(raw) => Value::String(raw.clone()),
        }
    }

    /// Serialized form for vendors that carry arguments as a string
    pub fn to_json_string(&self) -> String {
        match self {
            Self::Parsed(value) => value.to_string(),
            Self::Raw(raw) => raw.clone(),
        }
    }
}

/// Tool call as decoded from a vendor response, before catalog resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawToolCall {
    pub id: String,
    pub name: String,
    pub arguments: ToolArguments,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallStatus {
    Pending,
    Success,
    Error,
}

/// A tool call resolved against the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub tool: ToolDefinition,
    pub arguments: ToolArguments,
    pub status: ToolCallStatus,
}

/// One content item of a tool's output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolContent {
    Text { text: String },
    Image { data: String, media_type: String },
}

/// What a tool returned
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ToolOutput {
    pub content: Vec<ToolContent>,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: message.into(),
            }],
            is_error: true,
        }
    }

    /// Text items joined; images are summarised since most vendors only take text results
    pub fn to_text(&self) -> String {
        self.content
            .iter()
            .map(|c| match c {
                ToolContent::Text { text } => text.clone(),
                ToolContent::Image { media_type, .. } => format!("[image: {}]", media_type),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Result of one executed tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub id: String,
    pub tool: ToolDefinition,
    pub arguments: ToolArguments,
    pub status: ToolCallStatus,
    pub output: ToolOutput,
}

impl ToolCallResult {
    pub fn is_error(&self) -> bool {
        self.status == ToolCallStatus::Error
    }
}

/// External tool-execution service
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(
        &self,
        tool: &ToolDefinition,
        arguments: &ToolArguments,
    ) -> Result<ToolOutput, DomainError>;
}

/// Find the catalog entry a raw call refers to, by name
pub fn resolve_tool<'a>(catalog: &'a [ToolDefinition], name: &str) -> Option<&'a ToolDefinition> {
    catalog
        .iter()
        .find(|t| t.name == name)
        .or_else(|| catalog.iter().find(|t| t.id == name))
}
