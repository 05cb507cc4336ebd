use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core domain errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Transport error: {provider} - {message}")]
    Transport {
        provider: String,
        message: String,
        status: Option<u16>,
    },

    #[error("Provider error: {provider} - {message}")]
    Provider { provider: String, message: String },

    #[error("Request aborted: {message}")]
    Aborted { message: String },

    #[error("Tool execution failed: {tool} - {message}")]
    ToolExecution { tool: String, message: String },

    #[error("Empty response: {message}")]
    EmptyResponse { message: String },

    #[error("Tool call round limit of {limit} exceeded")]
    ToolRoundLimit { limit: usize },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn transport(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            provider: provider.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn http_status(provider: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::Transport {
            provider: provider.into(),
            message: format!("HTTP {}: {}", status, body.into()),
            status: Some(status),
        }
    }

    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn aborted(message: impl Into<String>) -> Self {
        Self::Aborted {
            message: message.into(),
        }
    }

    pub fn tool_execution(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn empty_response(message: impl Into<String>) -> Self {
        Self::EmptyResponse {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Caller-initiated cancellation, as opposed to a failure
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::Validation { .. } => ErrorCode::Validation,
            Self::Configuration { .. } => ErrorCode::Configuration,
            Self::Transport { .. } => ErrorCode::Transport,
            Self::Provider { .. } => ErrorCode::Provider,
            Self::Aborted { .. } => ErrorCode::Aborted,
            Self::ToolExecution { .. } => ErrorCode::ToolExecution,
            Self::EmptyResponse { .. } => ErrorCode::EmptyResponse,
            Self::ToolRoundLimit { .. } => ErrorCode::ToolRoundLimit,
            Self::Internal { .. } => ErrorCode::Internal,
        }
    }
}

/// Machine-readable error code carried by `ERROR` chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    Validation,
    Configuration,
    Transport,
    Provider,
    Aborted,
    ToolExecution,
    EmptyResponse,
    ToolRoundLimit,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Validation => "validation",
            Self::Configuration => "configuration",
            Self::Transport => "transport",
            Self::Provider => "provider",
            Self::Aborted => "aborted",
            Self::ToolExecution => "tool_execution",
            Self::EmptyResponse => "empty_response",
            Self::ToolRoundLimit => "tool_round_limit",
            Self::Internal => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error() {
        let error = DomainError::http_status("openai", 401, "invalid key");
        assert_eq!(
            error.to_string(),
            "Transport error: openai - HTTP 401: invalid key"
        );
        assert_eq!(error.code(), ErrorCode::Transport);
    }

    #[test]
    fn test_abort_is_distinguished() {
        let error = DomainError::aborted("user cancelled");
        assert!(error.is_abort());
        assert_eq!(error.code(), ErrorCode::Aborted);

        assert!(!DomainError::transport("gemini", "connection reset").is_abort());
    }

    #[test]
    fn test_round_limit_message() {
        let error = DomainError::ToolRoundLimit { limit: 3 };
        assert_eq!(error.to_string(), "Tool call round limit of 3 exceeded");
        assert_eq!(
            serde_json::to_string(&error.code()).unwrap(),
            "\"tool_round_limit\""
        );
    }
}
