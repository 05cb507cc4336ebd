//! Canonical streamed output events

use serde::{Deserialize, Serialize};

use super::{Metrics, ToolCallRequest, ToolCallResult, Usage};
use crate::domain::ErrorCode;

/// Where web-search citations came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebSearchSource {
    OpenAi,
    OpenAiResponse,
    Anthropic,
    Gemini,
    /// OpenAI-compatible vendors returning a top-level `citations` list
    Perplexity,
}

/// One cited web source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl Citation {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            content: None,
        }
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }
}

/// An image produced by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GeneratedImage {
    Base64 { data: String, media_type: String },
    Url { url: String },
}

/// A discrete unit of canonical streamed output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Chunk {
    ResponseCreated,
    TextDelta {
        text: String,
    },
    TextComplete {
        text: String,
    },
    ThinkingDelta {
        text: String,
        elapsed_ms: u64,
    },
    ThinkingComplete {
        text: String,
        elapsed_ms: u64,
    },
    ImageCreated,
    ImageComplete {
        images: Vec<GeneratedImage>,
    },
    WebSearchComplete {
        results: Vec<Citation>,
        source: WebSearchSource,
    },
    ToolCallPending {
        calls: Vec<ToolCallRequest>,
    },
    ToolCallComplete {
        results: Vec<ToolCallResult>,
    },
    BlockComplete {
        /// Answer text of the final round
        text: String,
        usage: Usage,
        metrics: Metrics,
    },
    Error {
        message: String,
        code: ErrorCode,
    },
}

impl Chunk {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::BlockComplete { .. } | Self::Error { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::ResponseCreated => "RESPONSE_CREATED",
            Self::TextDelta { .. } => "TEXT_DELTA",
            Self::TextComplete { .. } => "TEXT_COMPLETE",
            Self::ThinkingDelta { .. } => "THINKING_DELTA",
            Self::ThinkingComplete { .. } => "THINKING_COMPLETE",
            Self::ImageCreated => "IMAGE_CREATED",
            Self::ImageComplete { .. } => "IMAGE_COMPLETE",
            Self::WebSearchComplete { .. } => "WEB_SEARCH_COMPLETE",
            Self::ToolCallPending { .. } => "TOOL_CALL_PENDING",
            Self::ToolCallComplete { .. } => "TOOL_CALL_COMPLETE",
            Self::BlockComplete { .. } => "BLOCK_COMPLETE",
            Self::Error { .. } => "ERROR",
        }
    }
}
