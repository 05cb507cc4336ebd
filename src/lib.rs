//! pmp-llm-streaming
//!
//! One streaming contract over several LLM vendor APIs (OpenAI chat and responses,
//! Anthropic Messages, Google Gemini):
//! - capability classification of models
//! - per-vendor stream adapters over a shared SSE driver
//! - inline reasoning extraction and a bounded tool-call loop
//! - per-message cancellation and latency metrics

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
pub use infrastructure::llm::ProviderFactory;
pub use infrastructure::services::{CompletionsEngine, CompletionsParams, EngineConfig};
