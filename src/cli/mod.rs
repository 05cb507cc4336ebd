//! CLI module for pmp-llm-streaming
//!
//! Subcommands:
//! - `chat`: one streamed completion against a configured provider
//! - `capabilities`: classifier report for a model id

pub mod capabilities;
pub mod chat;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::domain::completions::AbortRegistry;
use crate::domain::DomainError;
use crate::infrastructure::llm::{HttpClient, ProviderFactory};
use crate::infrastructure::logging;

/// Stream completions from OpenAI, Anthropic and Gemini style APIs through one contract
#[derive(Parser)]
#[command(name = "pmp-llm-streaming")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run one streamed completion
    Chat(chat::ChatArgs),

    /// Show what the classifier decides for a model
    Capabilities(capabilities::CapabilitiesArgs),
}

/// Load `.env` and the layered config, then install logging
fn bootstrap() -> AppConfig {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().unwrap_or_default();
    logging::init_logging(&config.logging);
    config
}

fn provider_factory(config: &AppConfig) -> Result<ProviderFactory, DomainError> {
    let client = HttpClient::with_connect_timeout(config.engine.connect_timeout())?;

    Ok(ProviderFactory::with_client(client, Arc::new(AbortRegistry::new()))
        .with_engine_config(config.engine_config())
        .with_tag_pairs(config.tag_pairs()?))
}
