//! Infrastructure services

mod completions_service;

pub use completions_service::{
    CompletionsEngine, CompletionsParams, EngineConfig, FilterCallback,
};
