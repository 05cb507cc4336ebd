//! Infrastructure layer - vendor transports, engine services, logging and metrics

pub mod llm;
pub mod logging;
pub mod observability;
pub mod services;
