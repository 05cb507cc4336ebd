//! Model domain - Model and provider configuration as consumed per request

mod entity;
mod provider;

pub use entity::{CapabilityOverride, Model, ModelCapability};
pub use provider::{Provider, ProviderType};
