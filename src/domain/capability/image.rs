//! Dedicated text-to-image models and chat models with inline image output

use once_cell::sync::Lazy;

use super::rules::{Rule, RuleTable};
use crate::domain::{Provider, ProviderType};

pub(super) static TEXT_TO_IMAGE_RULES: Lazy<RuleTable> = Lazy::new(|| {
    RuleTable::new(vec![
        // Chat models that emit images are classified separately
        Rule::deny("gemini-image-chat", r"^gemini-"),
        Rule::allow(
            "image-families",
            r"^dall-e|^gpt-image|flux|stable-diffusion|^sd3|sdxl|stabilityai|cogview|^imagen|midjourney|^mj-|kolors|wanx|seedream|^janus|playground-v|hunyuan-image|qwen-image|grok-\d+-image",
        ),
    ])
});

pub(super) static IMAGE_GENERATION_RULES: Lazy<RuleTable> = Lazy::new(|| {
    RuleTable::new(vec![
        Rule::allow("gemini-2.0-flash-exp", r"^gemini-2\.0-flash-exp$"),
        Rule::allow("gemini-image-generation", r"^gemini-.*-image"),
    ])
});

/// Models that can call the responses API `image_generation` tool
pub(super) static RESPONSES_IMAGE_TOOL_RULES: Lazy<RuleTable> = Lazy::new(|| {
    RuleTable::new(vec![
        Rule::deny("gpt-4.1-nano", r"^gpt-4\.1-nano"),
        Rule::deny("gpt-5-chat", r"^gpt-5(\.\d+)?-chat"),
        Rule::allow("responses-image-tool", r"^gpt-4o|^gpt-4\.1|^gpt-5|^o3$|^o3-"),
    ])
});

/// Inline image generation depends on the protocol the provider speaks
pub(super) fn provider_scoped(id: &str, provider: &Provider) -> Option<bool> {
    match provider.provider_type {
        ProviderType::OpenAiResponse => {
            Some(RESPONSES_IMAGE_TOOL_RULES.allows(id) || IMAGE_GENERATION_RULES.allows(id))
        }
        _ => None,
    }
}
