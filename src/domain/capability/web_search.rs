//! Built-in web search, scoped by the protocol the provider speaks

use once_cell::sync::Lazy;

use super::rules::{Rule, RuleTable};
use crate::domain::{Provider, ProviderType};

/// Models that search on their own regardless of provider
pub(super) static WEB_SEARCH_RULES: Lazy<RuleTable> = Lazy::new(|| {
    RuleTable::new(vec![
        Rule::allow("perplexity", r"^sonar"),
        Rule::allow("openai-search", r"^gpt-4o-(mini-)?search-preview|^gpt-5-search-api"),
    ])
});

pub(super) static ANTHROPIC_SEARCH_RULES: Lazy<RuleTable> = Lazy::new(|| {
    RuleTable::new(vec![Rule::allow(
        "claude-search",
        r"^claude-3[.-]5-(sonnet|haiku)|^claude-3[.-]7-sonnet|^claude-(sonnet|opus|haiku)-4|^claude-\d(\.\d)?-(sonnet|opus)",
    )])
});

pub(super) static GEMINI_SEARCH_RULES: Lazy<RuleTable> = Lazy::new(|| {
    RuleTable::new(vec![
        Rule::deny("gemini-no-grounding", r"-image|-tts|-embedding|^gemini-1\.0"),
        Rule::allow("gemini-grounding", r"^gemini-(1\.5|2\.0|2\.5|3)|^gemini-(flash|pro)(-lite)?-latest"),
    ])
});

pub(super) static RESPONSES_SEARCH_RULES: Lazy<RuleTable> = Lazy::new(|| {
    RuleTable::new(vec![
        Rule::deny("gpt-4.1-nano", r"^gpt-4\.1-nano"),
        Rule::allow("responses-search", r"^gpt-4o|^gpt-4\.1|^gpt-5|^o3$|^o3-pro|^o4-mini"),
    ])
});

/// Chat-completions vendors that switch search on with a request flag
pub(super) static CHAT_SEARCH_RULES: Lazy<RuleTable> = Lazy::new(|| {
    RuleTable::new(vec![Rule::allow(
        "qwen-enable-search",
        r"^qwen-(max|plus|turbo|flash)|^qwen3-",
    )])
});

/// Provider-scoped decision; `None` defers to the generic table
pub(super) fn provider_scoped(id: &str, provider: &Provider) -> Option<bool> {
    let table = match provider.provider_type {
        ProviderType::Anthropic => &ANTHROPIC_SEARCH_RULES,
        ProviderType::Gemini => &GEMINI_SEARCH_RULES,
        ProviderType::OpenAiResponse => &RESPONSES_SEARCH_RULES,
        ProviderType::OpenAi => {
            return (WEB_SEARCH_RULES.allows(id) || CHAT_SEARCH_RULES.allows(id)).then_some(true);
        }
        ProviderType::Aggregator => return None,
    };
    Some(table.allows(id))
}

/// Family-native search when no provider narrows the protocol
pub(super) fn any_protocol(id: &str) -> bool {
    WEB_SEARCH_RULES.allows(id)
        || ANTHROPIC_SEARCH_RULES.allows(id)
        || GEMINI_SEARCH_RULES.allows(id)
}
