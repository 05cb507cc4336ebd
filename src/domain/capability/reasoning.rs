//! Reasoning support, effort options and thinking-token budgets

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::rules::{Rule, RuleTable, TokenLimit, TokenLimitTable};
use crate::domain::llm::ReasoningEffort;

pub(super) static REASONING_RULES: Lazy<RuleTable> = Lazy::new(|| {
    RuleTable::new(vec![
        Rule::deny("gpt-5-chat", r"^gpt-5(\.\d+)?-chat"),
        Rule::deny(
            "qwen-non-thinking",
            r"^qwen3-.*-instruct|^qwen3-coder|^qwen3-max|^qwen-max|^qwen-mt|^qwen3-.*-captioner",
        ),
        Rule::deny("gemini-non-thinking", r"^gemini-.*-image|^gemini-.*-tts"),
        Rule::allow("openai-o-series", r"^o\d"),
        Rule::allow("gpt-5", r"^gpt-5"),
        Rule::allow("gpt-oss", r"^gpt-oss"),
        Rule::allow(
            "claude-thinking",
            r"^claude-3[.-]7-sonnet|^claude-(sonnet|opus|haiku)-4|^claude-\d(\.\d)?-(sonnet|opus|haiku)",
        ),
        Rule::allow(
            "gemini-thinking",
            r"^gemini-2\.5|^gemini-3|^gemini-.*-thinking|^gemini-(flash|pro)(-lite)?-latest",
        ),
        Rule::allow("qwen-thinking", r"^qwq|^qvq|^qwen3|^qwen-plus|^qwen-turbo|^qwen-flash"),
        Rule::allow(
            "deepseek",
            r"^deepseek-r1|^deepseek-reasoner|^deepseek-v3[.-][12]",
        ),
        Rule::allow("grok", r"^grok-3-mini|^grok-4"),
        Rule::allow(
            "doubao",
            r"^doubao-seed-1[.-]6|^doubao-1[.-]5-thinking|^doubao-.*-thinking",
        ),
        Rule::allow("zhipu", r"^glm-4\.[56]|^glm-z1"),
        Rule::allow(
            "others",
            r"^hunyuan-t1|^hunyuan-a13b|^magistral|^baichuan-m2|^kimi-k2-thinking|^minimax-m[12]|^step-r1|^sonar-reasoning|^sonar-deep-research|^mimo",
        ),
        Rule::allow("generic", r"reasoning|thinking|-r1\b"),
    ])
});

/// Models taking the OpenAI-style `reasoning_effort` parameter
pub(super) static REASONING_EFFORT_RULES: Lazy<RuleTable> = Lazy::new(|| {
    RuleTable::new(vec![
        Rule::deny("effort-unsupported", r"^o1-mini|^o1-preview|^o3-mini"),
        Rule::deny("gpt-5-chat", r"^gpt-5(\.\d+)?-chat"),
        Rule::allow(
            "effort-families",
            r"^o\d|^gpt-5|^gpt-oss|^grok-3-mini|^sonar-deep-research",
        ),
    ])
});

/// OpenAI reasoning models: developer role, `max_completion_tokens`, fixed sampling
pub(super) static OPENAI_REASONING_RULES: Lazy<RuleTable> = Lazy::new(|| {
    RuleTable::new(vec![
        Rule::deny("gpt-5-chat", r"^gpt-5(\.\d+)?-chat"),
        Rule::allow("openai-reasoning", r"^o\d|^gpt-5"),
    ])
});

fn is_qwen3_below_max(id: &str) -> bool {
    id.starts_with("qwen3-") && !id.starts_with("qwen3-max")
}

pub(super) static THINKING_TOKEN_LIMITS: Lazy<TokenLimitTable> = Lazy::new(|| {
    TokenLimitTable::new()
        .pattern(r"^gemini-.*-flash-lite", TokenLimit::new(512, 24576))
        .pattern(r"^gemini-.*-flash", TokenLimit::new(0, 24576))
        .pattern(r"^gemini-.*-pro", TokenLimit::new(128, 32768))
        .pattern(
            r"^qwen3-(235b-a22b|30b-a3b)-thinking-2507",
            TokenLimit::new(0, 81920),
        )
        .pattern(
            r"^qwen-plus-2025-(07-14|04-28)",
            TokenLimit::new(0, 38912),
        )
        .pattern(r"^qwen3-(1\.7b|0\.6b)", TokenLimit::new(0, 30720))
        .pattern(r"^qwen-plus", TokenLimit::new(0, 81920))
        .pattern(r"^qwen-turbo", TokenLimit::new(0, 38912))
        .pattern(r"^qwen-flash", TokenLimit::new(0, 81920))
        .predicate(is_qwen3_below_max, TokenLimit::new(1024, 38912))
        .pattern(r"^claude-opus-4", TokenLimit::new(1024, 32000))
        .pattern(
            r"^claude-3[.-]7-sonnet|^claude-(sonnet|haiku)-4",
            TokenLimit::new(1024, 64000),
        )
        .pattern(r"^baichuan-m2", TokenLimit::new(0, 30000))
});

/// Effort levels a model family accepts, by normalized id
pub(super) fn effort_options(id: &str) -> &'static [ReasoningEffort] {
    use ReasoningEffort as E;

    if id.starts_with("gpt-5.1") {
        &[E::None, E::Low, E::Medium, E::High]
    } else if id.starts_with("gpt-5") {
        &[E::Minimal, E::Low, E::Medium, E::High]
    } else if id.starts_with("grok-3-mini") {
        &[E::Low, E::High]
    } else if REASONING_EFFORT_RULES.allows(id) {
        &[E::Low, E::Medium, E::High]
    } else if id.starts_with("gemini-") && id.contains("-pro") {
        &[E::Low, E::Medium, E::High, E::Auto]
    } else if id.starts_with("gemini-") {
        &[E::None, E::Low, E::Medium, E::High, E::Auto]
    } else if id.starts_with("doubao-") {
        &[E::None, E::Auto, E::High]
    } else if id.starts_with("deepseek-v3") {
        &[E::None, E::Auto]
    } else if THINKING_TOKEN_LIMITS.lookup(id).is_some()
        || id.starts_with("hunyuan")
        || id.starts_with("glm-")
    {
        &[E::None, E::Low, E::Medium, E::High]
    } else {
        &[]
    }
}

/// Budget = floor((max - min) * ratio + min), kept below `max_tokens` but not under `min`
pub fn budget_for(limit: TokenLimit, effort: ReasoningEffort, max_tokens: Option<u32>) -> Option<u32> {
    let ratio = effort.budget_ratio()?;
    let span = limit.max.saturating_sub(limit.min) as f64;
    let mut budget = (span * ratio + limit.min as f64).floor() as u32;
    budget = budget.clamp(limit.min, limit.max);

    if let Some(max_tokens) = max_tokens {
        budget = budget.min(max_tokens.saturating_sub(1)).max(limit.min);
    }

    Some(budget)
}

/// Reasoning parameters resolved for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningSettings {
    pub effort: ReasoningEffort,
    /// Explicit thinking-token budget; `None` lets the vendor decide
    pub budget_tokens: Option<u32>,
    /// Send the OpenAI-style `reasoning_effort` parameter
    pub effort_param: bool,
}

impl ReasoningSettings {
    pub fn is_enabled(&self) -> bool {
        self.effort != ReasoningEffort::None
    }
}
