//! Model capability classifier
//!
//! Pure, deterministic predicates deciding which features a model supports. Evaluation
//! order per capability, first decision wins:
//! 1. explicit user override on the model
//! 2. cross-kind exclusion (embedding, rerank and text-to-image models never reason,
//!    call tools or search)
//! 3. vendor special cases (opaque Doubao endpoint ids, provider-scoped rules)
//! 4. the capability's ordered rule table over the normalized model id
//! 5. false

mod embedding;
mod image;
mod reasoning;
mod rules;
mod tool_use;
mod vision;
mod web_search;

pub use reasoning::{budget_for, ReasoningSettings};
pub use rules::{Matcher, Rule, RuleTable, TokenLimit, TokenLimitTable, Verdict};

use serde::Serialize;

use crate::domain::llm::ReasoningEffort;
use crate::domain::{Model, ModelCapability, Provider};

/// Lower-cased id with any provider prefix (up to the last `/`) and `:free` suffix removed
pub fn base_model_id(id: &str) -> String {
    let lowered = id.trim().to_lowercase();
    let base = lowered.rsplit('/').next().unwrap_or(lowered.as_str());
    base.strip_suffix(":free").unwrap_or(base).to_string()
}

/// Doubao endpoints are opaque (`ep-...`), so their display name is classified instead
fn classification_id(model: &Model, provider: Option<&Provider>) -> String {
    let id = base_model_id(model.id());
    let is_doubao = provider.is_some_and(|p| p.id.to_lowercase().contains("doubao"))
        || model.provider().to_lowercase().contains("doubao");

    if is_doubao || id.starts_with("ep-") {
        base_model_id(model.name())
    } else {
        id
    }
}

fn is_excluded_kind(model: &Model, provider: Option<&Provider>) -> bool {
    [
        ModelCapability::Embedding,
        ModelCapability::Rerank,
        ModelCapability::TextToImage,
    ]
    .into_iter()
    .any(|kind| classify(kind, model, provider))
}

fn special_case(kind: ModelCapability, id: &str, provider: Option<&Provider>) -> Option<bool> {
    let provider = provider?;
    match kind {
        ModelCapability::WebSearch => web_search::provider_scoped(id, provider),
        ModelCapability::ImageGeneration => image::provider_scoped(id, provider),
        _ => None,
    }
}

fn rule_table_allows(kind: ModelCapability, id: &str) -> bool {
    match kind {
        ModelCapability::Embedding => embedding::EMBEDDING_RULES.allows(id),
        ModelCapability::Rerank => embedding::RERANK_RULES.allows(id),
        ModelCapability::Vision => vision::VISION_RULES.allows(id),
        ModelCapability::Reasoning => reasoning::REASONING_RULES.allows(id),
        ModelCapability::FunctionCalling => tool_use::FUNCTION_CALLING_RULES.allows(id),
        ModelCapability::WebSearch => web_search::any_protocol(id),
        ModelCapability::TextToImage => image::TEXT_TO_IMAGE_RULES.allows(id),
        ModelCapability::ImageGeneration => image::IMAGE_GENERATION_RULES.allows(id),
    }
}

/// Decide whether `model` supports `kind`
pub fn classify(kind: ModelCapability, model: &Model, provider: Option<&Provider>) -> bool {
    if let Some(decision) = model.user_override(kind) {
        return decision;
    }

    let dependent = matches!(
        kind,
        ModelCapability::Reasoning | ModelCapability::FunctionCalling | ModelCapability::WebSearch
    );
    if dependent && is_excluded_kind(model, provider) {
        return false;
    }

    let id = classification_id(model, provider);
    if let Some(decision) = special_case(kind, &id, provider) {
        return decision;
    }

    rule_table_allows(kind, &id)
}

/// Explicit thinking-token range for vendors that expose one
pub fn thinking_token_limit(model_id: &str) -> Option<TokenLimit> {
    reasoning::THINKING_TOKEN_LIMITS.lookup(&base_model_id(model_id))
}

/// Whether the model takes the OpenAI-style `reasoning_effort` parameter
pub fn supports_reasoning_effort(model: &Model, provider: Option<&Provider>) -> bool {
    classify(ModelCapability::Reasoning, model, provider)
        && reasoning::REASONING_EFFORT_RULES.allows(&classification_id(model, provider))
}

/// Effort levels the model's family accepts; empty when reasoning is not adjustable
pub fn reasoning_effort_options(
    model: &Model,
    provider: Option<&Provider>,
) -> &'static [ReasoningEffort] {
    if !classify(ModelCapability::Reasoning, model, provider) {
        return &[];
    }
    reasoning::effort_options(&classification_id(model, provider))
}

/// Thinking budget for an effort level; `None` when the model has no explicit range
/// or the vendor should pick the budget dynamically
pub fn thinking_budget(
    model: &Model,
    effort: ReasoningEffort,
    max_tokens: Option<u32>,
) -> Option<u32> {
    let limit = thinking_token_limit(model.id())
        .or_else(|| thinking_token_limit(model.name()))?;
    budget_for(limit, effort, max_tokens)
}

/// o-series and GPT-5 reasoning models
pub fn is_openai_reasoning_model(model: &Model) -> bool {
    reasoning::OPENAI_REASONING_RULES.allows(&base_model_id(model.id()))
}

/// OpenAI reasoning models reject explicit sampling parameters
pub fn supports_temperature_and_top_p(model: &Model) -> bool {
    !is_openai_reasoning_model(model)
}

/// Resolve the reasoning parameters of one request; `None` when nothing should be sent
pub fn reasoning_settings(
    model: &Model,
    provider: Option<&Provider>,
    effort: Option<ReasoningEffort>,
    max_tokens: Option<u32>,
) -> Option<ReasoningSettings> {
    let effort = effort?;
    if !classify(ModelCapability::Reasoning, model, provider) {
        return None;
    }

    Some(ReasoningSettings {
        effort,
        budget_tokens: thinking_budget(model, effort, max_tokens),
        effort_param: supports_reasoning_effort(model, provider),
    })
}

/// Vendor family of a model, used for routing and parameter shaping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    OpenAi,
    Claude,
    Gemini,
    Qwen,
    DeepSeek,
    Grok,
    Doubao,
    Other,
}

pub fn model_family(model: &Model) -> ModelFamily {
    let id = base_model_id(model.id());
    if id.starts_with("claude") {
        ModelFamily::Claude
    } else if id.starts_with("gemini") || id.starts_with("gemma") || id.starts_with("imagen") {
        ModelFamily::Gemini
    } else if id.starts_with("gpt")
        || id.starts_with("chatgpt")
        || id.starts_with("dall-e")
        || reasoning::OPENAI_REASONING_RULES.allows(&id)
    {
        ModelFamily::OpenAi
    } else if id.starts_with("qwen") || id.starts_with("qwq") || id.starts_with("qvq") {
        ModelFamily::Qwen
    } else if id.starts_with("deepseek") {
        ModelFamily::DeepSeek
    } else if id.starts_with("grok") {
        ModelFamily::Grok
    } else if id.starts_with("doubao") || id.starts_with("ep-") {
        ModelFamily::Doubao
    } else {
        ModelFamily::Other
    }
}

/// Every capability decision for a model, in `ModelCapability::ALL` order
pub fn capability_report(model: &Model, provider: Option<&Provider>) -> Vec<(ModelCapability, bool)> {
    ModelCapability::ALL
        .iter()
        .map(|kind| (*kind, classify(*kind, model, provider)))
        .collect()
}
