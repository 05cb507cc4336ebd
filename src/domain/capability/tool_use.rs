//! Native function-calling support

use once_cell::sync::Lazy;

use super::rules::{Rule, RuleTable};

pub(super) static FUNCTION_CALLING_RULES: Lazy<RuleTable> = Lazy::new(|| {
    RuleTable::new(vec![
        Rule::deny(
            "openai-no-tools",
            r"^o1-mini|^o1-preview|^gpt-4o-(mini-)?(audio|realtime|transcribe|tts|search-preview)|^chatgpt-4o|^gpt-5(\.\d+)?-chat",
        ),
        Rule::deny("gemini-no-tools", r"^gemini-.*-image|^gemini-.*-tts|^gemini-1\.0|^aqa"),
        Rule::deny("qwen-no-tools", r"^qwen-mt|^qvq|-vl-ocr|^qwen-omni"),
        Rule::deny("reasoner-no-tools", r"^deepseek-reasoner$|^deepseek-r1-distill"),
        Rule::allow(
            "openai",
            r"^gpt-4|^gpt-3\.5-turbo|^gpt-5|^o1$|^o1-|^o3|^o4|^gpt-oss",
        ),
        Rule::allow("anthropic", r"^claude"),
        Rule::allow("gemini", r"^gemini"),
        Rule::allow("qwen", r"^qwen|^qwq"),
        Rule::allow("deepseek", r"^deepseek"),
        Rule::allow("zhipu", r"^glm-4|^glm-z1"),
        Rule::allow("moonshot", r"^kimi|^moonshot"),
        Rule::allow("xai", r"^grok"),
        Rule::allow("mistral", r"^mistral|^ministral|^magistral|^codestral|^pixtral"),
        Rule::allow("llama", r"^llama-3\.[1-3]|^llama-4|^llama3\.[1-3]"),
        Rule::allow(
            "others",
            r"^hunyuan|^doubao|^minimax|^abab|^step-|^ernie-4|^ernie-x1|^baichuan|^yi-large|^command-r",
        ),
    ])
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_capable_models() {
        for id in [
            "gpt-4o-mini",
            "gpt-5",
            "o3",
            "claude-opus-4-1-20250805",
            "gemini-2.5-pro",
            "qwen3-235b-a22b",
            "deepseek-chat",
            "glm-4.5",
        ] {
            assert!(FUNCTION_CALLING_RULES.allows(id), "{} should support tools", id);
        }
    }

    #[test]
    fn test_tool_incapable_variants() {
        for id in [
            "o1-mini",
            "gpt-4o-search-preview",
            "gemini-2.5-flash-image",
            "qwen-mt-plus",
            "gpt-5.1-chat",
            "unknown-model",
        ] {
            assert!(!FUNCTION_CALLING_RULES.allows(id), "{} should not support tools", id);
        }
    }
}
