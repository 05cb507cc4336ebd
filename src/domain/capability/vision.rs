use once_cell::sync::Lazy;

use super::rules::{Rule, RuleTable};

pub(super) static VISION_RULES: Lazy<RuleTable> = Lazy::new(|| {
    RuleTable::new(vec![
        Rule::deny(
            "openai-text-only",
            r"^o1-mini|^o1-preview|^o3-mini|^gpt-4-32k|^gpt-4-\d{4}|^gpt-4o-(mini-)?(audio|realtime|transcribe|tts)|^gpt-3\.5",
        ),
        Rule::deny("gemma-3-1b", r"^gemma-?3-1b"),
        Rule::deny("text-only-suffix", r"-tts|-embedding"),
        Rule::allow(
            "openai",
            r"^gpt-4o|^gpt-4\.1|^gpt-4\.5|^gpt-4-turbo|^gpt-4-vision|^gpt-5|^o1$|^o1-|^o3|^o4|chatgpt-4o",
        ),
        Rule::allow(
            "anthropic",
            r"^claude-3|^claude-(sonnet|opus|haiku)-4|^claude-\d(\.\d)?-(sonnet|opus|haiku)",
        ),
        Rule::allow("gemini", r"^gemini-|^gemma-?3"),
        Rule::allow(
            "qwen",
            r"^qwen-vl|^qwen\d(\.\d)?-vl|^qwen\d(\.\d)?-omni|^qvq|^qwen-omni",
        ),
        Rule::allow(
            "open-weights",
            r"llava|pixtral|internvl|minicpm-v|^llama-4|llama-3\.2-\d+b-vision|^glm-4(\.\d)?v|^step-1v|^step-1o",
        ),
        Rule::allow("grok", r"^grok-vision|^grok-4|^grok-2-vision"),
        Rule::allow("moonshot", r"^moonshot-v1-.*-vision|^kimi-latest|^kimi-vl"),
        Rule::allow("doubao", r"^doubao-.*vision|^doubao-seed-1[.-]6|^doubao-1[.-]5-thinking-vision"),
        Rule::allow("generic", r"vision|-vl\b|-vl-"),
    ])
});
