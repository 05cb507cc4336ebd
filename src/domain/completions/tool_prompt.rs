//! Prompt-mode tool use, for models without native function calling
//!
//! Tools are described in the system prompt and the model answers with
//! `<tool_use><name>…</name><arguments>…</arguments></tool_use>` blocks. Results go back as a
//! user turn of `<tool_use_result>` blocks.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::llm::{Message, RawToolCall, ToolArguments, ToolCallResult, ToolDefinition};

static TOOL_USE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<tool_use>\s*<name>(.*?)</name>\s*<arguments>(.*?)</arguments>\s*</tool_use>")
        .unwrap()
});

const INSTRUCTIONS: &str = "You can call tools to answer the user. To call a tool, reply with \
exactly this format and nothing else after it:

<tool_use>
  <name>tool name</name>
  <arguments>{\"argument\": \"value\"}</arguments>
</tool_use>

You may call several tools at once by writing several blocks. Each result is returned in a \
<tool_use_result> block. Use the results to continue; when no tool is needed, answer directly.";

/// System prompt section describing the available tools
pub fn build_tool_system_prompt(base: Option<&str>, tools: &[ToolDefinition]) -> String {
    let mut prompt = String::new();
    if let Some(base) = base.filter(|b| !b.trim().is_empty()) {
        prompt.push_str(base);
        prompt.push_str("\n\n");
    }

    prompt.push_str(INSTRUCTIONS);
    prompt.push_str("\n\n<tools>\n");
    for tool in tools {
        prompt.push_str("<tool>\n");
        prompt.push_str(&format!("  <name>{}</name>\n", tool.name));
        if let Some(description) = &tool.description {
            prompt.push_str(&format!("  <description>{}</description>\n", description));
        }
        prompt.push_str(&format!("  <arguments>{}</arguments>\n", tool.input_schema));
        prompt.push_str("</tool>\n");
    }
    prompt.push_str("</tools>");
    prompt
}

/// Extract the tool calls of one round's text
pub fn parse_tool_uses(text: &str, round: usize) -> Vec<RawToolCall> {
    TOOL_USE_PATTERN
        .captures_iter(text)
        .enumerate()
        .map(|(index, captures)| RawToolCall {
            id: format!("tool_use_{}_{}", round, index),
            name: captures[1].trim().to_string(),
            arguments: ToolArguments::parse(&captures[2]),
        })
        .collect()
}

/// User turn carrying the results of one round
pub fn tool_results_message(results: &[ToolCallResult]) -> Message {
    let body = results
        .iter()
        .map(|result| {
            format!(
                "<tool_use_result>\n  <name>{}</name>\n  <result>{}</result>\n</tool_use_result>",
                result.tool.name,
                result.output.to_text()
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    Message::user(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::{ToolCallStatus, ToolOutput};
    use serde_json::json;

    #[test]
    fn test_prompt_lists_tools() {
        let tools = vec![ToolDefinition::new("clock").with_description("Current time")];
        let prompt = build_tool_system_prompt(Some("Be brief."), &tools);

        assert!(prompt.starts_with("Be brief.\n\n"));
        assert!(prompt.contains("<name>clock</name>"));
        assert!(prompt.contains("<description>Current time</description>"));
    }

    #[test]
    fn test_parse_multiple_tool_uses() {
        let text = "Checking.<tool_use>\n<name>weather</name>\n<arguments>{\"city\": \"Oslo\"}</arguments>\n</tool_use>\
                    <tool_use><name> clock </name><arguments>not json</arguments></tool_use>";

        let calls = parse_tool_uses(text, 2);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id, "tool_use_2_0");
        assert_eq!(calls[0].name, "weather");
        assert_eq!(calls[0].arguments, ToolArguments::Parsed(json!({"city": "Oslo"})));
        assert_eq!(calls[1].name, "clock");
        assert_eq!(calls[1].arguments, ToolArguments::Raw("not json".to_string()));
    }

    #[test]
    fn test_no_markup_no_calls() {
        assert!(parse_tool_uses("Plain answer", 0).is_empty());
    }

    #[test]
    fn test_results_message() {
        let results = vec![ToolCallResult {
            id: "tool_use_0_0".to_string(),
            tool: ToolDefinition::new("clock"),
            arguments: ToolArguments::parse("{}"),
            status: ToolCallStatus::Success,
            output: ToolOutput::text("12:00"),
        }];

        let message = tool_results_message(&results);
        assert_eq!(
            message.content_text(),
            "<tool_use_result>\n  <name>clock</name>\n  <result>12:00</result>\n</tool_use_result>"
        );
    }
}
