//! Message window selection

use crate::domain::llm::{Message, MessageRole};
use crate::domain::DomainError;

/// Messages actually sent upstream, with system content hoisted out
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredContext {
    pub system: Option<String>,
    pub messages: Vec<Message>,
}

/// Select the window of `messages` to send.
///
/// Empty messages are dropped and system messages hoisted into the system prompt. The
/// remaining history is cut to the last `context_count + 1` messages, must start on a user
/// turn, and runs of adjacent user turns collapse to the last of the run.
pub fn filter_messages(
    prompt: Option<&str>,
    messages: &[Message],
    context_count: Option<usize>,
) -> Result<FilteredContext, DomainError> {
    let mut system_parts: Vec<String> = prompt
        .filter(|p| !p.trim().is_empty())
        .map(|p| vec![p.to_string()])
        .unwrap_or_default();

    let mut history = Vec::with_capacity(messages.len());
    for message in messages.iter().filter(|m| !m.is_empty()) {
        if message.role == MessageRole::System {
            system_parts.push(message.content_text());
        } else {
            history.push(message.clone());
        }
    }

    if let Some(count) = context_count {
        let keep = count.saturating_add(1);
        if history.len() > keep {
            history.drain(..history.len() - keep);
        }
    }

    let first_user = history
        .iter()
        .position(|m| m.role == MessageRole::User)
        .unwrap_or(history.len());
    history.drain(..first_user);

    let mut window: Vec<Message> = Vec::with_capacity(history.len());
    for message in history {
        let collapse = message.role == MessageRole::User
            && window.last().is_some_and(|last| last.role == MessageRole::User);
        if collapse {
            window.pop();
        }
        window.push(message);
    }

    if window.is_empty() {
        return Err(DomainError::validation("No user message to send"));
    }

    Ok(FilteredContext {
        system: (!system_parts.is_empty()).then(|| system_parts.join("\n\n")),
        messages: window,
    })
}
