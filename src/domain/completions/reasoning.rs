//! Inline tag extraction
//!
//! Some vendors stream reasoning inside the answer text, wrapped in a tag pair such as
//! `<think>`/`</think>`. [`TagExtractor`] splits such a stream into tagged and plain text.
//! Partial tags straddling two deltas are held back, and an optional separator is stripped
//! once at the start of every span, so the output never depends on how the text was split.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Opening/closing tag and the separator trimmed from the start of each span
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagPair {
    pub open: String,
    pub close: String,
    #[serde(default)]
    pub separator: String,
}

impl TagPair {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
            separator: String::new(),
        }
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// `<think>…</think>`
    pub fn think() -> Self {
        Self::new("<think>", "</think>").with_separator("\n")
    }

    /// `###Thinking … ###Response`
    pub fn thinking_response() -> Self {
        Self::new("###Thinking", "###Response").with_separator("\n")
    }

    /// Prompt-mode tool call markup
    pub fn tool_use() -> Self {
        Self::new("<tool_use>", "</tool_use>")
    }

    /// Both tags must be non-empty
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.open.is_empty() || self.close.is_empty() {
            return Err(DomainError::configuration(format!(
                "Tag pair needs a non-empty open and close tag (got '{}' / '{}')",
                self.open, self.close
            )));
        }
        Ok(())
    }
}

impl Default for TagPair {
    fn default() -> Self {
        Self::think()
    }
}

/// Piece of classified text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagSegment {
    /// Text between the tags
    Tagged(String),
    /// Text outside the tags
    Plain(String),
    /// A closing tag was consumed
    Closed,
}

/// Stateful scanner over one text stream
#[derive(Debug, Clone)]
pub struct TagExtractor {
    pair: TagPair,
    buffer: String,
    inside: bool,
    strip_pending: bool,
}

impl TagExtractor {
    pub fn new(pair: TagPair) -> Self {
        Self {
            pair,
            buffer: String::new(),
            inside: false,
            strip_pending: false,
        }
    }

    pub fn pair(&self) -> &TagPair {
        &self.pair
    }

    pub fn is_inside(&self) -> bool {
        self.inside
    }

    /// Feed one delta, returning what can be classified so far
    pub fn push(&mut self, delta: &str) -> Vec<TagSegment> {
        self.buffer.push_str(delta);
        let mut out = Vec::new();

        loop {
            if self.strip_pending {
                let separator = self.pair.separator.as_str();
                if separator.is_empty() {
                    self.strip_pending = false;
                } else if self.buffer.starts_with(separator) {
                    self.buffer.drain(..separator.len());
                    self.strip_pending = false;
                } else if separator.starts_with(self.buffer.as_str()) {
                    // Empty, or a strict prefix of the separator: wait for more text
                    break;
                } else {
                    self.strip_pending = false;
                }
            }

            let tag = if self.inside {
                &self.pair.close
            } else {
                &self.pair.open
            };

            // An empty tag never matches
            let found = if tag.is_empty() {
                None
            } else {
                self.buffer.find(tag.as_str())
            };

            if let Some(pos) = found {
                let text: String = self.buffer.drain(..pos).collect();
                let tag_len = tag.len();
                self.buffer.drain(..tag_len);
                self.emit(&mut out, text);

                if self.inside {
                    out.push(TagSegment::Closed);
                }
                self.inside = !self.inside;
                self.strip_pending = true;
                continue;
            }

            let keep = partial_tag_suffix(&self.buffer, tag);
            let ready = self.buffer.len() - keep;
            let text: String = self.buffer.drain(..ready).collect();
            self.emit(&mut out, text);
            break;
        }

        out
    }

    /// Release anything still held back at end of stream
    pub fn flush(&mut self) -> Vec<TagSegment> {
        let mut out = Vec::new();
        let text = std::mem::take(&mut self.buffer);
        self.emit(&mut out, text);
        self.strip_pending = false;
        out
    }

    fn emit(&self, out: &mut Vec<TagSegment>, text: String) {
        if text.is_empty() {
            return;
        }
        let segment = if self.inside {
            TagSegment::Tagged(text)
        } else {
            TagSegment::Plain(text)
        };
        out.push(segment);
    }
}

/// Length of the longest suffix of `buffer` that is a strict prefix of `tag`
fn partial_tag_suffix(buffer: &str, tag: &str) -> usize {
    let max = tag.len().saturating_sub(1).min(buffer.len());
    (1..=max)
        .rev()
        .find(|&k| {
            let start = buffer.len() - k;
            buffer.is_char_boundary(start) && tag.starts_with(&buffer[start..])
        })
        .unwrap_or(0)
}

/// When tag extraction applies to a model's text stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningExtraction {
    /// Only for models classified as reasoning-capable
    #[default]
    Auto,
    Always,
    Never,
}

/// Configured `pattern -> tag pair` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRule {
    /// Regex matched against the lower-cased model id
    pub pattern: String,
    #[serde(flatten)]
    pub pair: TagPair,
}

/// Picks the tag pair for a model from ordered rules, falling back to `<think>`
#[derive(Debug, Clone)]
pub struct TagPairSelector {
    rules: Vec<(Regex, TagPair)>,
    default: TagPair,
}

impl TagPairSelector {
    pub fn new(rules: &[TagRule]) -> Result<Self, DomainError> {
        let rules = rules
            .iter()
            .map(|rule| {
                rule.pair.validate()?;
                Regex::new(&rule.pattern)
                    .map(|regex| (regex, rule.pair.clone()))
                    .map_err(|e| {
                        DomainError::configuration(format!(
                            "Invalid tag rule pattern '{}': {}",
                            rule.pattern, e
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            rules,
            default: TagPair::default(),
        })
    }

    pub fn select(&self, model_id: &str) -> &TagPair {
        let id = model_id.to_lowercase();
        self.rules
            .iter()
            .find(|(regex, _)| regex.is_match(&id))
            .map(|(_, pair)| pair)
            .unwrap_or(&self.default)
    }
}

impl Default for TagPairSelector {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            default: TagPair::default(),
        }
    }
}
