//! Ordered rule tables evaluated against a normalized model id

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Outcome of a matching rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny,
}

impl Verdict {
    pub fn is_allow(self) -> bool {
        self == Self::Allow
    }
}

/// How a rule recognises a model id
pub enum Matcher {
    Pattern(Regex),
    Predicate(fn(&str) -> bool),
}

impl Matcher {
    pub fn matches(&self, id: &str) -> bool {
        match self {
            Self::Pattern(regex) => regex.is_match(id),
            Self::Predicate(predicate) => predicate(id),
        }
    }
}

impl std::fmt::Debug for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pattern(regex) => write!(f, "Pattern({})", regex.as_str()),
            Self::Predicate(_) => f.write_str("Predicate"),
        }
    }
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid rule pattern {}: {}", pattern, e))
}

/// One named `(predicate, verdict)` pair
#[derive(Debug)]
pub struct Rule {
    pub name: &'static str,
    matcher: Matcher,
    verdict: Verdict,
}

impl Rule {
    pub fn allow(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            matcher: Matcher::Pattern(compile(pattern)),
            verdict: Verdict::Allow,
        }
    }

    pub fn deny(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            matcher: Matcher::Pattern(compile(pattern)),
            verdict: Verdict::Deny,
        }
    }

    pub fn allow_if(name: &'static str, predicate: fn(&str) -> bool) -> Self {
        Self {
            name,
            matcher: Matcher::Predicate(predicate),
            verdict: Verdict::Allow,
        }
    }

    pub fn deny_if(name: &'static str, predicate: fn(&str) -> bool) -> Self {
        Self {
            name,
            matcher: Matcher::Predicate(predicate),
            verdict: Verdict::Deny,
        }
    }

    pub fn matches(&self, id: &str) -> bool {
        self.matcher.matches(id)
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }
}

/// Rules evaluated in priority order, first match wins
#[derive(Debug)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// The first rule matching `id`
    pub fn find(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.matches(id))
    }

    pub fn evaluate(&self, id: &str) -> Option<Verdict> {
        self.find(id).map(Rule::verdict)
    }

    /// Allowed only when the first matching rule allows
    pub fn allows(&self, id: &str) -> bool {
        self.evaluate(id).is_some_and(Verdict::is_allow)
    }
}

/// Bounds of a vendor's explicit reasoning-token budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenLimit {
    pub min: u32,
    pub max: u32,
}

impl TokenLimit {
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }
}

/// Ordered `(matcher, limit)` table, first match wins
#[derive(Debug)]
pub struct TokenLimitTable {
    entries: Vec<(Matcher, TokenLimit)>,
}

impl TokenLimitTable {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn pattern(mut self, pattern: &str, limit: TokenLimit) -> Self {
        self.entries.push((Matcher::Pattern(compile(pattern)), limit));
        self
    }

    pub fn predicate(mut self, predicate: fn(&str) -> bool, limit: TokenLimit) -> Self {
        self.entries.push((Matcher::Predicate(predicate), limit));
        self
    }

    pub fn lookup(&self, id: &str) -> Option<TokenLimit> {
        self.entries
            .iter()
            .find(|(matcher, _)| matcher.matches(id))
            .map(|(_, limit)| *limit)
    }
}

impl Default for TokenLimitTable {
    fn default() -> Self {
        Self::new()
    }
}
