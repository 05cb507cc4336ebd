//! Latency measurement of one top-level call

use std::time::{Duration, Instant};

use crate::domain::llm::{Metrics, Usage};

/// Monotonic timestamps of a call
#[derive(Debug, Clone)]
pub struct CallTimer {
    start: Instant,
    first_event: Option<Instant>,
    /// First event after the most recent thinking span closed
    after_thinking: Option<Instant>,
    end: Option<Instant>,
}

impl CallTimer {
    pub fn start() -> Self {
        Self::started_at(Instant::now())
    }

    pub fn started_at(start: Instant) -> Self {
        Self {
            start,
            first_event: None,
            after_thinking: None,
            end: None,
        }
    }

    /// Record the first output event; later calls are ignored
    pub fn mark_first_event(&mut self) {
        self.mark_first_event_at(Instant::now());
    }

    pub fn mark_first_event_at(&mut self, at: Instant) {
        self.first_event.get_or_insert(at);
    }

    /// Record the first event following a completed thinking span
    pub fn mark_after_thinking(&mut self) {
        self.mark_after_thinking_at(Instant::now());
    }

    pub fn mark_after_thinking_at(&mut self, at: Instant) {
        self.after_thinking = Some(at);
    }

    pub fn finish(&mut self) {
        self.finish_at(Instant::now());
    }

    pub fn finish_at(&mut self, at: Instant) {
        self.end.get_or_insert(at);
    }

    pub fn has_first_event(&self) -> bool {
        self.first_event.is_some()
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Derived metrics; timestamps never recorded collapse onto their predecessor
    pub fn metrics(&self, usage: &Usage) -> Metrics {
        let end = self.end.unwrap_or_else(Instant::now);
        let first = self.first_event.unwrap_or(end).max(self.start);
        let after_thinking = self.after_thinking.unwrap_or(first).max(first);

        Metrics {
            completion_tokens: usage.completion_tokens,
            time_to_first_token_ms: millis(first - self.start),
            time_to_completion_ms: millis(end.max(self.start) - self.start),
            time_thinking_ms: millis(after_thinking - first),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}
