//! Per-request cancellation registry
//!
//! Maps a message id to the cancellation tokens of the requests it triggered. One token is
//! shared by every round of a top-level call; the entry is removed when the call finishes,
//! whatever the exit path, through [`AbortGuard`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;
use tracing::debug;

type Entries = HashMap<String, Vec<(u64, CancellationToken)>>;

#[derive(Debug, Default)]
pub struct AbortRegistry {
    entries: Mutex<Entries>,
    next_id: AtomicU64,
}

impl AbortRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        // The map stays consistent even if a holder panicked
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a token under `message_id`; the returned id identifies it for cleanup
    pub fn register(&self, message_id: &str, token: CancellationToken) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock()
            .entry(message_id.to_string())
            .or_default()
            .push((id, token));
        id
    }

    /// Cancel every request registered under `message_id`. Returns false when none was active.
    pub fn cancel(&self, message_id: &str) -> bool {
        let tokens = self.lock().remove(message_id);
        match tokens {
            Some(tokens) => {
                debug!(message_id = %message_id, count = tokens.len(), "Aborting requests");
                for (_, token) in tokens {
                    token.cancel();
                }
                true
            }
            None => false,
        }
    }

    /// Remove one registration, and the entry once it is empty
    pub fn cleanup(&self, message_id: &str, registration: u64) {
        let mut entries = self.lock();
        if let Some(tokens) = entries.get_mut(message_id) {
            tokens.retain(|(id, _)| *id != registration);
            if tokens.is_empty() {
                entries.remove(message_id);
            }
        }
    }

    pub fn is_active(&self, message_id: &str) -> bool {
        self.lock().contains_key(message_id)
    }

    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    /// Register a fresh token and return a guard that cleans it up on drop
    pub fn guard(self: &Arc<Self>, message_id: &str) -> AbortGuard {
        let token = CancellationToken::new();
        let registration = self.register(message_id, token.clone());
        AbortGuard {
            registry: Arc::clone(self),
            message_id: message_id.to_string(),
            registration,
            token,
        }
    }
}

/// Keeps a registry entry alive for the duration of one call
#[derive(Debug)]
pub struct AbortGuard {
    registry: Arc<AbortRegistry>,
    message_id: String,
    registration: u64,
    token: CancellationToken,
}

impl AbortGuard {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }
}

impl Drop for AbortGuard {
    fn drop(&mut self) {
        self.registry.cleanup(&self.message_id, self.registration);
    }
}
