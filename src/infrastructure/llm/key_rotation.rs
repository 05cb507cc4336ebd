use std::sync::atomic::{AtomicUsize, Ordering};

use crate::domain::{DomainError, Provider};

/// Round-robin over a provider's API keys
#[derive(Debug)]
pub struct ApiKeyRing {
    keys: Vec<String>,
    cursor: AtomicUsize,
}

impl ApiKeyRing {
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            keys,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn from_provider(provider: &Provider) -> Self {
        Self::new(provider.api_keys())
    }

    /// Key for the next top-level call
    pub fn next(&self) -> Result<String, DomainError> {
        if self.keys.is_empty() {
            return Err(DomainError::configuration("Provider has no API key configured"));
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.keys.len();
        Ok(self.keys[index].clone())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
