use anyhow::Result;
use std::collections::HashSet;

/// Rotating set of API keys for a single service.
///
/// A key that hits a rate limit, runs out of quota or is rejected moves to
/// the exhausted set and stays there for the rest of the process.
#[derive(Debug)]
pub struct KeyPool {
    service: String,
    keys: Vec<String>,
    exhausted: HashSet<usize>,
    current_idx: usize,
}

impl KeyPool {
    pub fn new(service: &str, keys: Vec<String>) -> Result<Self> {
        if keys.is_empty() {
            anyhow::bail!("no API keys provided for {}", service);
        }
        Ok(Self {
            service: service.to_string(),
            keys,
            exhausted: HashSet::new(),
            current_idx: 0,
        })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn total(&self) -> usize {
        self.keys.len()
    }

    pub fn active_count(&self) -> usize {
        self.total() - self.exhausted.len()
    }

    pub fn exhausted_count(&self) -> usize {
        self.exhausted.len()
    }

    /// Human-readable position of the active key, e.g. "key #2 of 3".
    pub fn current_label(&self) -> String {
        format!("key #{} of {}", self.current_idx + 1, self.total())
    }

    /// The active key, or `None` once nothing usable is left.
    pub fn current(&mut self) -> Option<&str> {
        if self.exhausted.contains(&self.current_idx) && !self.rotate() {
            return None;
        }
        Some(self.keys[self.current_idx].as_str())
    }

    pub fn all_exhausted(&self) -> bool {
        self.exhausted.len() >= self.keys.len()
    }

    /// Retire the current key and move to the next usable one.
    /// Returns `false` when every key in the pool is spent.
    pub fn mark_exhausted(&mut self) -> bool {
        self.exhausted.insert(self.current_idx);
        tracing::warn!(
            service = %self.service,
            key = self.current_idx + 1,
            "key exhausted ({} of {} keys remaining)",
            self.active_count(),
            self.total(),
        );
        if self.all_exhausted() {
            tracing::warn!(
                service = %self.service,
                "ALL {} keys exhausted, no further requests possible",
                self.total(),
            );
            return false;
        }
        self.rotate()
    }

    fn rotate(&mut self) -> bool {
        for _ in 0..self.keys.len() {
            self.current_idx = (self.current_idx + 1) % self.keys.len();
            if !self.exhausted.contains(&self.current_idx) {
                tracing::info!(
                    service = %self.service,
                    "switched to {}",
                    self.current_label(),
                );
                return true;
            }
        }
        false
    }
}
