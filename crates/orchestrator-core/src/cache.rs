//! TTL-keyed memoization of task output, consulted by the executor before
//! dispatch and written to only on `ok` results.

use std::time::{Duration, Instant};

use dashmap::DashMap;

pub type CacheKey = String;

struct Entry {
    value: String,
    inserted_at: Instant,
}

/// Deterministic key for a `(task description, agent name)` pair. Equal
/// pairs must produce equal keys.
pub fn task_key(task: &str, agent_name: &str) -> CacheKey {
    format!("{agent_name}\u{1}{task}")
}

/// Process-wide, concurrency-safe task cache.
///
/// A stale-read race (two callers miss, both compute, both `set`) is
/// acceptable: the second write wins. No single-flight coalescing is
/// provided.
pub struct TaskCache {
    enabled: bool,
    ttl: Duration,
    entries: DashMap<CacheKey, Entry>,
}

impl TaskCache {
    pub fn new(enabled: bool, ttl: Duration) -> Self {
        Self {
            enabled,
            ttl,
            entries: DashMap::new(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn get(&self, key: &str) -> Option<String> {
        if !self.enabled {
            return None;
        }
        let fresh = self
            .entries
            .get(key)
            .filter(|entry| entry.inserted_at.elapsed() < self.ttl)
            .map(|entry| entry.value.clone());

        if fresh.is_none() {
            self.entries.remove(key);
        }
        fresh
    }

    pub fn set(&self, key: CacheKey, value: impl Into<String>) {
        if !self.enabled {
            return;
        }
        self.entries.insert(
            key,
            Entry {
                value: value.into(),
                inserted_at: Instant::now(),
            },
        );
    }
}
