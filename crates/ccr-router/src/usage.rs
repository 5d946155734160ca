//! Per-session token usage, fed from upstream responses and read back by the
//! long-context heuristic on the session's next request.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Default number of sessions remembered before the least recently used is evicted.
pub const DEFAULT_USAGE_CACHE_CAPACITY: usize = 100;

/// Token usage as reported in an upstream `usage` object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
    #[serde(default)]
    pub cache_read_input_tokens: u64,
}

/// Bounded least-recently-used map from session id to its last usage.
#[derive(Debug)]
pub struct UsageCache {
    capacity: usize,
    entries: Mutex<Entries>,
}

#[derive(Debug, Default)]
struct Entries {
    by_session: HashMap<String, Usage>,
    /// Least recently used at the front.
    recency: VecDeque<String>,
}

impl Entries {
    fn touch(&mut self, session_id: &str) {
        if let Some(pos) = self.recency.iter().position(|id| id == session_id) {
            if let Some(id) = self.recency.remove(pos) {
                self.recency.push_back(id);
            }
        }
    }
}

impl Default for UsageCache {
    fn default() -> Self {
        Self::new(DEFAULT_USAGE_CACHE_CAPACITY)
    }
}

impl UsageCache {
    /// A capacity of zero is bumped to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(Entries::default()),
        }
    }

    pub fn get(&self, session_id: &str) -> Option<Usage> {
        let mut entries = self.entries();
        let usage = entries.by_session.get(session_id).copied()?;
        entries.touch(session_id);
        Some(usage)
    }

    pub fn put(&self, session_id: &str, usage: Usage) {
        let mut entries = self.entries();
        if entries
            .by_session
            .insert(session_id.to_string(), usage)
            .is_some()
        {
            entries.touch(session_id);
            return;
        }
        entries.recency.push_back(session_id.to_string());
        while entries.recency.len() > self.capacity {
            if let Some(evicted) = entries.recency.pop_front() {
                entries.by_session.remove(&evicted);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries().by_session.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
