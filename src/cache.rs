use anyhow::Result;
use std::{
    collections::{hash_map::DefaultHasher, HashMap, VecDeque},
    hash::{Hash, Hasher},
    sync::Arc,
};
use tracing::debug;

use crate::pipeline::{Pipeline, Prepared};

/// Identity of an uploaded file: content hash plus length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentKey {
    hash: u64,
    len: usize,
}

impl ContentKey {
    pub fn of(bytes: &[u8]) -> Self {
        let mut h = DefaultHasher::new();
        bytes.hash(&mut h);
        Self {
            hash: h.finish(),
            len: bytes.len(),
        }
    }
}

/// Tables kept by `TableCache::new`.
pub const DEFAULT_CAPACITY: usize = 8;

/// Memoizes prepared tables by upload content, so re-running the dashboard
/// with the same file skips parsing and normalization.
///
/// Holds at most `capacity` tables and evicts the least recently used.
#[derive(Debug)]
pub struct TableCache {
    entries: HashMap<ContentKey, Arc<Prepared>>,
    /// Least recently used first.
    order: VecDeque<ContentKey>,
    capacity: usize,
    hits: u64,
    misses: u64,
}

impl Default for TableCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl TableCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A capacity of 0 is treated as 1.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
            hits: 0,
            misses: 0,
        }
    }

    /// Cached result for `bytes`, preparing it on first sight.
    /// Failures are not cached.
    pub fn get_or_prepare(
        &mut self,
        bytes: &[u8],
        label: &str,
        pipeline: &Pipeline,
    ) -> Result<Arc<Prepared>> {
        let key = ContentKey::of(bytes);
        if let Some(found) = self.entries.get(&key) {
            let found = Arc::clone(found);
            self.hits += 1;
            self.touch(key);
            debug!(label, "table cache hit");
            return Ok(found);
        }

        self.misses += 1;
        debug!(label, "table cache miss");
        let prepared = Arc::new(pipeline.prepare_bytes(bytes, label)?);
        while self.entries.len() >= self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
            debug!(capacity = self.capacity, "evicted cached table");
        }
        self.entries.insert(key, Arc::clone(&prepared));
        self.order.push_back(key);
        Ok(prepared)
    }

    fn touch(&mut self, key: ContentKey) {
        if let Some(pos) = self.order.iter().position(|k| *k == key) {
            self.order.remove(pos);
        }
        self.order.push_back(key);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}
