//! Content hashing and bounded memoization caches.
//!
//! Cache entries are pure memoizations: safe to drop and recompute, never
//! required for correctness. Eviction is least-recently-used with a fixed
//! capacity.

use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};

/// Capacity shared by the parse, template and style caches.
pub const CACHE_LIMIT: usize = 100;

/// Short content hash (8 hex chars), used for component file ids and
/// source-map cache-busting filenames.
pub fn hash_sum(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    format!(
        "{:02x}{:02x}{:02x}{:02x}",
        digest[0], digest[1], digest[2], digest[3]
    )
}

/// Full-width cache key derived from arbitrary content.
pub fn cache_key(input: &str) -> u64 {
    let digest = Sha256::digest(input.as_bytes());
    u64::from_be_bytes(digest[..8].try_into().expect("8-byte digest prefix"))
}

#[derive(Debug)]
pub struct LruCache<V> {
    limit: usize,
    map: HashMap<u64, V>,
    order: VecDeque<u64>,
}

impl<V: Clone> LruCache<V> {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            map: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn get(&mut self, key: u64) -> Option<V> {
        let value = self.map.get(&key).cloned();
        if value.is_some() {
            self.touch(key);
        }
        value
    }

    pub fn insert(&mut self, key: u64, value: V) {
        if self.map.contains_key(&key) {
            self.map.insert(key, value);
            self.touch(key);
            return;
        }

        self.map.insert(key, value);
        self.order.push_back(key);
        self.evict_if_needed();
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn touch(&mut self, key: u64) {
        if let Some(pos) = self.order.iter().position(|existing| *existing == key) {
            self.order.remove(pos);
        }
        self.order.push_back(key);
    }

    fn evict_if_needed(&mut self) {
        while self.map.len() > self.limit {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.map.remove(&oldest);
        }
    }
}
