//! In-memory translation cache with FIFO eviction.
//! Key: blake3 hash of (text | src_lang | tgt_lang), each case-folded and trimmed.
//! Reads never touch recency, so the underlying LRU order is insertion order.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{RelayError, Result};

pub type CacheKey = [u8; 32];

pub struct ResponseCache {
    inner: Mutex<LruCache<CacheKey, String>>,
    capacity: usize,
}

impl ResponseCache {
    pub fn new(capacity: usize) -> Result<Self> {
        let cap = NonZeroUsize::new(capacity)
            .ok_or_else(|| RelayError::Config("cache capacity must be > 0".into()))?;
        Ok(Self {
            inner: Mutex::new(LruCache::new(cap)),
            capacity,
        })
    }

    /// Compute the cache key from translation parameters.
    pub fn compute_key(text: &str, src_lang: &str, tgt_lang: &str) -> CacheKey {
        let mut hasher = blake3::Hasher::new();
        for (i, part) in [text, src_lang, tgt_lang].iter().enumerate() {
            if i > 0 {
                hasher.update(b"|");
            }
            let folded = part.trim().to_lowercase();
            // Length prefix keeps "a|b" + "c" distinct from "a" + "b|c".
            hasher.update(&(folded.len() as u64).to_le_bytes());
            hasher.update(folded.as_bytes());
        }
        *hasher.finalize().as_bytes()
    }

    /// Look up a cached translation.
    pub fn get(&self, text: &str, src_lang: &str, tgt_lang: &str) -> Option<String> {
        let key = Self::compute_key(text, src_lang, tgt_lang);
        self.inner.lock().peek(&key).cloned()
    }

    /// Insert a translation. Overwriting an existing key keeps its slot;
    /// a new key at capacity evicts the oldest insertion first.
    pub fn set(&self, text: &str, src_lang: &str, tgt_lang: &str, translation: String) {
        let key = Self::compute_key(text, src_lang, tgt_lang);
        let mut cache = self.inner.lock();
        if let Some(slot) = cache.peek_mut(&key) {
            *slot = translation;
            return;
        }
        if cache.len() >= self.capacity {
            if let Some((evicted, _)) = cache.pop_lru() {
                debug!(evicted = %hex_prefix(&evicted), "cache full, evicted oldest entry");
            }
        }
        cache.push(key, translation);
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn size(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

fn hex_prefix(key: &CacheKey) -> String {
    key[..4].iter().map(|b| format!("{b:02x}")).collect()
}
