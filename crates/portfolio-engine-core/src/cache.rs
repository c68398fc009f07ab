use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::trace;

use crate::config::CacheConfig;

/// Per-symbol cache with a fixed entry lifetime and a capacity bound.
///
/// When full, the least recently read entry is evicted. All methods have an
/// `_at` variant taking the current instant explicitly so expiry can be
/// tested without sleeping.
#[derive(Debug)]
pub struct SymbolCache<V> {
    ttl: Duration,
    capacity: usize,
    entries: HashMap<String, Entry<V>>,
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    inserted: Instant,
    last_read: Instant,
}

impl<V: Clone> SymbolCache<V> {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            entries: HashMap::new(),
        }
    }

    /// Cache described by `config`, or `None` when caching is disabled.
    pub fn from_config(config: &CacheConfig) -> Option<Self> {
        config
            .ttl_seconds
            .map(|secs| Self::new(Duration::from_secs(secs), config.max_entries))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&mut self, symbol: &str) -> Option<V> {
        self.get_at(symbol, Instant::now())
    }

    pub fn get_at(&mut self, symbol: &str, now: Instant) -> Option<V> {
        let entry = self.entries.get_mut(symbol)?;
        if now.duration_since(entry.inserted) < self.ttl {
            entry.last_read = now;
            trace!(symbol, "cache hit");
            return Some(entry.value.clone());
        }
        trace!(symbol, "cache entry expired");
        self.entries.remove(symbol);
        None
    }

    pub fn insert(&mut self, symbol: impl Into<String>, value: V) {
        self.insert_at(symbol, value, Instant::now());
    }

    pub fn insert_at(&mut self, symbol: impl Into<String>, value: V, now: Instant) {
        let symbol = symbol.into();
        self.purge_expired(now);

        if !self.entries.contains_key(&symbol) && self.entries.len() >= self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by(|a, b| a.1.last_read.cmp(&b.1.last_read).then_with(|| a.0.cmp(b.0)))
                .map(|(k, _)| k.clone());
            if let Some(key) = oldest {
                trace!(symbol = %key, "cache eviction");
                self.entries.remove(&key);
            }
        }

        self.entries.insert(
            symbol,
            Entry {
                value,
                inserted: now,
                last_read: now,
            },
        );
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn purge_expired(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.entries
            .retain(|_, entry| now.duration_since(entry.inserted) < ttl);
    }
}
