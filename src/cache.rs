//! In-memory translation cache keyed by `(text, target_lang)`.
//!
//! Backed by a [`DashMap`] so concurrent request handlers can read and write
//! without a global lock. Entries expire after a fixed TTL (24 h by default)
//! and are evicted lazily on lookup, by [`TranslationCache::evict_expired`]
//! sweeps, and whenever an insert finds the cache full. A full cache with
//! nothing expired drops its oldest tenth. Only successful translations are
//! stored.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    text: String,
    target_lang: String,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    translated: String,
    inserted_at: Instant,
}

/// Thread-safe translation cache with TTL.
#[derive(Debug)]
pub struct TranslationCache {
    entries: DashMap<CacheKey, CacheEntry>,
    ttl: Duration,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Default capacity of [`TranslationCache::new`].
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

impl Default for TranslationCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(24 * 60 * 60))
    }
}

impl TranslationCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, DEFAULT_MAX_ENTRIES)
    }

    /// Cache holding about `max_entries` translations (at least one).
    /// Concurrent inserts may overshoot by the number of racing writers.
    pub fn with_capacity(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn key(text: &str, target_lang: &str) -> CacheKey {
        CacheKey {
            text: text.to_string(),
            target_lang: target_lang.to_string(),
        }
    }

    /// Cached translation of `text`, if present and not expired.
    pub fn get(&self, text: &str, target_lang: &str) -> Option<String> {
        let key = Self::key(text, target_lang);
        if let Some(entry) = self.entries.get(&key) {
            if entry.inserted_at.elapsed() <= self.ttl {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(target_lang, "translation cache hit");
                return Some(entry.translated.clone());
            }
            drop(entry);
            self.entries.remove(&key);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn insert(&self, text: &str, target_lang: &str, translated: &str) {
        let key = Self::key(text, target_lang);
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.make_room();
        }
        self.entries.insert(
            key,
            CacheEntry {
                translated: translated.to_string(),
                inserted_at: Instant::now(),
            },
        );
    }

    /// Expired entries go first; if none were, the oldest tenth goes.
    fn make_room(&self) {
        if self.evict_expired() > 0 && self.entries.len() < self.max_entries {
            return;
        }
        let mut ages: Vec<(Instant, CacheKey)> = self
            .entries
            .iter()
            .map(|e| (e.value().inserted_at, e.key().clone()))
            .collect();
        ages.sort_unstable_by_key(|(at, _)| *at);
        let excess = (self.entries.len() + 1).saturating_sub(self.max_entries);
        let drop = excess.max(self.max_entries / 10).max(1);
        for (_, key) in ages.into_iter().take(drop) {
            self.entries.remove(&key);
        }
        tracing::debug!(dropped = drop, "translation cache full; dropped oldest entries");
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.inserted_at.elapsed() <= self.ttl);
        before - self.entries.len()
    }
}

/// Run [`TranslationCache::evict_expired`] every `every` until `stop` is
/// cancelled.
pub fn spawn_sweeper(cache: Arc<TranslationCache>, every: Duration, stop: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval_at(Instant::now() + every, every);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = tick.tick() => {
                    let removed = cache.evict_expired();
                    if removed > 0 {
                        tracing::debug!(removed, remaining = cache.len(), "expired translations swept");
                    }
                }
            }
        }
    })
}
