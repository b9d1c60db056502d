use chrono::{DateTime, Utc};
use dashmap::DashMap;
use getset::Getters;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::Error;
use crate::key::RequestKey;
use crate::response::Response;

/// Configuration for the response cache
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether caching is enabled
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Most recent successful response for a key
#[derive(Clone, Debug, Getters)]
#[getset(get = "pub")]
pub struct CacheEntry {
    key: RequestKey,
    response: Arc<Response>,
    stored_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(key: RequestKey, response: Arc<Response>) -> Self {
        Self {
            key,
            response,
            stored_at: Utc::now(),
        }
    }
}

/// In-memory response cache keyed by request identity.
///
/// Entries never expire on their own: freshness is decided by the fetch
/// policy, and entries only go away through [`ResponseCache::invalidate`] or
/// [`ResponseCache::clear`].
#[derive(Default)]
pub struct ResponseCache {
    cache: DashMap<RequestKey, CacheEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
    pub config: CacheConfig,
}

impl ResponseCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            cache: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            config,
        }
    }

    pub fn read(&self, key: &RequestKey) -> Option<CacheEntry> {
        if !self.config.enabled {
            return None;
        }

        if let Some(entry) = self.cache.get(key) {
            log::debug!("Cache hit for key: {}", key);
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Some(entry.clone());
        }

        log::debug!("Cache miss for key: {}", key);
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn contains(&self, key: &RequestKey) -> bool {
        self.config.enabled && self.cache.contains_key(key)
    }

    /// Store a response, replacing whatever was cached for the key.
    pub fn write(&self, key: RequestKey, response: Arc<Response>) {
        if !self.config.enabled {
            return;
        }

        self.cache
            .insert(key.clone(), CacheEntry::new(key.clone(), response));
        log::debug!("Stored in cache with key: {}", key);
    }

    pub fn invalidate(&self, key: &RequestKey) -> Option<CacheEntry> {
        let removed = self.cache.remove(key).map(|(_, entry)| entry);
        if removed.is_some() {
            log::debug!("Invalidated cache entry for key: {}", key);
        }
        removed
    }

    /// Edit a cached response, e.g. after a mutation made elsewhere.
    /// Fails if the key has no cached response.
    ///
    /// The updater runs on a copy with no lock held, so it may use the cache
    /// itself. The edited copy replaces whatever is cached once it returns.
    pub fn update<F>(&self, key: &RequestKey, updater: F) -> Result<Arc<Response>, Error>
    where
        F: FnOnce(&mut Response),
    {
        let current = self
            .cache
            .get(key)
            .map(|entry| entry.response.clone())
            .ok_or_else(|| Error::NoCachedResponse(key.clone()))?;

        let mut response = (*current).clone();
        updater(&mut response);
        let response = Arc::new(response);
        self.cache
            .insert(key.clone(), CacheEntry::new(key.clone(), response.clone()));
        log::debug!("Updated cache entry for key: {}", key);
        Ok(response)
    }

    /// Like [`ResponseCache::update`], but allowed to create the entry when
    /// none exists yet. A disabled cache stores nothing and the updater sees
    /// `None`.
    pub fn update_or_insert<F>(&self, key: &RequestKey, updater: F) -> Arc<Response>
    where
        F: FnOnce(Option<&Response>) -> Response,
    {
        if !self.config.enabled {
            return Arc::new(updater(None));
        }

        let current = self.cache.get(key).map(|entry| entry.response.clone());
        let response = Arc::new(updater(current.as_deref()));
        self.cache
            .insert(key.clone(), CacheEntry::new(key.clone(), response.clone()));
        log::debug!("Upserted cache entry for key: {}", key);
        response
    }

    /// Clear all cache entries
    pub fn clear(&self) {
        self.cache.clear();
        log::info!("Response cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            total_entries: self.cache.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheStats {
    pub total_entries: usize,
    pub hits: u64,
    pub misses: u64,
}
