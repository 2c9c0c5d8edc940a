use crate::entry::CachedResponse;
use http::Method;
use std::sync::Arc;
use url::Url;

/// One named key → response store.
///
/// Every method is atomic for a single key. Nothing in this crate needs a
/// stronger guarantee: refreshing an entry is a single `put`, and two racing
/// writers for the same key simply leave whichever landed last.
pub trait Cache: Send + Sync {
    /// Look up a stored response.
    fn get(&self, key: &str) -> Option<Arc<CachedResponse>>;

    /// Store a response, replacing any previous entry for `key`.
    fn put(&self, key: String, value: CachedResponse);

    /// Remove an entry. Returns whether it existed.
    fn delete(&self, key: &str) -> bool;

    /// Every key currently stored.
    fn keys(&self) -> Vec<String>;

    /// Number of entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of all body lengths.
    fn total_bytes(&self) -> u64;
}

/// The set of named caches (the platform's `caches` object).
pub trait CacheStorage: Send + Sync {
    /// Open a cache, creating it if it does not exist yet.
    fn open(&self, name: &str) -> Arc<dyn Cache>;

    fn has(&self, name: &str) -> bool;

    /// Drop a whole cache. Returns whether it existed.
    fn delete(&self, name: &str) -> bool;

    /// Names of all caches, sorted.
    fn keys(&self) -> Vec<String>;

    /// First match for `key` across all caches, in name order.
    fn lookup(&self, key: &str) -> Option<Arc<CachedResponse>> {
        self.keys()
            .iter()
            .filter_map(|name| self.open(name).get(key))
            .next()
    }

    /// Total body bytes across every cache.
    fn total_bytes(&self) -> u64 {
        self.keys()
            .iter()
            .map(|name| self.open(name).total_bytes())
            .sum()
    }
}

/// Canonical cache key for a request: method plus URL without fragment.
pub fn cache_key(method: &Method, url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    format!("{} {}", method, url)
}
