use crate::entry::CachedResponse;
use crate::store::{Cache, CacheStorage};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Number of shards per cache. Must be a power of two for fast modulo via bitmask.
const NUM_SHARDS: usize = 16;
const SHARD_MASK: u64 = (NUM_SHARDS as u64) - 1;

/// In-memory named cache.
///
/// Keys are spread over 16 shards, each behind its own `RwLock`, so a
/// background revalidation writing one URL never blocks readers of another.
/// Shard selection uses `ahash` with fixed seeds.
pub struct MemoryCache {
    shards: Box<[RwLock<HashMap<String, Arc<CachedResponse>>>; NUM_SHARDS]>,
}

impl MemoryCache {
    pub fn new() -> Self {
        let shards: Vec<RwLock<HashMap<String, Arc<CachedResponse>>>> =
            (0..NUM_SHARDS).map(|_| RwLock::new(HashMap::new())).collect();

        let shards: Box<[RwLock<HashMap<String, Arc<CachedResponse>>>; NUM_SHARDS]> = shards
            .into_boxed_slice()
            .try_into()
            .unwrap_or_else(|_| unreachable!());

        Self { shards }
    }

    #[inline]
    fn shard_index(key: &str) -> usize {
        let hash = ahash::RandomState::with_seeds(1, 2, 3, 4).hash_one(key);
        (hash & SHARD_MASK) as usize
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<Arc<CachedResponse>> {
        let shard = self.shards[Self::shard_index(key)].read();
        shard.get(key).cloned()
    }

    fn put(&self, key: String, value: CachedResponse) {
        let mut shard = self.shards[Self::shard_index(&key)].write();
        shard.insert(key, Arc::new(value));
    }

    fn delete(&self, key: &str) -> bool {
        let mut shard = self.shards[Self::shard_index(key)].write();
        shard.remove(key).is_some()
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .shards
            .iter()
            .flat_map(|s| s.read().keys().cloned().collect::<Vec<_>>())
            .collect();
        keys.sort();
        keys
    }

    fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    fn total_bytes(&self) -> u64 {
        self.shards
            .iter()
            .map(|s| s.read().values().map(|r| r.size() as u64).sum::<u64>())
            .sum()
    }
}

/// In-memory set of named caches.
#[derive(Default)]
pub struct MemoryStorage {
    caches: RwLock<BTreeMap<String, Arc<MemoryCache>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStorage for MemoryStorage {
    fn open(&self, name: &str) -> Arc<dyn Cache> {
        if let Some(cache) = self.caches.read().get(name) {
            return Arc::clone(cache) as Arc<dyn Cache>;
        }
        let mut caches = self.caches.write();
        let cache = caches
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryCache::new()));
        Arc::clone(cache) as Arc<dyn Cache>
    }

    fn has(&self, name: &str) -> bool {
        self.caches.read().contains_key(name)
    }

    fn delete(&self, name: &str) -> bool {
        self.caches.write().remove(name).is_some()
    }

    fn keys(&self) -> Vec<String> {
        self.caches.read().keys().cloned().collect()
    }
}
