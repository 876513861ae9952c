use lru_cache::LRUTimeCache;
use std::time::Duration;

/// Roughly one year: a seen message stays seen for the life of the process
/// unless evicted under memory pressure.
pub const SEEN_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Entry bound applied to the default caches; oldest entries go first when
/// it is reached.
pub const DEFAULT_SEEN_CACHE_CAPACITY: usize = 65_536;

/// The duplicate-tracking interface of the gossip pipelines.
///
/// Kept behind a trait so tests can substitute an empty or tightly bounded
/// variant.
pub trait SeenCache: Send {
    /// Whether `key` is currently marked seen.
    fn contains(&mut self, key: &[u8]) -> bool;

    /// Marks `key` seen.
    fn insert(&mut self, key: Vec<u8>);

    /// Forgets everything.
    fn clear(&mut self);
}

impl SeenCache for LRUTimeCache<Vec<u8>> {
    fn contains(&mut self, key: &[u8]) -> bool {
        LRUTimeCache::contains(self, &key.to_vec())
    }

    fn insert(&mut self, key: Vec<u8>) {
        LRUTimeCache::insert(self, key);
    }

    fn clear(&mut self) {
        LRUTimeCache::clear(self)
    }
}

/// The default seen-cache: one-year TTL, LRU-bounded.
pub fn default_seen_cache() -> Box<dyn SeenCache> {
    Box::new(LRUTimeCache::with_capacity(
        SEEN_TTL,
        DEFAULT_SEEN_CACHE_CAPACITY,
    ))
}
