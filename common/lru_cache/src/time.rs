use fnv::FnvHashMap;
use std::collections::VecDeque;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// A time-based LRU cache for fast duplicate checks.
///
/// Entries expire `ttl` after their most recent insertion. When a capacity
/// is set, inserting beyond it evicts the least recently inserted live
/// entry first.
pub struct LRUTimeCache<Key> {
    /// Insertion time of each live key.
    map: FnvHashMap<Key, Instant>,
    /// Keys in insertion order. Re-inserted keys are appended again and the
    /// stale front entry is skipped lazily when it surfaces, by comparing
    /// its recorded instant against the map.
    list: VecDeque<(Key, Instant)>,
    /// How long entries remain live.
    ttl: Duration,
    /// Maximum number of live entries, if bounded.
    capacity: Option<usize>,
}

impl<Key> LRUTimeCache<Key>
where
    Key: Eq + Hash + Clone,
{
    pub fn new(ttl: Duration) -> Self {
        LRUTimeCache {
            map: FnvHashMap::default(),
            list: VecDeque::new(),
            ttl,
            capacity: None,
        }
    }

    /// A cache that additionally never holds more than `capacity` live
    /// entries.
    pub fn with_capacity(ttl: Duration, capacity: usize) -> Self {
        LRUTimeCache {
            map: FnvHashMap::default(),
            list: VecDeque::new(),
            ttl,
            capacity: Some(capacity),
        }
    }

    /// Inserts `key`, refreshing its expiry if already present.
    ///
    /// Returns `true` if the key was not already in the cache.
    pub fn insert(&mut self, key: Key) -> bool {
        self.prune();

        let now = Instant::now();
        let is_new = self.map.insert(key.clone(), now).is_none();
        self.list.push_back((key, now));

        if let Some(capacity) = self.capacity {
            while self.map.len() > capacity {
                if !self.pop_front() {
                    break;
                }
            }
        }

        is_new
    }

    /// Returns whether `key` is live, after removing expired entries.
    pub fn contains(&mut self, key: &Key) -> bool {
        self.prune();
        self.map.contains_key(key)
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.map.clear();
        self.list.clear();
    }

    /// The number of live entries.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Removes expired entries from the front of the insertion list.
    fn prune(&mut self) {
        let now = Instant::now();
        while let Some((key, inserted)) = self.list.pop_front() {
            // A mismatched instant means the key was re-inserted later and
            // this entry is stale; discard it without touching the map.
            if self.map.get(&key) != Some(&inserted) {
                continue;
            }
            if inserted + self.ttl <= now {
                self.map.remove(&key);
            } else {
                self.list.push_front((key, inserted));
                break;
            }
        }
    }

    /// Pops list entries until one that is current with the map has been
    /// removed. Returns `false` once the list is exhausted.
    fn pop_front(&mut self) -> bool {
        while let Some((key, inserted)) = self.list.pop_front() {
            // A mismatched instant means the key was re-inserted later and
            // this entry is stale; skip it without touching the map.
            if self.map.get(&key) == Some(&inserted) {
                self.map.remove(&key);
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn added_entries_exist() {
        let mut cache = LRUTimeCache::new(Duration::from_secs(10));

        assert!(cache.insert("t"));
        assert!(cache.insert("e"));

        assert!(!cache.insert("t"));
        assert!(!cache.insert("e"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn reinsertion_updates_expiry() {
        let mut cache = LRUTimeCache::new(Duration::from_millis(100));

        cache.insert("a");
        cache.insert("b");

        std::thread::sleep(Duration::from_millis(20));
        cache.insert("a");

        std::thread::sleep(Duration::from_millis(85));
        assert!(cache.contains(&"a"));
        assert!(!cache.contains(&"b"));

        std::thread::sleep(Duration::from_millis(16));
        assert!(!cache.contains(&"a"));
    }

    #[test]
    fn stale_front_entries_do_not_evict_live_keys() {
        let mut cache = LRUTimeCache::new(Duration::from_millis(100));

        cache.insert("a");
        std::thread::sleep(Duration::from_millis(40));
        cache.insert("b");
        // Refreshing "a" leaves its original entry stale at the front.
        cache.insert("a");

        // Past the original "a" entry's expiry, but not "b"'s.
        std::thread::sleep(Duration::from_millis(70));
        assert!(cache.contains(&"b"));
        assert!(cache.contains(&"a"));
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut cache = LRUTimeCache::with_capacity(Duration::from_secs(10), 2);

        cache.insert(1);
        cache.insert(2);
        cache.insert(3);

        assert!(!cache.contains(&1));
        assert!(cache.contains(&2));
        assert!(cache.contains(&3));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn capacity_eviction_skips_refreshed_keys() {
        let mut cache = LRUTimeCache::with_capacity(Duration::from_secs(10), 2);

        cache.insert(1);
        cache.insert(2);
        // Refresh 1 so 2 is now the oldest live entry.
        cache.insert(1);
        cache.insert(3);

        assert!(cache.contains(&1));
        assert!(!cache.contains(&2));
        assert!(cache.contains(&3));
    }

    #[test]
    fn clear_empties_cache() {
        let mut cache = LRUTimeCache::new(Duration::from_secs(10));
        cache.insert("x");
        cache.clear();
        assert!(cache.is_empty());
        assert!(!cache.contains(&"x"));
    }
}
