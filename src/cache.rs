use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    fetched_at: Instant,
}

/// Time-bounded read cache with explicit invalidation.
///
/// The TTL is supplied per lookup so different flows can accept different
/// staleness over the same entry. Owned by the request loop; no locking.
pub struct ReadCache<K, V> {
    entries: HashMap<K, Entry<V>>,
}

impl<K: Eq + Hash + Clone, V: Clone> Default for ReadCache<K, V> {
    fn default() -> Self {
        ReadCache {
            entries: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> ReadCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value if it was fetched less than `ttl` before `now`.
    pub fn get(&self, key: &K, ttl: Duration, now: Instant) -> Option<V> {
        let entry = self.entries.get(key)?;
        if now.saturating_duration_since(entry.fetched_at) < ttl {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    pub fn insert(&mut self, key: K, value: V, now: Instant) {
        self.entries.insert(
            key,
            Entry {
                value,
                fetched_at: now,
            },
        );
    }

    /// Cache-through read: serves a fresh entry or runs `fetch` and stores
    /// its result. Failed fetches are not cached.
    pub fn get_or_fetch<E>(
        &mut self,
        key: &K,
        ttl: Duration,
        now: Instant,
        fetch: impl FnOnce() -> Result<V, E>,
    ) -> Result<(V, bool), E> {
        if let Some(v) = self.get(key, ttl, now) {
            return Ok((v, true));
        }
        let v = fetch()?;
        self.insert(key.clone(), v.clone(), now);
        Ok((v, false))
    }

    pub fn invalidate(&mut self, key: &K) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
