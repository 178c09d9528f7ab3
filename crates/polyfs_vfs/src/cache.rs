use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::Arc;

const DEFAULT_SIZE_LIMIT: usize = 1024;

/// An LRU cache from ids to shared values. Entries that are still
/// referenced outside the cache are never evicted; callers that hold an
/// `Arc` returned from [`FileCache::find`] keep the entry busy.
#[derive(Debug)]
pub struct FileCache<K, V> {
    entries: HashMap<K, Entry<V>>,
    order: BTreeMap<u64, K>,
    next_stamp: u64,
    size_limit: usize,
}

#[derive(Debug)]
struct Entry<V> {
    value: Arc<V>,
    stamp: u64,
}

impl<K: Eq + Hash + Clone, V> Default for FileCache<K, V> {
    fn default() -> Self {
        Self::new(DEFAULT_SIZE_LIMIT)
    }
}

impl<K: Eq + Hash + Clone, V> FileCache<K, V> {
    #[must_use]
    pub fn new(size_limit: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_stamp: 0,
            size_limit,
        }
    }

    /// Looks up an entry, refreshing its recency on a hit.
    pub fn find(&mut self, id: &K) -> Option<Arc<V>> {
        let stamp = self.next_stamp;
        let entry = self.entries.get_mut(id)?;
        self.order.remove(&entry.stamp);
        entry.stamp = stamp;
        self.next_stamp += 1;
        self.order.insert(stamp, id.clone());
        Some(Arc::clone(&entry.value))
    }

    /// Inserts or replaces an entry, evicting cold idle entries if the
    /// cache is over its limit.
    pub fn insert(&mut self, id: K, value: Arc<V>) {
        let stamp = self.next_stamp;
        self.next_stamp += 1;
        if let Some(old) = self.entries.insert(
            id.clone(),
            Entry {
                value,
                stamp,
            },
        ) {
            self.order.remove(&old.stamp);
        }
        self.order.insert(stamp, id);
        self.expire();
    }

    pub fn remove(&mut self, id: &K) -> Option<Arc<V>> {
        let entry = self.entries.remove(id)?;
        self.order.remove(&entry.stamp);
        Some(entry.value)
    }

    #[must_use]
    pub fn contains(&self, id: &K) -> bool {
        self.entries.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn set_size_limit(&mut self, limit: usize) {
        self.size_limit = limit;
        self.expire();
    }

    fn expire(&mut self) {
        if self.entries.len() <= self.size_limit {
            return;
        }
        let mut evict = Vec::new();
        for (stamp, id) in &self.order {
            if self.entries.len() - evict.len() <= self.size_limit {
                break;
            }
            let entry = &self.entries[id];
            // A strong count of one means only the cache holds the value.
            if Arc::strong_count(&entry.value) == 1 {
                evict.push((*stamp, id.clone()));
            }
        }
        for (stamp, id) in evict {
            self.order.remove(&stamp);
            self.entries.remove(&id);
        }
    }
}
