use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::{Arc, Mutex};

use crate::{BatchOp, WriteBatch};

type NamespaceMap = BTreeMap<Vec<u8>, Vec<u8>>;

/// The local ordered store. All namespaces share one mutex so a
/// [`WriteBatch`] spanning several namespaces still applies atomically.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<HashMap<String, NamespaceMap>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    #[must_use]
    pub fn namespace(&self, name: &str) -> Namespace {
        Namespace {
            store: self.clone(),
            name: Arc::from(name),
        }
    }

    /// Applies a batch under the store lock.
    pub(crate) fn apply(&self, batch: WriteBatch) {
        let mut maps = self.inner.lock().expect("lock is poisoned");
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { ns, key, value } => {
                    maps.entry(ns).or_default().insert(key, value);
                }
                BatchOp::Remove { ns, key } => {
                    if let Some(map) = maps.get_mut(&ns) {
                        map.remove(&key);
                    }
                }
            }
        }
    }

    fn with_map<R>(&self, name: &str, f: impl FnOnce(Option<&NamespaceMap>) -> R) -> R {
        let maps = self.inner.lock().expect("lock is poisoned");
        f(maps.get(name))
    }
}

/// A handle onto one named keyspace of a store.
#[derive(Debug, Clone)]
pub struct Namespace {
    store: MemoryStore,
    name: Arc<str>,
}

impl Namespace {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Looks up a key, returning `None` when absent.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.store
            .with_map(&self.name, |map| map?.get(key).cloned())
    }

    /// A cursor over the whole namespace, positioned before the first
    /// entry.
    #[must_use]
    pub fn cursor(&self) -> Cursor {
        let mut cursor = Cursor {
            ns: self.clone(),
            end: None,
            current: None,
        };
        cursor.seek_to_first();
        cursor
    }

    /// A cursor over `[start, end)`, positioned at the first entry in the
    /// range.
    #[must_use]
    pub fn cursor_range(&self, start: &[u8], end: &[u8]) -> Cursor {
        let mut cursor = Cursor {
            ns: self.clone(),
            end: Some(end.to_vec()),
            current: None,
        };
        cursor.seek(start);
        cursor
    }

    /// Approximate bytes stored in `[start, end)`: the sum of key and
    /// value lengths.
    #[must_use]
    pub fn space_used(&self, start: &[u8], end: &[u8]) -> u64 {
        self.store.with_map(&self.name, |map| {
            map.map_or(0, |map| {
                map.range::<[u8], _>((Bound::Included(start), Bound::Excluded(end)))
                    .map(|(k, v)| (k.len() + v.len()) as u64)
                    .sum()
            })
        })
    }
}

/// An ordered cursor over a namespace. The cursor holds no lock between
/// calls; every movement re-reads the map relative to the current key,
/// so concurrent mutation never invalidates it.
#[derive(Debug)]
pub struct Cursor {
    ns: Namespace,
    end: Option<Vec<u8>>,
    current: Option<(Vec<u8>, Vec<u8>)>,
}

impl Cursor {
    /// Positions the cursor at the first entry with key >= `key`.
    pub fn seek(&mut self, key: &[u8]) {
        self.current = self.ns.store.with_map(&self.ns.name, |map| {
            map?.range::<[u8], _>((Bound::Included(key), Bound::Unbounded))
                .next()
                .map(|(k, v)| (k.clone(), v.clone()))
        });
    }

    pub fn seek_to_first(&mut self) {
        self.current = self.ns.store.with_map(&self.ns.name, |map| {
            map?.iter().next().map(|(k, v)| (k.clone(), v.clone()))
        });
    }

    pub fn seek_to_last(&mut self) {
        self.current = self.ns.store.with_map(&self.ns.name, |map| {
            map?.iter().next_back().map(|(k, v)| (k.clone(), v.clone()))
        });
    }

    /// Advances past the current key.
    pub fn next(&mut self) {
        let Some((key, _)) = self.current.take() else {
            return;
        };
        self.current = self.ns.store.with_map(&self.ns.name, |map| {
            map?.range::<[u8], _>((Bound::Excluded(key.as_slice()), Bound::Unbounded))
                .next()
                .map(|(k, v)| (k.clone(), v.clone()))
        });
    }

    /// Steps back before the current key.
    pub fn prev(&mut self) {
        let Some((key, _)) = self.current.take() else {
            return;
        };
        self.current = self.ns.store.with_map(&self.ns.name, |map| {
            map?.range::<[u8], _>((Bound::Unbounded, Bound::Excluded(key.as_slice())))
                .next_back()
                .map(|(k, v)| (k.clone(), v.clone()))
        });
    }

    /// True while the cursor points at an entry inside its range.
    #[must_use]
    pub fn valid(&self) -> bool {
        match (&self.current, &self.end) {
            (Some((key, _)), Some(end)) => key < end,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    #[must_use]
    pub fn key(&self) -> Option<&[u8]> {
        if !self.valid() {
            return None;
        }
        self.current.as_ref().map(|(k, _)| k.as_slice())
    }

    #[must_use]
    pub fn value(&self) -> Option<&[u8]> {
        if !self.valid() {
            return None;
        }
        self.current.as_ref().map(|(_, v)| v.as_slice())
    }
}
