//! In-memory store and registry.
//!
//! [`MemoryStore`] keeps entries in a two-level map, `name -> key -> entry`,
//! behind a single `RwLock`. Every operation holds the lock for its full
//! duration, which gives entry-level atomicity (and store-level atomicity for
//! bulk removal and batches as a side effect).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::clock::{Clock, SystemClock, age_cutoff};
use crate::lock::{rw_read, rw_write};
use crate::store::{KeyedCacheStore, StoreRegistry};
use crate::{CacheEntry, CacheError, CacheMutation, CachedItem, Characteristics};

struct Entry {
    characteristics: Characteristics,
    item: CachedItem,
    written_at: DateTime<Utc>,
}

type Names = HashMap<String, HashMap<String, Entry>>;

/// Process-local [`KeyedCacheStore`].
pub struct MemoryStore {
    names: RwLock<Names>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store stamped by the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store stamped by `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            names: RwLock::new(HashMap::new()),
            clock,
        }
    }
}

impl KeyedCacheStore for MemoryStore {
    fn get(
        &self,
        name: &str,
        characteristics: &Characteristics,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<Option<CachedItem>, CacheError> {
        let key = characteristics.stable_key()?;
        let names = rw_read(&self.names, "memory.get");
        let Some(entry) = names.get(name).and_then(|entries| entries.get(&key)) else {
            return Ok(None);
        };
        if as_of.is_some_and(|as_of| entry.item.is_expired_at(as_of)) {
            return Ok(None);
        }
        Ok(Some(entry.item.clone()))
    }

    fn store(
        &self,
        name: &str,
        characteristics: &Characteristics,
        item: CachedItem,
    ) -> Result<(), CacheError> {
        let key = characteristics.stable_key()?;
        let entry = Entry {
            characteristics: characteristics.clone(),
            item,
            written_at: self.clock.now(),
        };
        insert_entry(&mut rw_write(&self.names, "memory.store"), name, key, entry);
        Ok(())
    }

    fn remove(&self, name: &str, characteristics: &Characteristics) -> Result<(), CacheError> {
        let key = characteristics.stable_key()?;
        remove_entry(&mut rw_write(&self.names, "memory.remove"), name, &key);
        Ok(())
    }

    fn remove_all(
        &self,
        name: Option<&str>,
        partial: &Characteristics,
    ) -> Result<usize, CacheError> {
        partial.validate()?;
        let mut names = rw_write(&self.names, "memory.remove_all");
        let removed = retain_entries(&mut names, name, |entry| {
            !entry.characteristics.contains_all(partial)
        });
        Ok(removed)
    }

    fn clear(&self) -> Result<(), CacheError> {
        rw_write(&self.names, "memory.clear").clear();
        Ok(())
    }

    fn garbage_collect(&self, max_age: Duration) -> Result<usize, CacheError> {
        let Some(cutoff) = age_cutoff(self.clock.now(), max_age) else {
            return Ok(0);
        };
        let mut names = rw_write(&self.names, "memory.garbage_collect");
        let removed = retain_entries(&mut names, None, |entry| entry.written_at >= cutoff);
        if removed > 0 {
            tracing::info!(removed, ?max_age, "garbage collected memory store");
        }
        Ok(removed)
    }

    fn len(&self) -> Result<usize, CacheError> {
        Ok(rw_read(&self.names, "memory.len")
            .values()
            .map(HashMap::len)
            .sum())
    }

    fn entries(
        &self,
        name: Option<&str>,
        partial: &Characteristics,
    ) -> Result<Vec<CacheEntry>, CacheError> {
        partial.validate()?;
        let names = rw_read(&self.names, "memory.entries");
        let mut found = Vec::new();
        for (entry_name, entries) in names.iter() {
            if name.is_some_and(|name| name != entry_name) {
                continue;
            }
            for entry in entries.values() {
                if entry.characteristics.contains_all(partial) {
                    found.push(CacheEntry {
                        name: entry_name.clone(),
                        characteristics: entry.characteristics.clone(),
                        item: entry.item.clone(),
                    });
                }
            }
        }
        Ok(found)
    }

    /// Keys are validated before the write lock is taken, so the batch is
    /// applied under one lock acquisition and readers see all of it or none.
    fn apply_batch(&self, batch: Vec<CacheMutation>) -> Result<(), CacheError> {
        let mut prepared = Vec::with_capacity(batch.len());
        for mutation in batch {
            let key = match &mutation {
                CacheMutation::Store {
                    characteristics, ..
                }
                | CacheMutation::Remove {
                    characteristics, ..
                } => Some(characteristics.stable_key()?),
                CacheMutation::RemoveAll { partial, .. } => {
                    partial.validate()?;
                    None
                }
                CacheMutation::Clear => None,
            };
            prepared.push((key, mutation));
        }

        let written_at = self.clock.now();
        let mut names = rw_write(&self.names, "memory.apply_batch");
        for (key, mutation) in prepared {
            match (mutation, key) {
                (
                    CacheMutation::Store {
                        name,
                        characteristics,
                        item,
                    },
                    Some(key),
                ) => {
                    let entry = Entry {
                        characteristics,
                        item,
                        written_at,
                    };
                    insert_entry(&mut names, &name, key, entry);
                }
                (CacheMutation::Remove { name, .. }, Some(key)) => {
                    remove_entry(&mut names, &name, &key);
                }
                (CacheMutation::RemoveAll { name, partial }, _) => {
                    retain_entries(&mut names, name.as_deref(), |entry| {
                        !entry.characteristics.contains_all(&partial)
                    });
                }
                (CacheMutation::Clear, _) => names.clear(),
                (CacheMutation::Store { .. } | CacheMutation::Remove { .. }, None) => {}
            }
        }
        Ok(())
    }
}

fn insert_entry(names: &mut Names, name: &str, key: String, entry: Entry) {
    names.entry(name.to_owned()).or_default().insert(key, entry);
}

fn remove_entry(names: &mut Names, name: &str, key: &str) {
    if let Some(entries) = names.get_mut(name) {
        entries.remove(key);
        if entries.is_empty() {
            names.remove(name);
        }
    }
}

/// Keep entries matching `keep` under `name` (or all names), dropping emptied
/// names. Returns the number of entries dropped.
fn retain_entries(names: &mut Names, name: Option<&str>, keep: impl Fn(&Entry) -> bool) -> usize {
    let mut removed = 0;
    names.retain(|entry_name, entries| {
        if name.is_some_and(|name| name != entry_name) {
            return true;
        }
        let before = entries.len();
        entries.retain(|_, entry| keep(entry));
        removed += before - entries.len();
        !entries.is_empty()
    });
    removed
}

/// [`StoreRegistry`] handing out [`MemoryStore`]s.
///
/// Each `(name, shared)` pair maps to one store for the lifetime of the
/// registry; shared and non-shared stores of the same name are distinct.
pub struct MemoryRegistry {
    stores: RwLock<HashMap<(String, bool), Arc<MemoryStore>>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a registry whose stores are stamped by `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            stores: RwLock::new(HashMap::new()),
            clock,
        }
    }
}

impl StoreRegistry for MemoryRegistry {
    fn resolve(&self, name: &str, shared: bool) -> Result<Arc<dyn KeyedCacheStore>, CacheError> {
        let key = (name.to_owned(), shared);
        if let Some(store) = rw_read(&self.stores, "memory_registry.resolve").get(&key) {
            return Ok(Arc::clone(store) as Arc<dyn KeyedCacheStore>);
        }
        let mut stores = rw_write(&self.stores, "memory_registry.resolve");
        let store = stores.entry(key).or_insert_with(|| {
            tracing::debug!(name, shared, "creating memory store");
            Arc::new(MemoryStore::with_clock(Arc::clone(&self.clock)))
        });
        Ok(Arc::clone(store) as Arc<dyn KeyedCacheStore>)
    }
}
