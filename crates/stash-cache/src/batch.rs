//! Batched mutations applied as one unit.
//!
//! A batch either takes full effect or leaves the store as it found it.
//! [`apply_with_undo`] is the generic strategy every backend gets by default:
//! before each mutation it captures the prior state of the entries that
//! mutation touches, and if any step fails it replays those captures in
//! reverse.

use crate::store::KeyedCacheStore;
use crate::{CacheError, CachedItem, Characteristics};

/// One entry of a store, as returned by [`KeyedCacheStore::entries`].
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub name: String,
    pub characteristics: Characteristics,
    pub item: CachedItem,
}

/// A store mutation that can be queued and applied later.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheMutation {
    Store {
        name: String,
        characteristics: Characteristics,
        item: CachedItem,
    },
    Remove {
        name: String,
        characteristics: Characteristics,
    },
    RemoveAll {
        name: Option<String>,
        partial: Characteristics,
    },
    Clear,
}

impl CacheMutation {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Store { .. } => "store",
            Self::Remove { .. } => "remove",
            Self::RemoveAll { .. } => "remove_all",
            Self::Clear => "clear",
        }
    }

    /// Apply this mutation on its own.
    pub fn apply<S: KeyedCacheStore + ?Sized>(self, store: &S) -> Result<(), CacheError> {
        match self {
            Self::Store {
                name,
                characteristics,
                item,
            } => store.store(&name, &characteristics, item),
            Self::Remove {
                name,
                characteristics,
            } => store.remove(&name, &characteristics),
            Self::RemoveAll { name, partial } => {
                store.remove_all(name.as_deref(), &partial).map(|_| ())
            }
            Self::Clear => store.clear(),
        }
    }
}

/// Reverses one effect of a mutation.
enum Undo {
    Restore(CacheEntry),
    Discard {
        name: String,
        characteristics: Characteristics,
    },
}

/// Apply `batch` in order, restoring every touched entry if a step fails.
///
/// Restored entries are rewritten, so their write time is the time of the
/// restore. A failure while restoring is logged and does not mask the error
/// that caused it.
pub fn apply_with_undo<S: KeyedCacheStore + ?Sized>(
    store: &S,
    batch: Vec<CacheMutation>,
) -> Result<(), CacheError> {
    let mut undo = Vec::new();
    for mutation in batch {
        let kind = mutation.kind();
        let result = capture(store, &mutation, &mut undo).and_then(|()| mutation.apply(store));
        if let Err(err) = result {
            tracing::warn!(
                kind,
                restoring = undo.len(),
                "cache batch failed, restoring prior entries: {err}"
            );
            restore(store, undo);
            return Err(err);
        }
    }
    Ok(())
}

/// Record how to undo `mutation` against the current contents of `store`.
fn capture<S: KeyedCacheStore + ?Sized>(
    store: &S,
    mutation: &CacheMutation,
    undo: &mut Vec<Undo>,
) -> Result<(), CacheError> {
    match mutation {
        CacheMutation::Store {
            name,
            characteristics,
            ..
        }
        | CacheMutation::Remove {
            name,
            characteristics,
        } => match store.get(name, characteristics, None)? {
            Some(item) => undo.push(Undo::Restore(CacheEntry {
                name: name.clone(),
                characteristics: characteristics.clone(),
                item,
            })),
            None if matches!(mutation, CacheMutation::Store { .. }) => undo.push(Undo::Discard {
                name: name.clone(),
                characteristics: characteristics.clone(),
            }),
            None => {}
        },
        CacheMutation::RemoveAll { name, partial } => {
            undo.extend(
                store
                    .entries(name.as_deref(), partial)?
                    .into_iter()
                    .map(Undo::Restore),
            );
        }
        CacheMutation::Clear => {
            undo.extend(
                store
                    .entries(None, &Characteristics::new())?
                    .into_iter()
                    .map(Undo::Restore),
            );
        }
    }
    Ok(())
}

fn restore<S: KeyedCacheStore + ?Sized>(store: &S, undo: Vec<Undo>) {
    for step in undo.into_iter().rev() {
        let result = match step {
            Undo::Restore(entry) => store.store(&entry.name, &entry.characteristics, entry.item),
            Undo::Discard {
                name,
                characteristics,
            } => store.remove(&name, &characteristics),
        };
        if let Err(err) = result {
            tracing::warn!("failed to restore cache entry: {err}");
        }
    }
}
