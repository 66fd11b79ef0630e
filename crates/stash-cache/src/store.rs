//! Store contract and backend registry.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::batch::{CacheEntry, CacheMutation, apply_with_undo};
use crate::{CacheError, CachedItem, Characteristics};

/// A keyed cache store: the backend contract.
///
/// Entries are addressed by `(name, characteristics)`. Implementations are
/// shared across units of work and must keep single-entry operations atomic:
/// concurrent access to different keys never interferes, and concurrent writes
/// to the same key resolve last-write-wins.
///
/// Backend failures surface as [`CacheError::BackendUnavailable`]; they are
/// never reported as a miss.
pub trait KeyedCacheStore: Send + Sync {
    /// Look up the entry stored under exactly these characteristics.
    ///
    /// When `as_of` is given, an entry whose expiry lies before it is a miss
    /// even though it is physically present.
    fn get(
        &self,
        name: &str,
        characteristics: &Characteristics,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<Option<CachedItem>, CacheError>;

    /// Insert or replace the entry, recording the write time.
    fn store(
        &self,
        name: &str,
        characteristics: &Characteristics,
        item: CachedItem,
    ) -> Result<(), CacheError>;

    /// Delete the exact entry. No-op if absent.
    fn remove(&self, name: &str, characteristics: &Characteristics) -> Result<(), CacheError>;

    /// Delete every entry under `name` (or under any name if `None`) whose
    /// characteristics contain all pairs of `partial`.
    ///
    /// Returns the number of entries removed.
    fn remove_all(&self, name: Option<&str>, partial: &Characteristics)
    -> Result<usize, CacheError>;

    /// Delete everything in this store.
    fn clear(&self) -> Result<(), CacheError>;

    /// Delete entries written longer than `max_age` ago, regardless of expiry.
    ///
    /// Returns the number of entries removed.
    fn garbage_collect(&self, max_age: Duration) -> Result<usize, CacheError>;

    /// Number of entries physically present, expired ones included.
    fn len(&self) -> Result<usize, CacheError>;

    /// Every entry under `name` (or under any name if `None`) whose
    /// characteristics contain all pairs of `partial`, expired ones included.
    fn entries(
        &self,
        name: Option<&str>,
        partial: &Characteristics,
    ) -> Result<Vec<CacheEntry>, CacheError>;

    /// Apply `batch` in order as one unit.
    ///
    /// On success every mutation has taken effect; on error the store holds
    /// what it held before the batch. The default applies mutations one at a
    /// time and undoes the applied prefix on failure (see
    /// [`apply_with_undo`]); backends that can publish a batch in one step
    /// override it.
    fn apply_batch(&self, batch: Vec<CacheMutation>) -> Result<(), CacheError> {
        apply_with_undo(self, batch)
    }

    fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len()? == 0)
    }
}

/// Resolves concrete stores by logical name and sharing mode.
///
/// Stores resolved with different `shared` flags are distinct even when their
/// names match. Calling `resolve` repeatedly with the same arguments yields
/// handles onto the same underlying data.
pub trait StoreRegistry: Send + Sync {
    fn resolve(&self, name: &str, shared: bool) -> Result<Arc<dyn KeyedCacheStore>, CacheError>;
}
