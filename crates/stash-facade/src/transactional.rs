//! Transactional cache facade.
//!
//! [`TransactionalCache`] ties cache mutation visibility to a unit of work.
//! Inside a unit of work, `store`, `remove`, `remove_all` and `clear` are
//! recorded as pending mutations. Commit hands them to the backend as one
//! batch, applied in registration order: either all of them take effect or,
//! on failure, the backend is restored to its state before the commit.
//! Rollback discards them unapplied. Reads inside the unit of work see the
//! pending mutations before the backend.
//!
//! Outside a unit of work every mutation is applied immediately.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use stash_cache::{
    CacheError, CacheId, CachedItem, Characteristics, Clock, KeyedCacheStore, StoreRegistry,
    SystemClock,
};
use tracing::{debug, warn};

use crate::TransactionListener;
use crate::mutation::{Mutation, Shadow};

/// Cache facade whose mutations follow an enclosing unit of work.
///
/// The backend is resolved through the [`StoreRegistry`] on first use and kept
/// for the lifetime of the facade. A failed resolution is not remembered; the
/// next operation tries again.
///
/// A facade belongs to one unit of work at a time and is not shared between
/// threads; the backend behind it is.
///
/// ```
/// use std::sync::Arc;
/// use stash_cache::{CacheId, CachedItem, MemoryRegistry};
/// use stash_facade::TransactionalCache;
///
/// let mut cache = TransactionalCache::new(Arc::new(MemoryRegistry::new()), "responses", true);
/// let id = CacheId::new("1", "example.com").with_path_str("/blog");
///
/// cache.begin();
/// cache.store(&id, CachedItem::new("<html></html>"))?;
/// assert!(cache.get(&id)?.is_some()); // visible to its own unit of work
/// cache.rollback();
///
/// assert!(cache.get(&id)?.is_none()); // never reached the backend
/// # Ok::<(), stash_cache::CacheError>(())
/// ```
pub struct TransactionalCache {
    registry: Arc<dyn StoreRegistry>,
    store_name: String,
    shared: bool,
    clock: Arc<dyn Clock>,
    backend: Option<Arc<dyn KeyedCacheStore>>,
    pending: Vec<Mutation>,
    in_unit_of_work: bool,
}

impl TransactionalCache {
    /// Create a facade over the store `store_name` resolved from `registry`.
    #[must_use]
    pub fn new(registry: Arc<dyn StoreRegistry>, store_name: impl Into<String>, shared: bool) -> Self {
        Self {
            registry,
            store_name: store_name.into(),
            shared,
            clock: Arc::new(SystemClock),
            backend: None,
            pending: Vec::new(),
            in_unit_of_work: false,
        }
    }

    /// Use `clock` as the `as_of` time for [`TransactionalCache::get`].
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    pub fn is_shared(&self) -> bool {
        self.shared
    }

    pub fn in_unit_of_work(&self) -> bool {
        self.in_unit_of_work
    }

    /// Number of mutations waiting for commit.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn backend(&mut self) -> Result<Arc<dyn KeyedCacheStore>, CacheError> {
        if let Some(backend) = &self.backend {
            return Ok(Arc::clone(backend));
        }
        let backend = self.registry.resolve(&self.store_name, self.shared)?;
        debug!(
            store = %self.store_name,
            shared = self.shared,
            "resolved cache backend"
        );
        self.backend = Some(Arc::clone(&backend));
        Ok(backend)
    }

    /// Look up `id` as of now.
    pub fn get(&mut self, id: &CacheId) -> Result<Option<CachedItem>, CacheError> {
        let now = self.now();
        self.get_at(id, now)
    }

    /// Look up `id`, treating items that expired before `as_of` as misses.
    ///
    /// Pending mutations of the current unit of work shadow the backend.
    pub fn get_at(
        &mut self,
        id: &CacheId,
        as_of: DateTime<Utc>,
    ) -> Result<Option<CachedItem>, CacheError> {
        let name = id.name();
        let characteristics = id.characteristics();
        let key = characteristics.stable_key()?;

        let shadow = self
            .pending
            .iter()
            .rev()
            .find_map(|mutation| mutation.shadow(&name, &key, characteristics));
        if let Some(shadow) = shadow {
            return Ok(match shadow {
                Shadow::Stored(item) if !item.is_expired_at(as_of) => Some(item.clone()),
                Shadow::Stored(_) | Shadow::Removed => None,
            });
        }

        self.backend()?.get(&name, characteristics, Some(as_of))
    }

    /// Store `item` under `id`.
    pub fn store(&mut self, id: &CacheId, item: CachedItem) -> Result<(), CacheError> {
        let mutation = Mutation::store(id.name(), id.characteristics().clone(), item)?;
        self.submit(mutation)
    }

    /// Remove the entry stored under exactly `id`.
    pub fn remove(&mut self, id: &CacheId) -> Result<(), CacheError> {
        let mutation = Mutation::remove(id.name(), id.characteristics().clone())?;
        self.submit(mutation)
    }

    /// Remove every entry under `name` (any name if `None`) whose
    /// characteristics contain all pairs of `partial`.
    ///
    /// Use [`CacheId::name`] to address all variants of one path.
    pub fn remove_all(
        &mut self,
        name: Option<&str>,
        partial: &Characteristics,
    ) -> Result<(), CacheError> {
        let mutation = Mutation::remove_all(name.map(str::to_owned), partial.clone())?;
        self.submit(mutation)
    }

    /// Remove everything in the backing store.
    pub fn clear(&mut self) -> Result<(), CacheError> {
        self.submit(Mutation::clear())
    }

    /// Sweep entries written longer than `max_age` ago.
    ///
    /// Maintenance is applied immediately, even inside a unit of work.
    pub fn garbage_collect(&mut self, max_age: Duration) -> Result<usize, CacheError> {
        self.backend()?.garbage_collect(max_age)
    }

    /// Record or apply a mutation.
    ///
    /// The backend is resolved up front so that an unavailable backend fails
    /// the call that caused it, not the later commit.
    fn submit(&mut self, mutation: Mutation) -> Result<(), CacheError> {
        let backend = self.backend()?;
        if self.in_unit_of_work {
            debug!(kind = mutation.kind(), "deferring cache mutation");
            self.pending.push(mutation);
            Ok(())
        } else {
            mutation.into_op().apply(backend.as_ref())
        }
    }

    /// Open a unit of work. Opening one while another is open joins it.
    pub fn begin(&mut self) {
        if self.in_unit_of_work {
            debug!(store = %self.store_name, "unit of work already open");
            return;
        }
        self.in_unit_of_work = true;
    }

    /// Apply pending mutations as one batch and close the unit of work.
    ///
    /// Mutations apply in registration order. If the backend fails partway,
    /// what was already applied is undone and the error is returned, so the
    /// unit of work takes effect entirely or not at all. The unit of work is
    /// closed either way.
    pub fn commit(&mut self) -> Result<(), CacheError> {
        self.in_unit_of_work = false;
        let pending = std::mem::take(&mut self.pending);
        if pending.is_empty() {
            return Ok(());
        }

        let count = pending.len();
        let backend = self.backend()?;
        let batch = pending.into_iter().map(Mutation::into_op).collect();
        if let Err(err) = backend.apply_batch(batch) {
            warn!(
                store = %self.store_name,
                count,
                "cache commit failed, unit of work discarded: {err}"
            );
            return Err(err);
        }
        debug!(store = %self.store_name, count, "committed cache mutations");
        Ok(())
    }

    /// Discard pending mutations and close the unit of work.
    pub fn rollback(&mut self) {
        self.in_unit_of_work = false;
        let discarded = self.pending.len();
        self.pending.clear();
        debug!(store = %self.store_name, discarded, "rolled back cache mutations");
    }

    /// Run `work` inside a unit of work.
    ///
    /// Commits when `work` returns `Ok`, rolls back when it returns `Err`.
    pub fn within<T, E, F>(&mut self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<CacheError>,
    {
        self.begin();
        match work(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(err) => {
                self.rollback();
                Err(err)
            }
        }
    }
}

impl TransactionListener for TransactionalCache {
    fn on_begin(&mut self) {
        self.begin();
    }

    fn on_commit(&mut self) -> Result<(), CacheError> {
        self.commit()
    }

    fn on_rollback(&mut self) {
        self.rollback();
    }
}

impl Drop for TransactionalCache {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            warn!(
                store = %self.store_name,
                discarded = self.pending.len(),
                "unit of work dropped without commit, discarding cache mutations"
            );
        }
    }
}
