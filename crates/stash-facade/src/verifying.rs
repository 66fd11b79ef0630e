//! Verifying cache facade.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use stash_cache::{CacheError, CacheId, CachedItem, Characteristics};
use tracing::{debug, warn};

use crate::transactional::TransactionalCache;
use crate::verifier::{Verifier, VerifierLookup};
use crate::TransactionListener;

/// Wraps a [`TransactionalCache`] and re-validates hits through the verifier
/// named on each cached item.
///
/// Items without a verifier name are trusted on store expiry alone. Verifiers
/// are resolved through the [`VerifierLookup`] at most once per name for the
/// lifetime of the facade; failed lookups are retried on the next read.
pub struct VerifyingCache {
    inner: TransactionalCache,
    lookup: Arc<dyn VerifierLookup>,
    verifiers: HashMap<String, Arc<dyn Verifier>>,
}

impl VerifyingCache {
    #[must_use]
    pub fn new(inner: TransactionalCache, lookup: Arc<dyn VerifierLookup>) -> Self {
        Self {
            inner,
            lookup,
            verifiers: HashMap::new(),
        }
    }

    pub fn inner(&self) -> &TransactionalCache {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut TransactionalCache {
        &mut self.inner
    }

    #[must_use]
    pub fn into_inner(self) -> TransactionalCache {
        self.inner
    }

    fn verifier(&mut self, name: &str) -> Result<Arc<dyn Verifier>, CacheError> {
        if let Some(verifier) = self.verifiers.get(name) {
            return Ok(Arc::clone(verifier));
        }
        let verifier = self.lookup.lookup(name)?;
        debug!(verifier = name, "resolved cache verifier");
        self.verifiers.insert(name.to_owned(), Arc::clone(&verifier));
        Ok(verifier)
    }

    /// Look up `id` as of now and verify the hit.
    pub fn get(&mut self, id: &CacheId) -> Result<Option<CachedItem>, CacheError> {
        let now = self.inner.now();
        self.get_at(id, now)
    }

    /// Look up `id` as of `as_of` and verify the hit.
    ///
    /// A hit that fails verification is reported as a miss and removed from
    /// the cache on a best-effort basis.
    pub fn get_at(
        &mut self,
        id: &CacheId,
        as_of: DateTime<Utc>,
    ) -> Result<Option<CachedItem>, CacheError> {
        let Some(item) = self.inner.get_at(id, as_of)? else {
            return Ok(None);
        };
        let Some(name) = item.verifier() else {
            return Ok(Some(item));
        };

        let verifier = self.verifier(name)?;
        if verifier.verify_validity(id, &item) {
            return Ok(Some(item));
        }

        debug!(%id, verifier = name, "cached item failed verification");
        if let Err(err) = self.inner.remove(id) {
            warn!(%id, "failed to remove stale cache entry: {err}");
        }
        Ok(None)
    }

    pub fn store(&mut self, id: &CacheId, item: CachedItem) -> Result<(), CacheError> {
        self.inner.store(id, item)
    }

    pub fn remove(&mut self, id: &CacheId) -> Result<(), CacheError> {
        self.inner.remove(id)
    }

    pub fn remove_all(
        &mut self,
        name: Option<&str>,
        partial: &Characteristics,
    ) -> Result<(), CacheError> {
        self.inner.remove_all(name, partial)
    }

    pub fn clear(&mut self) -> Result<(), CacheError> {
        self.inner.clear()
    }

    pub fn garbage_collect(&mut self, max_age: Duration) -> Result<usize, CacheError> {
        self.inner.garbage_collect(max_age)
    }

    pub fn begin(&mut self) {
        self.inner.begin();
    }

    pub fn commit(&mut self) -> Result<(), CacheError> {
        self.inner.commit()
    }

    pub fn rollback(&mut self) {
        self.inner.rollback();
    }

    /// Run `work` inside a unit of work; see [`TransactionalCache::within`].
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

impl TransactionListener for VerifyingCache {
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
