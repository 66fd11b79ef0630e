//! No-op store and registry for disabled caching.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::store::{KeyedCacheStore, StoreRegistry};
use crate::{CacheEntry, CacheError, CachedItem, Characteristics};

/// No-op [`KeyedCacheStore`] that never stores or retrieves data.
///
/// Every `get` returns `Ok(None)`; every write is silently discarded.
/// Characteristics are still validated so that malformed keys fail the same
/// way they would against a real backend.
#[derive(Debug, Default)]
pub struct NullStore;

impl KeyedCacheStore for NullStore {
    fn get(
        &self,
        _name: &str,
        characteristics: &Characteristics,
        _as_of: Option<DateTime<Utc>>,
    ) -> Result<Option<CachedItem>, CacheError> {
        characteristics.validate()?;
        Ok(None)
    }

    fn store(
        &self,
        _name: &str,
        characteristics: &Characteristics,
        _item: CachedItem,
    ) -> Result<(), CacheError> {
        characteristics.validate()
    }

    fn remove(&self, _name: &str, characteristics: &Characteristics) -> Result<(), CacheError> {
        characteristics.validate()
    }

    fn remove_all(
        &self,
        _name: Option<&str>,
        partial: &Characteristics,
    ) -> Result<usize, CacheError> {
        partial.validate()?;
        Ok(0)
    }

    fn clear(&self) -> Result<(), CacheError> {
        Ok(())
    }

    fn garbage_collect(&self, _max_age: Duration) -> Result<usize, CacheError> {
        Ok(0)
    }

    fn len(&self) -> Result<usize, CacheError> {
        Ok(0)
    }

    fn entries(
        &self,
        _name: Option<&str>,
        partial: &Characteristics,
    ) -> Result<Vec<CacheEntry>, CacheError> {
        partial.validate()?;
        Ok(Vec::new())
    }
}

/// No-op [`StoreRegistry`] that always returns [`NullStore`]s.
#[derive(Debug, Default)]
pub struct NullRegistry;

impl StoreRegistry for NullRegistry {
    fn resolve(&self, _name: &str, _shared: bool) -> Result<Arc<dyn KeyedCacheStore>, CacheError> {
        Ok(Arc::new(NullStore))
    }
}
