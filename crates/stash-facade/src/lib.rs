//! Cache facades for stash.
//!
//! Application code talks to a cache store through one of two facades:
//!
//! - [`TransactionalCache`]: defers mutations until the enclosing unit of
//!   work commits, discards them on rollback, and lets the unit of work read
//!   its own pending writes
//! - [`VerifyingCache`]: wraps a [`TransactionalCache`] and re-validates every
//!   hit that names a [`Verifier`]
//!
//! Both implement [`TransactionListener`] so that an application's transaction
//! manager can drive them.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use stash_cache::{CacheId, CachedItem, MemoryRegistry};
//! use stash_facade::{TransactionalCache, VerifierRegistry, VerifyingCache};
//!
//! let verifiers = VerifierRegistry::new()
//!     .with("non-empty", |_: &CacheId, item: &CachedItem| !item.payload().is_empty());
//! let inner = TransactionalCache::new(Arc::new(MemoryRegistry::new()), "responses", true);
//! let mut cache = VerifyingCache::new(inner, Arc::new(verifiers));
//!
//! let page = CacheId::new("1", "example.com")
//!     .with_path_str("/blog")
//!     .with_characteristic("locale", "de");
//!
//! cache.within(|cache| {
//!     cache.store(&page, CachedItem::new("").with_verifier("non-empty"))
//! })?;
//! assert!(cache.get(&page)?.is_none());
//! # Ok::<(), stash_cache::CacheError>(())
//! ```

mod mutation;
mod transactional;
mod verifier;
mod verifying;

use stash_cache::CacheError;

pub use transactional::TransactionalCache;
pub use verifier::{Verifier, VerifierLookup, VerifierRegistry};
pub use verifying::VerifyingCache;

/// Hooks through which an application transaction coordinator drives a
/// cache facade.
pub trait TransactionListener {
    /// The coordinator opened a unit of work.
    fn on_begin(&mut self);

    /// The coordinator committed; apply deferred cache mutations.
    fn on_commit(&mut self) -> Result<(), CacheError>;

    /// The coordinator rolled back; discard deferred cache mutations.
    fn on_rollback(&mut self);
}
