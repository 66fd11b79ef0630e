//! Pluggable validity verifiers and their lookup registry.

use std::collections::HashMap;
use std::sync::Arc;

use stash_cache::{CacheError, CacheId, CachedItem};

/// Re-validates a cached item's domain-level correctness at read time.
///
/// Verifiers are resolved once per facade and then reused for every read, so
/// they should be stateless and idempotent. Any `Fn(&CacheId, &CachedItem) -> bool`
/// closure is a verifier.
pub trait Verifier: Send + Sync {
    /// Return `true` if `item` may still be served for `id`.
    fn verify_validity(&self, id: &CacheId, item: &CachedItem) -> bool;
}

impl<F> Verifier for F
where
    F: Fn(&CacheId, &CachedItem) -> bool + Send + Sync,
{
    fn verify_validity(&self, id: &CacheId, item: &CachedItem) -> bool {
        self(id, item)
    }
}

/// Resolves verifiers by the name stored on cached items.
pub trait VerifierLookup: Send + Sync {
    /// Look up a verifier, failing with [`CacheError::VerifierNotFound`] if
    /// `name` is not registered.
    fn lookup(&self, name: &str) -> Result<Arc<dyn Verifier>, CacheError>;
}

/// Map-backed [`VerifierLookup`].
///
/// ```
/// use stash_cache::{CacheId, CachedItem};
/// use stash_facade::{VerifierLookup, VerifierRegistry};
///
/// let registry = VerifierRegistry::new()
///     .with("always", |_: &CacheId, _: &CachedItem| true);
/// assert!(registry.lookup("always").is_ok());
/// assert!(registry.lookup("never-registered").is_err());
/// ```
#[derive(Default)]
pub struct VerifierRegistry {
    verifiers: HashMap<String, Arc<dyn Verifier>>,
}

impl VerifierRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `verifier` under `name`, replacing any previous registration.
    pub fn register(&mut self, name: impl Into<String>, verifier: impl Verifier + 'static) {
        self.verifiers.insert(name.into(), Arc::new(verifier));
    }

    /// Builder-style [`VerifierRegistry::register`].
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, verifier: impl Verifier + 'static) -> Self {
        self.register(name, verifier);
        self
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.verifiers.contains_key(name)
    }
}

impl VerifierLookup for VerifierRegistry {
    fn lookup(&self, name: &str) -> Result<Arc<dyn Verifier>, CacheError> {
        self.verifiers
            .get(name)
            .map(Arc::clone)
            .ok_or_else(|| CacheError::VerifierNotFound(name.to_owned()))
    }
}
