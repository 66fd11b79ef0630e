//! Characteristic-indexed cache store for stash.
//!
//! This crate defines the store contract that cache consumers program against
//! and the backends that implement it:
//!
//! - [`KeyedCacheStore`]: entries keyed by `(name, characteristics)` with exact
//!   lookup, subset-match bulk removal, clearing and age-based collection,
//!   plus all-or-nothing batches ([`CacheMutation`]) for deferred commits
//! - [`StoreRegistry`]: resolves a store by logical name and sharing mode
//!
//! # Implementations
//!
//! - [`MemoryStore`] / [`MemoryRegistry`]: process-local maps
//! - [`FileStore`] / [`FileRegistry`]: one file per entry with version validation
//! - [`NullStore`] / [`NullRegistry`]: no-op implementations (always miss)
//!
//! # Example
//!
//! ```
//! use stash_cache::{CachedItem, Characteristics, MemoryRegistry, StoreRegistry};
//!
//! let registry = MemoryRegistry::new();
//! let store = registry.resolve("responses", true)?;
//!
//! let de = Characteristics::new().with("locale", "de").with("tag", "zwei");
//! store.store("1:host/blog", &de, CachedItem::new("<html>hallo</html>"))?;
//! assert!(store.get("1:host/blog", &de, None)?.is_some());
//!
//! // Purge every entry tagged "zwei", under any name
//! store.remove_all(None, &Characteristics::new().with("tag", "zwei"))?;
//! assert!(store.get("1:host/blog", &de, None)?.is_none());
//! # Ok::<(), stash_cache::CacheError>(())
//! ```

mod batch;
mod characteristics;
pub mod clock;
mod error;
mod file;
mod id;
mod item;
mod lock;
mod memory;
mod null;
mod store;

pub use batch::{CacheEntry, CacheMutation, apply_with_undo};
pub use characteristics::{Characteristics, Scalar, name_digest, storage_key};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::CacheError;
pub use file::{FileRegistry, FileStore};
pub use id::CacheId;
pub use item::CachedItem;
pub use memory::{MemoryRegistry, MemoryStore};
pub use null::{NullRegistry, NullStore};
pub use store::{KeyedCacheStore, StoreRegistry};
