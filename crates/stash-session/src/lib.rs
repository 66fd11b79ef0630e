//! Session persistence for stash.
//!
//! Sessions are explicit values loaded from and saved to a [`SessionStore`] by
//! id; there is no process-wide session state. The store is an ordinary
//! [`KeyedCacheStore`](stash_cache::KeyedCacheStore), so any registry backend
//! works.
//!
//! ```
//! use stash_cache::MemoryRegistry;
//! use stash_session::SessionStore;
//!
//! let sessions = SessionStore::open(&MemoryRegistry::new(), "session")?;
//!
//! let mut session = sessions.create();
//! session.set("auth", "user", "alice");
//! sessions.save(&session)?;
//!
//! let loaded = sessions.load(session.id())?.expect("saved above");
//! assert_eq!(loaded.get("auth", "user"), Some("alice"));
//! # Ok::<(), stash_session::SessionError>(())
//! ```

mod error;
mod session;
mod store;

pub use error::SessionError;
pub use session::Session;
pub use store::SessionStore;
