//! Session persistence.

use std::sync::Arc;
use std::time::Duration;

use stash_cache::{
    CachedItem, Characteristics, Clock, KeyedCacheStore, StoreRegistry, SystemClock,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{Session, SessionError};

/// Persists [`Session`]s in a [`KeyedCacheStore`].
///
/// Each session is one entry named by its id, with empty characteristics and
/// a JSON payload. Sessions carry no expiry; stale ones are swept by
/// [`SessionStore::garbage_collect`] based on their last save. Because the
/// sweep covers the whole store, sessions should get a store of their own.
pub struct SessionStore {
    store: Arc<dyn KeyedCacheStore>,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    #[must_use]
    pub fn new(store: Arc<dyn KeyedCacheStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
        }
    }

    /// Resolve the shared store `name` from `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Cache`] if the registry cannot provide the store.
    pub fn open(registry: &dyn StoreRegistry, name: &str) -> Result<Self, SessionError> {
        let store = registry.resolve(name, true)?;
        debug!(store = name, "opened session store");
        Ok(Self::new(store))
    }

    /// Use `clock` for the creation time of new sessions.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Start a new, empty session with a random id.
    ///
    /// Nothing is written until the session is saved.
    #[must_use]
    pub fn create(&self) -> Session {
        Session::new(Uuid::new_v4().to_string(), self.clock.now())
    }

    /// Load a saved session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidId`] for ids that are not UUIDs and
    /// [`SessionError::Decode`] if the stored payload is not a session.
    pub fn load(&self, id: &str) -> Result<Option<Session>, SessionError> {
        let id = normalize_id(id)?;
        let Some(item) = self.store.get(&id, &Characteristics::new(), None)? else {
            return Ok(None);
        };
        let session: Session = item
            .json()
            .map_err(|source| SessionError::Decode { id: id.clone(), source })?;
        if session.id() != id {
            return Err(SessionError::InvalidId(session.id().to_owned()));
        }
        Ok(Some(session))
    }

    /// Write `session`, replacing any previous save.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Cache`] if the store rejects the write.
    pub fn save(&self, session: &Session) -> Result<(), SessionError> {
        let item = CachedItem::from_json(session)
            .map_err(SessionError::Encode)?
            .with_header("Content-Type", "application/json");
        self.store
            .store(session.id(), &Characteristics::new(), item)?;
        Ok(())
    }

    /// Delete a session. Deleting an unknown session is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidId`] for ids that are not UUIDs.
    pub fn destroy(&self, id: &str) -> Result<(), SessionError> {
        let id = normalize_id(id)?;
        self.store.remove(&id, &Characteristics::new())?;
        Ok(())
    }

    /// Delete sessions not saved within `max_age`. Returns how many went.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Cache`] if the store fails.
    pub fn garbage_collect(&self, max_age: Duration) -> Result<usize, SessionError> {
        let removed = self.store.garbage_collect(max_age)?;
        info!(removed, max_age_secs = max_age.as_secs(), "swept sessions");
        Ok(removed)
    }

    /// Number of saved sessions.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Cache`] if the store fails.
    pub fn len(&self) -> Result<usize, SessionError> {
        Ok(self.store.len()?)
    }

    /// True if no session is saved.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Cache`] if the store fails.
    pub fn is_empty(&self) -> Result<bool, SessionError> {
        Ok(self.len()? == 0)
    }
}

/// Canonical (lowercase, hyphenated) form of a session id.
fn normalize_id(id: &str) -> Result<String, SessionError> {
    Uuid::parse_str(id)
        .map(|uuid| uuid.hyphenated().to_string())
        .map_err(|_| SessionError::InvalidId(id.to_owned()))
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use pretty_assertions::assert_eq;
    use stash_cache::{FixedClock, MemoryRegistry, MemoryStore};

    use super::*;

    fn sessions() -> SessionStore {
        SessionStore::open(&MemoryRegistry::new(), "session").unwrap()
    }

    #[test]
    fn test_create_assigns_unique_uuid() {
        let sessions = sessions();
        let a = sessions.create();
        let b = sessions.create();

        assert_ne!(a.id(), b.id());
        assert!(Uuid::parse_str(a.id()).is_ok());
        assert!(a.is_empty());
    }

    #[test]
    fn test_create_does_not_persist() {
        let sessions = sessions();
        let session = sessions.create();
        assert_eq!(sessions.load(session.id()).unwrap(), None);
        assert!(sessions.is_empty().unwrap());
    }

    #[test]
    fn test_save_and_load() {
        let clock = Arc::new(FixedClock::new(
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        ));
        let sessions = sessions().with_clock(clock);
        let mut session = sessions.create();
        session.set("auth", "user", "alice");
        session.set_json("cart", "items", &["book", "pen"]).unwrap();
        sessions.save(&session).unwrap();

        let loaded = sessions.load(session.id()).unwrap().unwrap();
        assert_eq!(loaded, session);
        assert_eq!(loaded.created_at().timestamp(), 1_700_000_000);
        assert_eq!(
            loaded.get_json::<Vec<String>>("cart", "items").unwrap(),
            Some(vec!["book".to_owned(), "pen".to_owned()])
        );
    }

    #[test]
    fn test_load_accepts_uppercase_id() {
        let sessions = sessions();
        let session = sessions.create();
        sessions.save(&session).unwrap();

        let upper = session.id().to_uppercase();
        assert!(sessions.load(&upper).unwrap().is_some());
    }

    #[test]
    fn test_invalid_id_rejected() {
        let sessions = sessions();
        for id in ["", "../../etc/passwd", "not-a-uuid"] {
            assert!(matches!(
                sessions.load(id).unwrap_err(),
                SessionError::InvalidId(_)
            ));
            assert!(matches!(
                sessions.destroy(id).unwrap_err(),
                SessionError::InvalidId(_)
            ));
        }
    }

    #[test]
    fn test_destroy() {
        let sessions = sessions();
        let session = sessions.create();
        sessions.save(&session).unwrap();

        sessions.destroy(session.id()).unwrap();
        assert_eq!(sessions.load(session.id()).unwrap(), None);
        // Idempotent
        sessions.destroy(session.id()).unwrap();
    }

    #[test]
    fn test_corrupt_payload_is_decode_error() {
        let store: Arc<dyn KeyedCacheStore> = Arc::new(MemoryStore::new());
        let sessions = SessionStore::new(Arc::clone(&store));
        let id = sessions.create().id().to_owned();
        store
            .store(&id, &Characteristics::new(), CachedItem::new("{broken"))
            .unwrap();

        let err = sessions.load(&id).unwrap_err();
        assert!(matches!(err, SessionError::Decode { id: ref got, .. } if *got == id));
    }

    #[test]
    fn test_garbage_collect_uses_last_save() {
        let clock = Arc::new(FixedClock::new(
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        ));
        let store = Arc::new(MemoryStore::with_clock(Arc::clone(&clock) as Arc<dyn Clock>));
        let sessions = SessionStore::new(store);

        let idle = sessions.create();
        let mut active = sessions.create();
        sessions.save(&idle).unwrap();
        sessions.save(&active).unwrap();

        clock.advance(Duration::from_secs(3_000));
        active.set("auth", "user", "alice");
        sessions.save(&active).unwrap();

        clock.advance(Duration::from_secs(1_000));
        assert_eq!(sessions.garbage_collect(Duration::from_secs(3_600)).unwrap(), 1);
        assert_eq!(sessions.load(idle.id()).unwrap(), None);
        assert!(sessions.load(active.id()).unwrap().is_some());
    }
}
