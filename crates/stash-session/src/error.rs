//! Session error types.

use stash_cache::CacheError;

/// Errors raised by [`SessionStore`](crate::SessionStore) and
/// [`Session`](crate::Session).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The underlying cache store failed.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// A session id is not a UUID.
    #[error("Invalid session id: {0:?}")]
    InvalidId(String),

    /// A persisted session or session value is not valid JSON for its type.
    #[error("Failed to decode session {id}: {source}")]
    Decode {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    /// A session value could not be serialized.
    #[error("Failed to encode session value: {0}")]
    Encode(#[source] serde_json::Error),
}
