//! Cache error types.
//!
//! A cache miss is never an error: lookups return `Ok(None)` for absent,
//! expired, or rejected entries. [`CacheError`] is reserved for conditions the
//! caller must not mistake for "no data".

/// Errors raised by cache stores, registries and facades.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The backend could not be resolved or its storage medium failed.
    #[error("Cache backend unavailable ({backend}): {source}")]
    BackendUnavailable {
        /// Backend identifier (e.g., "file", "memory", or a store name).
        backend: String,
        /// Underlying failure.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A cached item references a verifier that is not registered.
    #[error("Verifier not found: {0}")]
    VerifierNotFound(String),

    /// Characteristics cannot be serialized into a stable storage key.
    #[error("Invalid characteristics: {0}")]
    InvalidCharacteristics(String),
}

impl CacheError {
    /// Wrap an underlying failure as [`CacheError::BackendUnavailable`].
    #[must_use]
    pub fn backend(
        backend: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::BackendUnavailable {
            backend: backend.into(),
            source: source.into(),
        }
    }

    /// True for [`CacheError::BackendUnavailable`].
    #[must_use]
    pub fn is_backend_unavailable(&self) -> bool {
        matches!(self, Self::BackendUnavailable { .. })
    }
}
