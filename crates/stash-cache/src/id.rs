//! Composite cache identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Characteristics, Scalar};

/// Identifies a cached artifact by version, host, path and characteristics.
///
/// Two ids are equal iff all components are equal. Facades map an id onto the
/// store's `(name, characteristics)` key via [`CacheId::name`]; hashing into a
/// single storage key is left to the backend.
///
/// ```
/// use stash_cache::CacheId;
///
/// let id = CacheId::new("v3", "example.com")
///     .with_path_str("/blog/2024/intro")
///     .with_characteristic("locale", "de");
/// assert_eq!(id.name(), "v3:example.com/blog/2024/intro");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheId {
    version: String,
    host: String,
    path: Vec<String>,
    characteristics: Characteristics,
}

impl CacheId {
    #[must_use]
    pub fn new(version: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            host: host.into(),
            path: Vec::new(),
            characteristics: Characteristics::new(),
        }
    }

    /// Replace the path with the given segments.
    #[must_use]
    pub fn with_path<I, S>(mut self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.path = segments.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the path by splitting `path` on `/`, skipping empty segments.
    #[must_use]
    pub fn with_path_str(self, path: &str) -> Self {
        self.with_path(path.split('/').filter(|segment| !segment.is_empty()))
    }

    #[must_use]
    pub fn with_characteristic(mut self, tag: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.characteristics.insert(tag, value);
        self
    }

    #[must_use]
    pub fn with_characteristics(mut self, characteristics: Characteristics) -> Self {
        self.characteristics = characteristics;
        self
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn characteristics(&self) -> &Characteristics {
        &self.characteristics
    }

    /// Store name for this id: `{version}:{host}/{path}`.
    ///
    /// Ids that differ only in characteristics share a name, so
    /// `remove_all(Some(name), filter)` addresses all variants of one path.
    #[must_use]
    pub fn name(&self) -> String {
        format!("{}:{}/{}", self.version, self.host, self.path.join("/"))
    }
}

impl fmt::Display for CacheId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.characteristics.is_empty() {
            write!(f, "{}", self.name())
        } else {
            write!(f, "{} {}", self.name(), self.characteristics)
        }
    }
}
