//! Cached item value object.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// An immutable cached artifact.
///
/// Items are replaced in the store, never edited in place. Construct one with
/// [`CachedItem::new`] and the `with_*` builders:
///
/// ```
/// use stash_cache::CachedItem;
///
/// let item = CachedItem::new(b"<html>hello</html>".to_vec())
///     .with_header("Content-Type", "text/html")
///     .with_verifier("page-etag");
/// assert_eq!(item.verifier(), Some("page-etag"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedItem {
    payload: Vec<u8>,
    metadata: Vec<(String, String)>,
    expires_at: Option<DateTime<Utc>>,
    verifier: Option<String>,
}

impl CachedItem {
    /// Create an item that never expires by time and has no verifier.
    #[must_use]
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            metadata: Vec::new(),
            expires_at: None,
            verifier: None,
        }
    }

    /// Create an item holding `value` serialized as JSON.
    pub fn from_json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::to_vec(value)?))
    }

    /// Append a header-like metadata pair. Order is preserved.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((name.into(), value.into()));
        self
    }

    /// Replace all metadata pairs.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Vec<(String, String)>) -> Self {
        self.metadata = metadata;
        self
    }

    #[must_use]
    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Name of the verifier that must confirm this item on every read.
    #[must_use]
    pub fn with_verifier(mut self, verifier: impl Into<String>) -> Self {
        self.verifier = Some(verifier.into());
        self
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consume the item, returning its payload.
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Payload as UTF-8, if valid.
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    /// Deserialize the payload from JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }

    pub fn metadata(&self) -> &[(String, String)] {
        &self.metadata
    }

    /// First metadata value with the given name (ASCII case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn verifier(&self) -> Option<&str> {
        self.verifier.as_deref()
    }

    /// True if the item's expiry lies before `as_of`.
    ///
    /// Items without an expiry never expire by time.
    pub fn is_expired_at(&self, as_of: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at < as_of)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_expiry_boundary() {
        let item = CachedItem::new("x").with_expires_at(at(100));
        assert!(!item.is_expired_at(at(99)));
        assert!(!item.is_expired_at(at(100)));
        assert!(item.is_expired_at(at(101)));
    }

    #[test]
    fn test_no_expiry_never_expires() {
        let item = CachedItem::new("x");
        assert!(!item.is_expired_at(DateTime::<Utc>::MAX_UTC));
    }

    #[test]
    fn test_metadata_keeps_order_and_duplicates() {
        let item = CachedItem::new("x")
            .with_header("Set-Cookie", "a=1")
            .with_header("Content-Type", "text/html")
            .with_header("Set-Cookie", "b=2");

        assert_eq!(
            item.metadata(),
            &[
                ("Set-Cookie".to_owned(), "a=1".to_owned()),
                ("Content-Type".to_owned(), "text/html".to_owned()),
                ("Set-Cookie".to_owned(), "b=2".to_owned()),
            ]
        );
        assert_eq!(item.header("content-type"), Some("text/html"));
        assert_eq!(item.header("set-cookie"), Some("a=1"));
        assert_eq!(item.header("etag"), None);
    }

    #[test]
    fn test_json_payload() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct PageData {
            title: String,
        }

        let item = CachedItem::from_json(&PageData {
            title: "Hello".to_owned(),
        })
        .unwrap();
        assert_eq!(item.payload_str(), Some(r#"{"title":"Hello"}"#));

        let back: PageData = item.json().unwrap();
        assert_eq!(back.title, "Hello");
    }

    #[test]
    fn test_binary_payload_is_not_str() {
        let item = CachedItem::new(vec![0xFF, 0xFE, 0x00]);
        assert_eq!(item.payload_str(), None);
        assert_eq!(item.into_payload(), vec![0xFF, 0xFE, 0x00]);
    }
}
