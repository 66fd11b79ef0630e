//! Namespaced session state.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::SessionError;

/// State of one session: string values grouped by namespace.
///
/// Namespaces keep independent components from clobbering each other's keys.
/// Sessions are plain values; changes become durable only through
/// [`SessionStore::save`](crate::SessionStore::save).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    namespaces: BTreeMap<String, BTreeMap<String, String>>,
}

impl Session {
    pub(crate) fn new(id: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at,
            namespaces: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// True if no namespace holds a value.
    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }

    /// Names of namespaces holding at least one value, in sorted order.
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.namespaces.keys().map(String::as_str)
    }

    pub fn get(&self, namespace: &str, key: &str) -> Option<&str> {
        self.namespaces
            .get(namespace)
            .and_then(|values| values.get(key))
            .map(String::as_str)
    }

    /// Set a value, returning the previous one.
    pub fn set(
        &mut self,
        namespace: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Option<String> {
        self.namespaces
            .entry(namespace.into())
            .or_default()
            .insert(key.into(), value.into())
    }

    /// Remove a value, returning it. Namespaces left empty are dropped.
    pub fn remove(&mut self, namespace: &str, key: &str) -> Option<String> {
        let values = self.namespaces.get_mut(namespace)?;
        let removed = values.remove(key);
        if values.is_empty() {
            self.namespaces.remove(namespace);
        }
        removed
    }

    /// Decode a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Decode`] if the stored value is not valid JSON
    /// for `T`.
    pub fn get_json<T: DeserializeOwned>(
        &self,
        namespace: &str,
        key: &str,
    ) -> Result<Option<T>, SessionError> {
        self.get(namespace, key)
            .map(|raw| {
                serde_json::from_str(raw).map_err(|source| SessionError::Decode {
                    id: self.id.clone(),
                    source,
                })
            })
            .transpose()
    }

    /// Store `value` as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Encode`] if `value` cannot be serialized.
    pub fn set_json<T: Serialize + ?Sized>(
        &mut self,
        namespace: impl Into<String>,
        key: impl Into<String>,
        value: &T,
    ) -> Result<(), SessionError> {
        let raw = serde_json::to_string(value).map_err(SessionError::Encode)?;
        self.set(namespace, key, raw);
        Ok(())
    }

    /// Drop every value in `namespace`. Returns `false` if it held nothing.
    pub fn clear_namespace(&mut self, namespace: &str) -> bool {
        self.namespaces.remove(namespace).is_some()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn session() -> Session {
        Session::new(
            "5f0c1f5e-4a43-4d1b-9b55-3c0f3f7c2a10".to_owned(),
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        )
    }

    #[test]
    fn test_namespaces_are_independent() {
        let mut session = session();
        session.set("cart", "count", "3");
        session.set("auth", "count", "1");

        assert_eq!(session.get("cart", "count"), Some("3"));
        assert_eq!(session.get("auth", "count"), Some("1"));
        assert_eq!(session.get("prefs", "count"), None);
        assert_eq!(session.namespaces().collect::<Vec<_>>(), vec!["auth", "cart"]);
    }

    #[test]
    fn test_set_returns_previous_value() {
        let mut session = session();
        assert_eq!(session.set("cart", "count", "1"), None);
        assert_eq!(session.set("cart", "count", "2"), Some("1".to_owned()));
    }

    #[test]
    fn test_remove_drops_empty_namespace() {
        let mut session = session();
        session.set("cart", "count", "3");

        assert_eq!(session.remove("cart", "count"), Some("3".to_owned()));
        assert_eq!(session.remove("cart", "count"), None);
        assert!(session.is_empty());
    }

    #[test]
    fn test_clear_namespace() {
        let mut session = session();
        session.set("cart", "a", "1");
        session.set("cart", "b", "2");
        session.set("auth", "user", "alice");

        assert!(session.clear_namespace("cart"));
        assert!(!session.clear_namespace("cart"));
        assert_eq!(session.get("cart", "a"), None);
        assert_eq!(session.get("auth", "user"), Some("alice"));
    }

    #[test]
    fn test_json_values() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Cart {
            items: Vec<String>,
        }

        let mut session = session();
        let cart = Cart {
            items: vec!["book".to_owned()],
        };
        session.set_json("cart", "state", &cart).unwrap();

        assert_eq!(session.get("cart", "state"), Some(r#"{"items":["book"]}"#));
        assert_eq!(session.get_json::<Cart>("cart", "state").unwrap(), Some(cart));
        assert_eq!(session.get_json::<Cart>("cart", "missing").unwrap(), None);
    }

    #[test]
    fn test_get_json_reports_decode_error() {
        let mut session = session();
        session.set("cart", "state", "not json");

        let err = session.get_json::<Vec<u32>>("cart", "state").unwrap_err();
        assert!(matches!(err, SessionError::Decode { ref id, .. } if id == session.id()));
    }
}
