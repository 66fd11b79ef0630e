//! Characteristic tags attached to cache entries.
//!
//! Characteristics play two roles:
//!
//! - **Exact lookup**: an entry is only returned to a lookup whose supplied
//!   characteristics equal the stored ones.
//! - **Subset filter**: bulk removal matches every entry whose characteristics
//!   contain all pairs of the filter (stored ⊇ filter).
//!
//! The map is ordered so that its JSON form is a stable storage key.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::CacheError;

/// Scalar characteristic value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Finite floating point number.
    Float(f64),
    /// UTF-8 string.
    Str(String),
}

impl Scalar {
    /// Parse a textual value, preferring bool, then integer, then float.
    ///
    /// Anything else is kept as a string.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "true" => return Self::Bool(true),
            "false" => return Self::Bool(false),
            _ => {}
        }
        if let Ok(int) = value.parse::<i64>() {
            return Self::Int(int);
        }
        if let Ok(float) = value.parse::<f64>()
            && float.is_finite()
        {
            return Self::Float(float);
        }
        Self::Str(value.to_owned())
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Str(value) => write!(f, "{value:?}"),
        }
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for Scalar {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// Tag map attached to a cache entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Characteristics(BTreeMap<String, Scalar>);

impl Characteristics {
    /// Create an empty map. As a filter it matches every entry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, tag: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.insert(tag, value);
        self
    }

    /// Insert or replace a tag, returning the previous value.
    pub fn insert(&mut self, tag: impl Into<String>, value: impl Into<Scalar>) -> Option<Scalar> {
        self.0.insert(tag.into(), value.into())
    }

    #[must_use]
    pub fn get(&self, tag: &str) -> Option<&Scalar> {
        self.0.get(tag)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate tags in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.0.iter().map(|(tag, value)| (tag.as_str(), value))
    }

    /// True if every pair of `filter` is present in `self` with an equal value.
    #[must_use]
    pub fn contains_all(&self, filter: &Characteristics) -> bool {
        filter
            .0
            .iter()
            .all(|(tag, value)| self.0.get(tag) == Some(value))
    }

    /// Check that the map can be serialized into a stable key.
    ///
    /// Tag names must be non-empty and free of control characters; float
    /// values must be finite.
    pub fn validate(&self) -> Result<(), CacheError> {
        for (tag, value) in &self.0 {
            if tag.is_empty() {
                return Err(CacheError::InvalidCharacteristics(
                    "tag name cannot be empty".to_owned(),
                ));
            }
            if tag.chars().any(char::is_control) {
                return Err(CacheError::InvalidCharacteristics(format!(
                    "tag name {tag:?} contains control characters"
                )));
            }
            if let Scalar::Float(float) = value
                && !float.is_finite()
            {
                return Err(CacheError::InvalidCharacteristics(format!(
                    "tag {tag:?} has non-finite value {float}"
                )));
            }
        }
        Ok(())
    }

    /// Canonical JSON form used as the characteristics part of a storage key.
    pub fn stable_key(&self) -> Result<String, CacheError> {
        self.validate()?;
        serde_json::to_string(&self.0)
            .map_err(|e| CacheError::InvalidCharacteristics(e.to_string()))
    }
}

impl<K, V> FromIterator<(K, V)> for Characteristics
where
    K: Into<String>,
    V: Into<Scalar>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(tag, value)| (tag.into(), value.into()))
                .collect(),
        )
    }
}

impl fmt::Display for Characteristics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (tag, value)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{tag}: {value}")?;
        }
        write!(f, "}}")
    }
}

/// Hex digest identifying a store name on disk.
#[must_use]
pub fn name_digest(name: &str) -> String {
    hex::encode(Sha256::digest(name.as_bytes()))
}

/// Hex digest of the exact `(name, characteristics)` key.
pub fn storage_key(name: &str, characteristics: &Characteristics) -> Result<String, CacheError> {
    let chr = characteristics.stable_key()?;
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update([0u8]);
    hasher.update(chr.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_is_irrelevant() {
        let a = Characteristics::new().with("locale", "de").with("role", "admin");
        let b = Characteristics::new().with("role", "admin").with("locale", "de");
        assert_eq!(a, b);
        assert_eq!(a.stable_key().unwrap(), b.stable_key().unwrap());
        assert_eq!(
            storage_key("page", &a).unwrap(),
            storage_key("page", &b).unwrap()
        );
    }

    #[test]
    fn test_storage_key_separates_names() {
        let chr = Characteristics::new().with("chr1", 1);
        assert_ne!(
            storage_key("holeradio", &chr).unwrap(),
            storage_key("holeradio-2", &chr).unwrap()
        );
    }

    #[test]
    fn test_value_types_are_distinct() {
        let int = Characteristics::new().with("chr1", 1);
        let text = Characteristics::new().with("chr1", "1");
        assert_ne!(int, text);
        assert_ne!(int.stable_key().unwrap(), text.stable_key().unwrap());
    }

    #[test]
    fn test_contains_all_is_superset_match() {
        let stored = Characteristics::new().with("chr1", 2).with("chr2", "zwei");

        assert!(stored.contains_all(&Characteristics::new().with("chr2", "zwei")));
        assert!(stored.contains_all(&stored));
        assert!(stored.contains_all(&Characteristics::new()));
        assert!(!stored.contains_all(&Characteristics::new().with("chr2", "not-zwei")));
        assert!(!stored.contains_all(&Characteristics::new().with("chr3", "zwei")));
        assert!(
            !stored.contains_all(
                &Characteristics::new()
                    .with("chr1", 2)
                    .with("chr2", "zwei")
                    .with("chr0", 0)
            )
        );
    }

    #[test]
    fn test_empty_tag_name_is_invalid() {
        let chr = Characteristics::new().with("", 1);
        let err = chr.stable_key().unwrap_err();
        assert!(matches!(err, CacheError::InvalidCharacteristics(_)));
    }

    #[test]
    fn test_control_characters_are_invalid() {
        let chr = Characteristics::new().with("lo\ncale", "de");
        assert!(matches!(
            chr.validate(),
            Err(CacheError::InvalidCharacteristics(_))
        ));
    }

    #[test]
    fn test_non_finite_float_is_invalid() {
        let chr = Characteristics::new().with("ratio", f64::NAN);
        assert!(matches!(
            storage_key("page", &chr),
            Err(CacheError::InvalidCharacteristics(_))
        ));
        let chr = Characteristics::new().with("ratio", f64::INFINITY);
        assert!(chr.validate().is_err());
    }

    #[test]
    fn test_json_round_trip_keeps_scalar_kinds() {
        let chr = Characteristics::new()
            .with("flag", true)
            .with("count", 3)
            .with("ratio", 0.5)
            .with("name", "zwei");
        let json = serde_json::to_string(&chr).unwrap();
        assert_eq!(
            json,
            r#"{"count":3,"flag":true,"name":"zwei","ratio":0.5}"#
        );
        let back: Characteristics = serde_json::from_str(&json).unwrap();
        assert_eq!(back, chr);
    }

    #[test]
    fn test_scalar_parse() {
        assert_eq!(Scalar::parse("true"), Scalar::Bool(true));
        assert_eq!(Scalar::parse("42"), Scalar::Int(42));
        assert_eq!(Scalar::parse("-1.5"), Scalar::Float(-1.5));
        assert_eq!(Scalar::parse("zwei"), Scalar::Str("zwei".to_owned()));
        assert_eq!(Scalar::parse("NaN"), Scalar::Str("NaN".to_owned()));
    }

    #[test]
    fn test_display() {
        let chr = Characteristics::new().with("chr1", 1).with("chr2", "zwei");
        assert_eq!(chr.to_string(), r#"{chr1: 1, chr2: "zwei"}"#);
    }

    #[test]
    fn test_from_iterator() {
        let chr: Characteristics = [("chr0", 0), ("chr1", 1)].into_iter().collect();
        assert_eq!(chr.len(), 2);
        assert_eq!(chr.get("chr1"), Some(&Scalar::Int(1)));
    }
}
