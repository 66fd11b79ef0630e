//! Pending cache mutations recorded inside a unit of work.

use stash_cache::{CacheError, CacheMutation, CachedItem, Characteristics};

/// A deferred store operation.
///
/// Exact-key mutations carry the stable key computed when they were recorded,
/// so invalid characteristics fail at call time rather than at commit.
pub(crate) struct Mutation {
    op: CacheMutation,
    key: Option<String>,
}

/// Effect of a pending mutation on one exact key.
pub(crate) enum Shadow<'a> {
    Stored(&'a CachedItem),
    Removed,
}

impl Mutation {
    pub(crate) fn store(
        name: String,
        characteristics: Characteristics,
        item: CachedItem,
    ) -> Result<Self, CacheError> {
        let key = characteristics.stable_key()?;
        Ok(Self {
            op: CacheMutation::Store {
                name,
                characteristics,
                item,
            },
            key: Some(key),
        })
    }

    pub(crate) fn remove(name: String, characteristics: Characteristics) -> Result<Self, CacheError> {
        let key = characteristics.stable_key()?;
        Ok(Self {
            op: CacheMutation::Remove {
                name,
                characteristics,
            },
            key: Some(key),
        })
    }

    pub(crate) fn remove_all(
        name: Option<String>,
        partial: Characteristics,
    ) -> Result<Self, CacheError> {
        partial.validate()?;
        Ok(Self {
            op: CacheMutation::RemoveAll { name, partial },
            key: None,
        })
    }

    pub(crate) fn clear() -> Self {
        Self {
            op: CacheMutation::Clear,
            key: None,
        }
    }

    /// How this mutation would change the entry at `(name, key)`, if at all.
    ///
    /// `characteristics` must be the map `key` was derived from; it is needed
    /// for subset matching against bulk removals.
    pub(crate) fn shadow(
        &self,
        name: &str,
        key: &str,
        characteristics: &Characteristics,
    ) -> Option<Shadow<'_>> {
        let same_key = self.key.as_deref() == Some(key);
        match &self.op {
            CacheMutation::Store { name: n, item, .. } if n == name && same_key => {
                Some(Shadow::Stored(item))
            }
            CacheMutation::Remove { name: n, .. } if n == name && same_key => Some(Shadow::Removed),
            CacheMutation::RemoveAll { name: n, partial }
                if n.as_deref().is_none_or(|n| n == name)
                    && characteristics.contains_all(partial) =>
            {
                Some(Shadow::Removed)
            }
            CacheMutation::Clear => Some(Shadow::Removed),
            _ => None,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        self.op.kind()
    }

    pub(crate) fn into_op(self) -> CacheMutation {
        self.op
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(name: &str, characteristics: Characteristics, payload: &str) -> Mutation {
        Mutation::store(name.to_owned(), characteristics, CachedItem::new(payload)).unwrap()
    }

    #[test]
    fn test_store_shadows_only_exact_key() {
        let chr = Characteristics::new().with("chr1", 1);
        let key = chr.stable_key().unwrap();
        let mutation = store("page", chr.clone(), "x");

        assert!(matches!(
            mutation.shadow("page", &key, &chr),
            Some(Shadow::Stored(item)) if item.payload() == b"x"
        ));
        assert!(mutation.shadow("other", &key, &chr).is_none());

        let wider = chr.clone().with("chr2", 2);
        let wider_key = wider.stable_key().unwrap();
        assert!(mutation.shadow("page", &wider_key, &wider).is_none());
    }

    #[test]
    fn test_remove_all_shadows_supersets() {
        let mutation =
            Mutation::remove_all(None, Characteristics::new().with("chr2", "zwei")).unwrap();
        let matching = Characteristics::new().with("chr1", 2).with("chr2", "zwei");
        let other = Characteristics::new().with("chr2", "not-zwei");

        assert!(matches!(
            mutation.shadow("holeradio-3", &matching.stable_key().unwrap(), &matching),
            Some(Shadow::Removed)
        ));
        assert!(
            mutation
                .shadow("holeradio", &other.stable_key().unwrap(), &other)
                .is_none()
        );
    }

    #[test]
    fn test_named_remove_all_is_scoped() {
        let mutation = Mutation::remove_all(Some("a".to_owned()), Characteristics::new()).unwrap();
        let chr = Characteristics::new();
        let key = chr.stable_key().unwrap();
        assert!(mutation.shadow("a", &key, &chr).is_some());
        assert!(mutation.shadow("b", &key, &chr).is_none());
    }

    #[test]
    fn test_clear_shadows_everything() {
        let chr = Characteristics::new().with("anything", true);
        let key = chr.stable_key().unwrap();
        assert!(matches!(
            Mutation::clear().shadow("any", &key, &chr),
            Some(Shadow::Removed)
        ));
    }

    #[test]
    fn test_invalid_characteristics_rejected_when_recorded() {
        let bad = Characteristics::new().with("", 1);
        let err = Mutation::remove("page".to_owned(), bad).err().unwrap();
        assert!(matches!(err, CacheError::InvalidCharacteristics(_)));
    }
}
