//! CLI command implementations.

mod clear;
mod gc;
mod get;
mod purge;
mod stats;

use std::sync::Arc;

use clap::Args;
use stash_cache::{
    Characteristics, FileRegistry, KeyedCacheStore, NullRegistry, Scalar, StoreRegistry,
};
use stash_config::{Backend, Config};

pub(crate) use clear::ClearArgs;
pub(crate) use gc::GcArgs;
pub(crate) use get::GetArgs;
pub(crate) use purge::PurgeArgs;
pub(crate) use stats::StatsArgs;

use crate::error::CliError;

/// Store selection shared by every command.
#[derive(Args)]
pub(crate) struct StoreArgs {
    /// Store name (default: the configured session store).
    #[arg(short, long)]
    store: Option<String>,

    /// Address the process-local partition instead of the shared one.
    #[arg(long)]
    local: bool,
}

impl StoreArgs {
    /// Resolve the selected store through the configured backend.
    pub(crate) fn open(
        &self,
        config: &Config,
    ) -> Result<(String, Arc<dyn KeyedCacheStore>), CliError> {
        let name = self
            .store
            .clone()
            .unwrap_or_else(|| config.session.store.clone());
        let store = open_registry(config)?.resolve(&name, !self.local)?;
        Ok((name, store))
    }
}

/// Build the registry for the configured backend.
///
/// The memory backend lives and dies with one process, so a CLI invocation
/// would only ever see an empty store; it is rejected.
pub(crate) fn open_registry(config: &Config) -> Result<Box<dyn StoreRegistry>, CliError> {
    let store = &config.store_resolved;
    tracing::info!(backend = %store.backend, dir = %store.dir.display(), "opening cache registry");
    match store.backend {
        Backend::File => Ok(Box::new(FileRegistry::new(store.dir.clone(), &store.version)?)),
        Backend::Null => Ok(Box::new(NullRegistry)),
        Backend::Memory => Err(CliError::Validation(
            "the memory backend is process-local and cannot be inspected from the CLI; \
             use --backend file"
                .to_owned(),
        )),
    }
}

/// Parse a `tag=value` characteristic.
///
/// Values parse as bool, then integer, then float, else string.
pub(crate) fn parse_tag(arg: &str) -> Result<(String, Scalar), String> {
    let (tag, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected TAG=VALUE, got '{arg}'"))?;
    if tag.is_empty() {
        return Err(format!("empty tag name in '{arg}'"));
    }
    Ok((tag.to_owned(), Scalar::parse(value)))
}

/// Collect parsed tags into characteristics, validating them.
pub(crate) fn characteristics(tags: &[(String, Scalar)]) -> Result<Characteristics, CliError> {
    let characteristics: Characteristics = tags.iter().cloned().collect();
    characteristics.validate()?;
    Ok(characteristics)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use pretty_assertions::assert_eq;
    use stash_cache::CachedItem;
    use stash_config::CliSettings;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_parse_tag_types() {
        assert_eq!(parse_tag("chr1=1").unwrap(), ("chr1".to_owned(), Scalar::Int(1)));
        assert_eq!(
            parse_tag("chr2=zwei").unwrap(),
            ("chr2".to_owned(), Scalar::Str("zwei".to_owned()))
        );
        assert_eq!(parse_tag("admin=true").unwrap().1, Scalar::Bool(true));
        assert_eq!(parse_tag("ratio=0.5").unwrap().1, Scalar::Float(0.5));
        // Only the first '=' separates
        assert_eq!(
            parse_tag("q=a=b").unwrap(),
            ("q".to_owned(), Scalar::Str("a=b".to_owned()))
        );
    }

    #[test]
    fn test_parse_tag_rejects_malformed() {
        assert!(parse_tag("chr1").unwrap_err().contains("TAG=VALUE"));
        assert!(parse_tag("=1").unwrap_err().contains("empty tag"));
    }

    #[test]
    fn test_characteristics_from_tags() {
        let tags = vec![parse_tag("chr2=zwei").unwrap(), parse_tag("chr1=2").unwrap()];
        let chr = characteristics(&tags).unwrap();
        assert_eq!(chr, Characteristics::new().with("chr1", 2).with("chr2", "zwei"));
    }

    fn file_config(tmp: &TempDir) -> Config {
        let settings = CliSettings {
            cache_dir: Some(tmp.path().join("cache")),
            ..Default::default()
        };
        let path = tmp.path().join("stash.toml");
        std::fs::write(&path, "").unwrap();
        Config::load(Some(path.as_path()), Some(&settings)).unwrap()
    }

    #[test]
    fn test_store_args_default_to_shared_session_store() {
        let tmp = TempDir::new().unwrap();
        let config = file_config(&tmp);
        let chr = Characteristics::new();

        let registry = open_registry(&config).unwrap();
        registry
            .resolve("session", true)
            .unwrap()
            .store("a", &chr, CachedItem::new("x"))
            .unwrap();

        let args = StoreArgs {
            store: None,
            local: false,
        };
        let (name, store) = args.open(&config).unwrap();
        assert_eq!(name, "session");
        assert_eq!(store.len().unwrap(), 1);

        let local = StoreArgs {
            store: Some("session".to_owned()),
            local: true,
        };
        assert_eq!(local.open(&config).unwrap().1.len().unwrap(), 0);
    }

    #[test]
    fn test_open_registry_per_backend() {
        let tmp = TempDir::new().unwrap();
        let mut config = file_config(&tmp);
        open_registry(&config).unwrap();
        assert!(tmp.path().join("cache/VERSION").exists());

        config.store_resolved.backend = Backend::Null;
        config.store_resolved.dir = PathBuf::from("/nonexistent");
        let store = open_registry(&config).unwrap().resolve("x", true).unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_memory_backend_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let mut config = file_config(&tmp);
        config.store_resolved.backend = Backend::Memory;

        let err = open_registry(&config).err().unwrap();
        assert!(matches!(err, CliError::Validation(_)));
        assert!(err.to_string().contains("process-local"));
    }
}
