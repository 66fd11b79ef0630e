//! Configuration management for stash.
//!
//! Parses `stash.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ```toml
//! [store]
//! backend = "file"        # "file" | "memory" | "null"
//! dir = ".stash/cache"    # relative to the config file
//! version = "1"           # bump to discard the file backend's contents
//!
//! [session]
//! store = "session"
//! max_age_secs = 86400
//! ```
//!
//! ## Environment Variable Expansion
//!
//! `store.dir` supports environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//! - a leading `~` expands to the home directory

mod expand;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override the store backend.
    pub backend: Option<Backend>,
    /// Override the file backend root.
    pub cache_dir: Option<PathBuf>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "stash.toml";

/// Default file backend root, relative to the config directory.
const DEFAULT_CACHE_DIR: &str = ".stash/cache";

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Store configuration (paths are relative strings from TOML).
    store: StoreConfigRaw,
    /// Session configuration.
    pub session: SessionConfig,

    /// Resolved store configuration (set after loading).
    #[serde(skip)]
    pub store_resolved: StoreConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Storage backend for cache stores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// One file per entry under `store.dir`.
    #[default]
    File,
    /// Process-local maps; contents are lost on exit.
    Memory,
    /// Caching disabled; every lookup misses.
    Null,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::File => "file",
            Self::Memory => "memory",
            Self::Null => "null",
        })
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(Self::File),
            "memory" => Ok(Self::Memory),
            "null" => Ok(Self::Null),
            other => Err(format!(
                "unknown backend '{other}' (expected file, memory or null)"
            )),
        }
    }
}

/// Raw store configuration as parsed from TOML (paths as strings).
#[derive(Debug, Deserialize)]
#[serde(default)]
struct StoreConfigRaw {
    backend: Backend,
    dir: Option<String>,
    version: String,
}

impl Default for StoreConfigRaw {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            dir: None,
            version: "1".to_owned(),
        }
    }
}

/// Resolved store configuration with absolute paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Storage backend.
    pub backend: Backend,
    /// File backend root.
    pub dir: PathBuf,
    /// File backend format version; a mismatch wipes `dir`.
    pub version: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            dir: PathBuf::from(DEFAULT_CACHE_DIR),
            version: "1".to_owned(),
        }
    }
}

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Store name holding sessions.
    pub store: String,
    /// Sessions not saved for this many seconds are garbage collected.
    pub max_age_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            store: "session".to_owned(),
            max_age_secs: 86_400,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`store.dir`").
        field: String,
        /// Error message (e.g., "${`STASH_DIR`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `stash.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails, or
    /// the result does not validate.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(backend) = settings.backend {
            self.store_resolved.backend = backend;
        }
        if let Some(cache_dir) = &settings.cache_dir {
            self.store_resolved.dir.clone_from(cache_dir);
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        Self {
            store: StoreConfigRaw::default(),
            session: SessionConfig::default(),
            store_resolved: StoreConfig {
                dir: base.join(DEFAULT_CACHE_DIR),
                ..StoreConfig::default()
            },
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Called automatically after loading from file and after applying CLI
    /// settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_store()?;
        self.validate_session()?;
        Ok(())
    }

    fn validate_store(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.store_resolved.version, "store.version")?;
        if self.store_resolved.backend == Backend::File
            && self.store_resolved.dir.as_os_str().is_empty()
        {
            return Err(ConfigError::Validation(
                "store.dir cannot be empty for the file backend".to_owned(),
            ));
        }
        Ok(())
    }

    fn validate_session(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.session.store, "session.store")?;
        if self.session.max_age_secs == 0 {
            return Err(ConfigError::Validation(
                "session.max_age_secs must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(ref dir) = self.store.dir {
            self.store.dir = Some(expand::expand_env(dir, "store.dir")?);
        }
        Ok(())
    }

    /// Resolve relative paths to absolute paths based on config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let dir = self.store.dir.as_deref().unwrap_or(DEFAULT_CACHE_DIR);
        self.store_resolved = StoreConfig {
            backend: self.store.backend,
            dir: config_dir.join(dir),
            version: self.store.version.clone(),
        };
    }
}
