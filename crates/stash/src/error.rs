//! CLI error types.

use stash_cache::CacheError;
use stash_config::ConfigError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Cache(#[from] CacheError),

    #[error("{0}")]
    Validation(String),

    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn test_broken_pipe_is_reported() {
        let err = CliError::from(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"));
        assert!(matches!(err, CliError::Io(_)));
        assert_eq!(err.to_string(), "Failed to write output: pipe closed");
    }
}
