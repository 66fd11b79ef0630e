//! `stash gc` command implementation.

use std::time::Duration;

use clap::Args;
use stash_config::Config;

use super::StoreArgs;
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the gc command.
#[derive(Args)]
pub(crate) struct GcArgs {
    #[command(flatten)]
    store: StoreArgs,

    /// Maximum entry age in seconds (default: session.max_age_secs).
    #[arg(long, value_name = "SECS")]
    max_age: Option<u64>,
}

impl GcArgs {
    /// Execute the gc command.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub(crate) fn execute(self, config: &Config, output: &Output) -> Result<(), CliError> {
        let max_age = self
            .max_age
            .map_or_else(|| config.session.max_age(), Duration::from_secs);
        let (name, store) = self.store.open(config)?;

        let removed = store.garbage_collect(max_age)?;
        output.success(&format!(
            "Removed {removed} entries older than {}s from '{name}'",
            max_age.as_secs()
        ));
        output.result(&removed.to_string());
        Ok(())
    }
}
