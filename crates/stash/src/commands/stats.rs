//! `stash stats` command implementation.

use clap::Args;
use stash_config::Config;

use super::StoreArgs;
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the stats command.
#[derive(Args)]
pub(crate) struct StatsArgs {
    #[command(flatten)]
    store: StoreArgs,
}

impl StatsArgs {
    /// Execute the stats command.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened or read.
    pub(crate) fn execute(self, config: &Config, output: &Output) -> Result<(), CliError> {
        let (name, store) = self.store.open(config)?;
        let entries = store.len()?;

        output.highlight(&format!(
            "{name} ({} backend)",
            config.store_resolved.backend
        ));
        output.result(&entries.to_string());
        Ok(())
    }
}
