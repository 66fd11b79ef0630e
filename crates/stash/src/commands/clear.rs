//! `stash clear` command implementation.

use clap::Args;
use stash_config::Config;

use super::StoreArgs;
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the clear command.
#[derive(Args)]
pub(crate) struct ClearArgs {
    #[command(flatten)]
    store: StoreArgs,
}

impl ClearArgs {
    /// Execute the clear command.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub(crate) fn execute(self, config: &Config, output: &Output) -> Result<(), CliError> {
        let (name, store) = self.store.open(config)?;
        store.clear()?;
        output.success(&format!("Cleared '{name}'"));
        Ok(())
    }
}
