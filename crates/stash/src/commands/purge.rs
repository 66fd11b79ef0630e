//! `stash purge` command implementation.

use clap::Args;
use stash_cache::Scalar;
use stash_config::Config;

use super::{StoreArgs, characteristics, parse_tag};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the purge command.
#[derive(Args)]
pub(crate) struct PurgeArgs {
    #[command(flatten)]
    store: StoreArgs,

    /// Only purge entries with this name.
    #[arg(short, long)]
    name: Option<String>,

    /// Purge entries whose characteristics include TAG=VALUE (repeatable).
    #[arg(short, long = "tag", value_parser = parse_tag)]
    tags: Vec<(String, Scalar)>,
}

impl PurgeArgs {
    /// Execute the purge command.
    ///
    /// # Errors
    ///
    /// Returns an error if neither a name nor a tag is given, or if the store
    /// fails.
    pub(crate) fn execute(self, config: &Config, output: &Output) -> Result<(), CliError> {
        if self.name.is_none() && self.tags.is_empty() {
            return Err(CliError::Validation(
                "purge needs --name and/or --tag; use `stash clear` to empty a store".to_owned(),
            ));
        }
        let (store_name, store) = self.store.open(config)?;
        let partial = characteristics(&self.tags)?;

        let removed = store.remove_all(self.name.as_deref(), &partial)?;
        if removed == 0 {
            output.warning(&format!("No matching entries in '{store_name}'"));
        } else {
            output.success(&format!("Purged {removed} entries from '{store_name}'"));
        }
        output.result(&removed.to_string());
        Ok(())
    }
}
