//! `stash get` command implementation.

use clap::Args;
use stash_cache::{Clock, Scalar, SystemClock};
use stash_config::Config;

use super::{StoreArgs, characteristics, parse_tag};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the get command.
#[derive(Args)]
pub(crate) struct GetArgs {
    #[command(flatten)]
    store: StoreArgs,

    /// Entry name.
    #[arg(short, long)]
    name: String,

    /// Characteristic of the entry, as TAG=VALUE (repeatable).
    #[arg(short, long = "tag", value_parser = parse_tag)]
    tags: Vec<(String, Scalar)>,

    /// Print only the metadata, not the payload.
    #[arg(long)]
    headers_only: bool,
}

impl GetArgs {
    /// Execute the get command.
    ///
    /// Metadata goes to stderr, the payload to stdout. Expired entries are
    /// reported as missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or no entry matches.
    pub(crate) fn execute(self, config: &Config, output: &Output) -> Result<(), CliError> {
        let (store_name, store) = self.store.open(config)?;
        let chr = characteristics(&self.tags)?;

        let item = store
            .get(&self.name, &chr, Some(SystemClock.now()))?
            .ok_or_else(|| {
                CliError::Validation(format!(
                    "no entry '{}' {chr} in store '{store_name}'",
                    self.name
                ))
            })?;

        output.highlight(&format!("{} {chr}", self.name));
        for (name, value) in item.metadata() {
            output.info(&format!("{name}: {value}"));
        }
        if let Some(expires_at) = item.expires_at() {
            output.info(&format!("Expires: {}", expires_at.to_rfc3339()));
        }
        if let Some(verifier) = item.verifier() {
            output.info(&format!("Verifier: {verifier}"));
        }
        output.info(&format!("Size: {} bytes", item.payload().len()));

        if !self.headers_only {
            output.raw(item.payload())?;
        }
        Ok(())
    }
}
