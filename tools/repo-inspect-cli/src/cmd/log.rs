use crate::cmd::Common;
use crate::error::{self, Result};
use clap::Parser;
use snafu::ResultExt;

/// Walks a path's content history backward through bundle manifests.
#[derive(Debug, Parser)]
pub(crate) struct Log {
    #[clap(flatten)]
    common: Common,

    /// Path to walk, e.g. `/etc/hostname`.
    path: String,

    /// Bundle(s) to search for `path` in, tried in order at each version visited.
    #[clap(long = "bundle", required = true, num_args = 1..)]
    bundles: Vec<String>,
}

impl Log {
    pub(super) fn run(&self) -> Result<()> {
        let (transport, state, version) = self.common.resolve()?;
        let history = repo_inspect::log_file(
            &transport,
            &state,
            &self.bundles,
            version,
            &self.path,
            self.common.no_cache,
        )
        .context(error::LogFileSnafu { path: self.path.clone() })?;

        for entry in history {
            println!("{}\t{}", entry.version, entry.hash);
        }
        Ok(())
    }
}
