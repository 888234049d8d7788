mod diff;
mod fetch;
mod log;

use self::diff::Diff;
use self::fetch::{FetchFullfile, FetchManifest, FetchMom, FetchZeroPack};
use self::log::Log;
use crate::error::{self, Result};
use clap::Parser;
use env_logger::Builder;
use log::LevelFilter;
use repo_inspect::{AliasTable, StateDir, Transport};
use snafu::ResultExt;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_LEVEL_FILTER: LevelFilter = LevelFilter::Info;

/// Fetches and inspects content from an update repository.
#[derive(Debug, Parser)]
#[clap(about, long_about = None, version)]
pub(crate) struct Args {
    /// Set the logging level. One of [off|error|warn|info|debug|trace]. You can also leave
    /// this unset and use the RUST_LOG env variable.
    #[clap(long = "log-level")]
    pub(crate) log_level: Option<LevelFilter>,

    #[clap(subcommand)]
    pub(crate) subcommand: Subcommand,
}

#[derive(Debug, Parser)]
pub(crate) enum Subcommand {
    /// Fetches and caches `Manifest.MoM` for a version.
    FetchMom(FetchMom),

    /// Fetches and caches one bundle's manifest, verified against `Manifest.MoM`.
    FetchManifest(FetchManifest),

    /// Fetches, verifies, and stages the fullfile for a content hash.
    FetchFullfile(FetchFullfile),

    /// Fetches a bundle's zero pack and stages every member it contains.
    FetchZeroPack(FetchZeroPack),

    /// Diffs two versions of `Manifest.MoM` or a single bundle's manifest.
    Diff(Diff),

    /// Walks a path's content history backward through bundle manifests.
    Log(Log),
}

pub(crate) fn run(args: Args) -> anyhow::Result<()> {
    match args.subcommand {
        Subcommand::FetchMom(cmd) => cmd.run().map_err(anyhow::Error::from),
        Subcommand::FetchManifest(cmd) => cmd.run().map_err(anyhow::Error::from),
        Subcommand::FetchFullfile(cmd) => cmd.run().map_err(anyhow::Error::from),
        Subcommand::FetchZeroPack(cmd) => cmd.run().map_err(anyhow::Error::from),
        Subcommand::Diff(cmd) => cmd.run().map_err(anyhow::Error::from),
        Subcommand::Log(cmd) => cmd.run().map_err(anyhow::Error::from),
    }
}

/// Use `level` if present, or else `RUST_LOG` if present, or else a default of `info`.
pub(crate) fn init_logger(level: Option<LevelFilter>) {
    match (std::env::var(env_logger::DEFAULT_FILTER_ENV).ok(), level) {
        (Some(_), None) => {
            Builder::from_default_env().init();
        }
        _ => {
            Builder::new()
                .filter(Some(env!("CARGO_CRATE_NAME")), level.unwrap_or(DEFAULT_LEVEL_FILTER))
                .init();
        }
    }
}

/// Location and caching arguments shared by every subcommand, per §6's inspector grammar:
/// a `<base>/<version>` spec, an optional alias table, and the local state directory that
/// fetched content gets cached under.
#[derive(Debug, Parser)]
pub(crate) struct Common {
    /// `<base>/<version>`, e.g. `clear/20520`, `file:///srv/repo/20520`, or an alias entry
    /// defined in `--alias-file`.
    pub(crate) location: String,

    /// TOML file mapping short aliases to base URLs. The `clear` alias is always available.
    #[clap(long = "alias-file", env = "REPO_INSPECT_ALIAS_FILE")]
    pub(crate) alias_file: Option<PathBuf>,

    /// Local directory to cache fetched content under.
    #[clap(long = "state-dir", env = "REPO_INSPECT_STATE_DIR")]
    pub(crate) state_dir: PathBuf,

    /// Refuse to make network requests; only `file://` bases work.
    #[clap(long)]
    pub(crate) offline: bool,

    /// Retries for transient fetch failures.
    #[clap(long, default_value_t = repo_inspect::DEFAULT_RETRIES)]
    pub(crate) retries: u32,

    /// Per-request timeout, in seconds.
    #[clap(long = "timeout-secs", default_value_t = 120)]
    pub(crate) timeout_secs: u64,

    /// Refetch even if a cached copy already exists.
    #[clap(long = "no-cache")]
    pub(crate) no_cache: bool,
}

impl Common {
    /// Resolves the location into a transport and an open state directory, and returns the
    /// version parsed out of it.
    pub(crate) fn resolve(&self) -> Result<(Transport, StateDir, u32)> {
        let aliases = match &self.alias_file {
            Some(path) => AliasTable::load(path).context(error::LoadAliasesSnafu { path: path.clone() })?,
            None => AliasTable::default(),
        };
        let (base, version) = repo_inspect::parse_location(&self.location, &aliases).context(
            error::ParseLocationSnafu {
                location: self.location.clone(),
            },
        )?;

        let transport = Transport::new(
            base.clone(),
            self.offline,
            self.retries,
            Duration::from_secs(self.timeout_secs),
        )
        .context(error::BuildTransportSnafu)?;
        let state = StateDir::open(self.state_dir.clone(), &base)
            .context(error::OpenStateDirSnafu { path: self.state_dir.clone() })?;

        Ok((transport, state, version))
    }
}

/// Prints a one-line summary of a fetched manifest, for the `fetch-*` subcommands.
pub(crate) fn print_manifest_summary(manifest: &manifest::Manifest) {
    println!(
        "{} version={} previous={} files={} includes={:?}",
        manifest.name,
        manifest.header.version,
        manifest.header.previous,
        manifest.files.len(),
        manifest.header.includes,
    );
}
