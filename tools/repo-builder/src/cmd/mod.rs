mod build;
mod pack;

use self::build::Build;
use self::pack::PackRecent;
use anyhow::Result;
use clap::Parser;
use env_logger::Builder;
use log::LevelFilter;

const DEFAULT_LEVEL_FILTER: LevelFilter = LevelFilter::Info;

/// Builds and publishes update repository versions.
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
    /// Scan every bundle's installed chroot, diff against the previous version, and
    /// publish the resulting manifests, fullfiles, and packs.
    Build(Build),

    /// Build packs for the most recently published versions of every bundle, without
    /// running a new version build.
    PackRecent(PackRecent),
}

pub(crate) fn run(args: Args) -> Result<()> {
    match args.subcommand {
        Subcommand::Build(build) => build.run().map_err(anyhow::Error::from),
        Subcommand::PackRecent(pack_recent) => pack_recent.run().map_err(anyhow::Error::from),
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
