use crate::cmd::{print_manifest_summary, Common};
use crate::error::{self, Result};
use cancel::CancelToken;
use clap::Parser;
use snafu::{OptionExt, ResultExt};

/// Fetches and caches `Manifest.MoM` for a version.
#[derive(Debug, Parser)]
pub(crate) struct FetchMom {
    #[clap(flatten)]
    common: Common,
}

impl FetchMom {
    pub(super) fn run(&self) -> Result<()> {
        let (transport, state, version) = self.common.resolve()?;
        let mom = repo_inspect::get_mom(&transport, &state, version, self.common.no_cache)
            .context(error::FetchMomSnafu)?;
        print_manifest_summary(&mom);
        Ok(())
    }
}

/// Fetches and caches one bundle's manifest, verified against the content hash listed for
/// it in `Manifest.MoM`.
#[derive(Debug, Parser)]
pub(crate) struct FetchManifest {
    #[clap(flatten)]
    common: Common,

    /// Bundle name, as listed in `Manifest.MoM`.
    bundle: String,
}

impl FetchManifest {
    pub(super) fn run(&self) -> Result<()> {
        let (transport, state, version) = self.common.resolve()?;
        let mom = repo_inspect::get_mom(&transport, &state, version, self.common.no_cache)
            .context(error::FetchMomSnafu)?;
        let entry = mom.find(&self.bundle).context(error::BundleNotInMomSnafu {
            bundle: self.bundle.clone(),
            version,
        })?;

        let manifest = repo_inspect::get_bundle_manifest(
            &transport,
            &state,
            entry.version,
            &self.bundle,
            Some(entry.hash),
            self.common.no_cache,
        )
        .context(error::FetchManifestSnafu {
            bundle: self.bundle.clone(),
        })?;
        print_manifest_summary(&manifest);
        Ok(())
    }
}

/// Fetches, verifies, and stages the fullfile for a content hash.
#[derive(Debug, Parser)]
pub(crate) struct FetchFullfile {
    #[clap(flatten)]
    common: Common,

    /// 64-character hex content hash to fetch.
    hash: String,
}

impl FetchFullfile {
    pub(super) fn run(&self) -> Result<()> {
        let hash: content_hash::Hash = self.hash.parse().context(error::InvalidHashSnafu {
            value: self.hash.clone(),
        })?;
        let (transport, state, version) = self.common.resolve()?;
        let staged = repo_inspect::get_fullfile(&transport, &state, version, hash, self.common.no_cache)
            .context(error::FetchFullfileSnafu { hash })?;
        println!("{}", staged.display());
        Ok(())
    }
}

/// Fetches a bundle's zero pack and stages every member it contains.
#[derive(Debug, Parser)]
pub(crate) struct FetchZeroPack {
    #[clap(flatten)]
    common: Common,

    /// Bundle name whose zero pack (`pack-<name>-from-0.tar`) should be fetched.
    bundle: String,
}

impl FetchZeroPack {
    pub(super) fn run(&self) -> Result<()> {
        let (transport, state, version) = self.common.resolve()?;
        let cancel = CancelToken::new();
        let staged = repo_inspect::get_zero_pack(
            &transport,
            &state,
            version,
            &self.bundle,
            self.common.no_cache,
            &cancel,
        )
        .context(error::FetchZeroPackSnafu {
            bundle: self.bundle.clone(),
        })?;
        println!("staged {} member(s)", staged);
        Ok(())
    }
}
