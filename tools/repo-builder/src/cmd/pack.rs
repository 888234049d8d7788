use crate::config::RepoConfig;
use crate::error::{self, Result};
use cancel::CancelToken;
use clap::Parser;
use snafu::ResultExt;
use std::path::PathBuf;

/// Builds packs for the `k` most recently published versions of every bundle, without
/// running a new version build. This is §4.7's "build packs for the last K versions"
/// convenience entry point.
#[derive(Debug, Parser)]
pub(crate) struct PackRecent {
    /// Root of the repository's on-disk state (contains `image/` and `www/`).
    #[clap(long = "repo-root", env = "REPO_BUILDER_REPO_ROOT")]
    repo_root: PathBuf,

    /// Path to the bundle-definitions TOML file.
    #[clap(long = "config", default_value = "Repo.toml")]
    config: PathBuf,

    /// How many of the most recently published versions to (re)build packs for.
    #[clap(long, default_value_t = 1)]
    k: usize,

    /// Worker threads for pack building; 0 = one per logical CPU.
    #[clap(long = "delta-workers", env = "REPO_BUILDER_DELTA_WORKERS", default_value_t = 0)]
    delta_workers: usize,
}

impl PackRecent {
    pub(super) fn run(&self) -> Result<()> {
        let cancel = CancelToken::new();
        let config = RepoConfig::load(&self.config)?;
        let bundle_names: Vec<String> = config.bundles.iter().map(|b| b.name.clone()).collect();

        let jobs = delta_pack::resolve_recent_jobs(&self.repo_root, &bundle_names, self.k)
            .context(error::RecentJobsSnafu)?;
        log::info!("resolved {} pack jobs across the last {} version(s)", jobs.len(), self.k);

        let www_root = self.repo_root.join("www");
        for job in jobs {
            let to_dir = www_root.join(job.to_version.to_string());
            let from_dir = (job.from_version > 0).then(|| www_root.join(job.from_version.to_string()));

            let to_manifest = manifest::read(
                job.bundle.clone(),
                to_dir.join(format!("Manifest.{}", job.bundle)),
            )
            .context(error::ReadPreviousManifestSnafu {
                path: to_dir.join(format!("Manifest.{}", job.bundle)),
            })?;
            let from_manifest = from_dir
                .as_ref()
                .map(|dir| {
                    manifest::read(job.bundle.clone(), dir.join(format!("Manifest.{}", job.bundle))).context(
                        error::ReadPreviousManifestSnafu {
                            path: dir.join(format!("Manifest.{}", job.bundle)),
                        },
                    )
                })
                .transpose()?;

            let plan = delta_pack::plan_pack(from_manifest.as_ref(), &to_manifest);
            if plan.is_empty() {
                continue;
            }

            let out_path = to_dir.join(format!("pack-{}-from-{}.tar", job.bundle, job.from_version));
            log::info!(
                "building pack for bundle '{}' from version {} to {} ({} entries)",
                job.bundle,
                job.from_version,
                job.to_version,
                plan.len()
            );
            delta_pack::build_pack(
                plan,
                &delta_pack::PackRequest {
                    from_version: job.from_version,
                    to_version: job.to_version,
                    files_dir_from: from_dir.map(|d| d.join("files")),
                    files_dir_to: to_dir.join("files"),
                    out_path,
                    workers: self.delta_workers,
                    cancel: cancel.clone(),
                },
            )
            .context(error::PackSnafu { bundle: job.bundle })?;
        }

        Ok(())
    }
}
