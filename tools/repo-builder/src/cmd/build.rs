use crate::config::RepoConfig;
use crate::error::{self, Result};
use crate::publish;
use cancel::CancelToken;
use clap::Parser;
use content_hash::Hash;
use fullfile_pack::SourceKind;
use manifest::{FileType, Manifest};
use repo_build::{BuildRequest, BundleBuildInput};
use snafu::{OptionExt, ResultExt};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Scans every bundle's chroot, diffs against the previous version, and publishes the
/// resulting manifests, fullfiles, and packs for one new version.
#[derive(Debug, Parser)]
pub(crate) struct Build {
    /// Root of the repository's on-disk state (contains `image/` and `www/`).
    #[clap(long = "repo-root", env = "REPO_BUILDER_REPO_ROOT")]
    repo_root: PathBuf,

    /// Path to the bundle-definitions TOML file (§10.3's "declarative bundle definitions").
    #[clap(long = "config", default_value = "Repo.toml")]
    config: PathBuf,

    /// The new version number to build. Must be >= the last published version.
    #[clap(long)]
    version: u32,

    /// Unix timestamp used as the single build clock for this version. Defaults to now.
    #[clap(long)]
    build_clock: Option<u64>,

    /// Worker threads for per-bundle diffing; 0 = one per logical CPU.
    #[clap(long = "bundle-workers", env = "REPO_BUILDER_BUNDLE_WORKERS", default_value_t = 0)]
    bundle_workers: usize,

    /// Worker threads for fullfile packaging; 0 = one per logical CPU.
    #[clap(long = "fullfile-workers", env = "REPO_BUILDER_FULLFILE_WORKERS", default_value_t = 0)]
    fullfile_workers: usize,

    /// Worker threads for pack building; 0 = one per logical CPU.
    #[clap(long = "delta-workers", env = "REPO_BUILDER_DELTA_WORKERS", default_value_t = 0)]
    delta_workers: usize,

    /// Rename-candidate similarity threshold (0-100); see `manifest::DEFAULT_RENAME_THRESHOLD`.
    #[clap(long = "rename-threshold", default_value_t = manifest::DEFAULT_RENAME_THRESHOLD)]
    rename_threshold: u32,

    /// Maximum size difference (percent) tolerated between rename candidates.
    #[clap(long = "rename-size-tolerance", default_value_t = 10)]
    rename_size_tolerance_pct: u64,

    /// Path to a certificate to sign `Manifest.MoM` with, via an external `openssl` binary.
    /// Skipped (with a warning) when absent.
    #[clap(long = "cert")]
    cert: Option<PathBuf>,
}

impl Build {
    pub(super) fn run(&self) -> Result<()> {
        let cancel = CancelToken::new();
        let config = RepoConfig::load(&self.config)?;
        let image_root = self.repo_root.join("image");
        let www_root = self.repo_root.join("www");

        let previous_version = publish::read_last_version(&image_root)?;
        let www_dir = www_root.join(self.version.to_string());
        let prev_www_dir = previous_version.map(|v| www_root.join(v.to_string()));

        let build_clock = self.build_clock.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("system clock is after the unix epoch")
                .as_secs()
        });

        let mut chroot_by_name: HashMap<String, PathBuf> = HashMap::new();
        let mut bundles = Vec::with_capacity(config.bundles.len());
        for bundle in &config.bundles {
            let chroot_root = image_root.join(self.version.to_string()).join(&bundle.name);
            let scanned = bundle_scan::scan_bundle(&chroot_root).context(error::ScanSnafu {
                bundle: bundle.name.clone(),
                path: chroot_root.clone(),
            })?;
            chroot_by_name.insert(bundle.name.clone(), chroot_root.clone());
            bundles.push(BundleBuildInput {
                name: bundle.name.clone(),
                includes: bundle.includes.clone(),
                scanned,
                chroot_root,
            });
        }

        let previous_bundles = load_previous_bundles(&config, prev_www_dir.as_deref())?;
        let previous_mom = prev_www_dir
            .as_deref()
            .map(|dir| load_manifest("MoM", &dir.join("Manifest.MoM")))
            .transpose()?;
        let previous_full = prev_www_dir
            .as_deref()
            .map(|dir| load_manifest("full", &dir.join("Manifest.full")))
            .transpose()?;

        let request = BuildRequest {
            format: config.format,
            version: self.version,
            build_clock,
            bundle_workers: self.bundle_workers,
            rename_threshold: self.rename_threshold,
            rename_size_tolerance_pct: self.rename_size_tolerance_pct,
            www_dir: www_dir.clone(),
            prev_www_dir: prev_www_dir.clone(),
            cancel: cancel.clone(),
        };

        log::info!(
            "building version {} ({} bundles) from previous version {:?}",
            self.version,
            bundles.len(),
            previous_version
        );

        let output = repo_build::build_version(
            bundles,
            &previous_bundles,
            previous_mom.as_ref(),
            previous_full.as_ref(),
            &request,
        )
        .context(error::BuildSnafu)?;

        let jobs = self.fullfile_jobs(&output.full, &chroot_by_name)?;
        log::info!("materializing {} fullfiles for version {}", jobs.len(), self.version);
        fullfile_pack::build_fullfiles(
            jobs,
            &fullfile_pack::FullfileRequest {
                out_dir: www_dir.join("files"),
                workers: self.fullfile_workers,
                build_clock,
                cancel: cancel.clone(),
            },
        )
        .context(error::FullfileSnafu)?;

        for bundle in &config.bundles {
            let new_manifest = &output.bundle_manifests[&bundle.name];
            let prev_manifest = previous_bundles.get(&bundle.name);
            let from_version = prev_manifest.map(|m| m.header.version).unwrap_or(0);
            let plan = delta_pack::plan_pack(prev_manifest, new_manifest);
            if plan.is_empty() {
                continue;
            }
            let out_path = www_dir.join(format!("pack-{}-from-{}.tar", bundle.name, from_version));
            log::info!(
                "building pack for bundle '{}' from version {} to {} ({} entries)",
                bundle.name,
                from_version,
                self.version,
                plan.len()
            );
            delta_pack::build_pack(
                plan,
                &delta_pack::PackRequest {
                    from_version,
                    to_version: self.version,
                    files_dir_from: prev_www_dir.as_ref().map(|d| d.join("files")),
                    files_dir_to: www_dir.join("files"),
                    out_path,
                    workers: self.delta_workers,
                    cancel: cancel.clone(),
                },
            )
            .context(error::PackSnafu {
                bundle: bundle.name.clone(),
            })?;
        }

        if let Some(cert) = &self.cert {
            let sig = publish::sign_mom(&www_dir.join("Manifest.MoM"), cert, &cancel)?;
            log::info!("signed Manifest.MoM at '{}'", sig.display());
        } else {
            log::warn!("no --cert provided; Manifest.MoM.sig was not produced");
        }

        publish::publish_pointers(&self.repo_root, &image_root, config.format, self.version)?;
        log::info!("published version {}", self.version);

        Ok(())
    }

    /// Builds the fullfile job list for every hash introduced at this version, per §4.6:
    /// present entries whose `version` equals the version being built, de-duplicated by
    /// hash so a hash shared by several bundles is materialized exactly once.
    fn fullfile_jobs(
        &self,
        full: &Manifest,
        chroot_by_name: &HashMap<String, PathBuf>,
    ) -> Result<Vec<fullfile_pack::FullfileJob>> {
        let mut seen: HashSet<Hash> = HashSet::new();
        let mut jobs = Vec::new();

        for file in &full.files {
            if !file.is_present() || file.version != self.version {
                continue;
            }
            if !seen.insert(file.hash) {
                continue;
            }

            let source = match file.flags.file_type {
                FileType::Directory => SourceKind::Directory,
                FileType::Symlink => {
                    let path = resolve_source_path(chroot_by_name, &file.name)?;
                    let target = std::fs::read_link(&path).context(error::ReadLinkSnafu { path })?;
                    SourceKind::Symlink {
                        target: target.to_string_lossy().into_owned(),
                    }
                }
                FileType::Regular => SourceKind::Regular {
                    path: resolve_source_path(chroot_by_name, &file.name)?,
                },
                FileType::Unset | FileType::Manifest => {
                    return error::UnresolvedSourceSnafu {
                        name: file.name.clone(),
                    }
                    .fail();
                }
            };

            jobs.push(fullfile_pack::FullfileJob {
                hash: file.hash,
                source,
                info: file.info,
            });
        }

        Ok(jobs)
    }
}

/// Finds `name` under one of the scanned bundle chroots. Any bundle's chroot works: the
/// content store is addressed purely by hash, and a present path with a given hash has
/// identical bytes regardless of which bundle it was scanned from.
fn resolve_source_path(chroot_by_name: &HashMap<String, PathBuf>, name: &str) -> Result<PathBuf> {
    let relative = name.trim_start_matches('/');
    chroot_by_name
        .values()
        .map(|root| root.join(relative))
        .find(|candidate| candidate.exists())
        .context(error::UnresolvedSourceSnafu { name })
}

fn load_previous_bundles(
    config: &RepoConfig,
    prev_www_dir: Option<&Path>,
) -> Result<HashMap<String, Manifest>> {
    let mut previous = HashMap::new();
    let Some(prev_www_dir) = prev_www_dir else {
        return Ok(previous);
    };
    for bundle in &config.bundles {
        let path = prev_www_dir.join(format!("Manifest.{}", bundle.name));
        if !path.exists() {
            continue;
        }
        previous.insert(bundle.name.clone(), load_manifest(&bundle.name, &path)?);
    }
    Ok(previous)
}

fn load_manifest(name: &str, path: &Path) -> Result<Manifest> {
    manifest::read(name.to_string(), path).context(error::ReadPreviousManifestSnafu {
        path: path.to_path_buf(),
    })
}
