use crate::error::{self, Result};
use snafu::ResultExt;
use std::path::Path;

/// One pack job resolved by [`resolve_recent_jobs`]: a single bundle moving from its
/// previous published version to a target version.
#[derive(Debug, Clone)]
pub struct RecentPackJob {
    pub bundle: String,
    pub from_version: u32,
    pub to_version: u32,
}

/// Lists the published version directories under `repo_root/www`, sorted descending
/// (numerically, not lexicographically), and returns the first `k`.
pub fn recent_versions(repo_root: &Path, k: usize) -> Result<Vec<u32>> {
    let www = repo_root.join("www");
    let entries = std::fs::read_dir(&www).context(error::ListVersionsSnafu { path: www.clone() })?;

    let mut versions: Vec<u32> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()))
        .collect();
    versions.sort_unstable_by(|a, b| b.cmp(a));
    versions.truncate(k);
    Ok(versions)
}

/// Resolves "build packs for the last K versions" (§4.7) into one [`RecentPackJob`] per
/// (bundle, version): for each of the `k` most recently published versions, and for each
/// bundle that has a manifest at that version, a job moving from the bundle's previous
/// published version (0 denotes "never built before", i.e. a zero pack) to that version.
///
/// `bundles` is the caller's full bundle list; a version missing a given bundle's manifest
/// (the bundle didn't exist yet, or was dropped) is silently skipped for that bundle.
pub fn resolve_recent_jobs(
    repo_root: &Path,
    bundles: &[String],
    k: usize,
) -> Result<Vec<RecentPackJob>> {
    let mut jobs = Vec::new();
    for version in recent_versions(repo_root, k)? {
        for bundle in bundles {
            let manifest_path = repo_root
                .join("www")
                .join(version.to_string())
                .join(format!("Manifest.{bundle}"));
            if !manifest_path.exists() {
                continue;
            }
            let manifest = manifest::read(bundle.clone(), &manifest_path)
                .context(error::ReadManifestSnafu { path: manifest_path })?;
            jobs.push(RecentPackJob {
                bundle: bundle.clone(),
                from_version: manifest.header.previous,
                to_version: version,
            });
        }
    }
    Ok(jobs)
}
