use crate::aggregate::{
    bundle_manifest_changed, build_full, build_mom, FullParams, MomEntry, MomParams,
};
use crate::closure::compute_all;
use crate::diff::{diff_bundle, DiffParams};
use crate::error::{self, Result};
use crate::rename::RenameInputs;
use cancel::CancelToken;
use manifest::{FileRecord, Manifest};
use snafu::ResultExt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One bundle's scanned input to a version build: the chroot scan (C4 output, `version`
/// fields unset) plus the declared `includes` from its bundle definition.
pub struct BundleBuildInput {
    pub name: String,
    pub includes: Vec<String>,
    pub scanned: Vec<FileRecord>,
    /// `image/<ver>/<bundle>/`, used only for rename-detection content reads.
    pub chroot_root: PathBuf,
}

/// Knobs for one `build_version` invocation, corresponding to §4.5/§5/§6's worker count,
/// rename threshold, and output locations.
pub struct BuildRequest {
    pub format: u32,
    pub version: u32,
    pub build_clock: u64,
    /// `0` means "one worker per logical CPU", per §5.
    pub bundle_workers: usize,
    pub rename_threshold: u32,
    pub rename_size_tolerance_pct: u64,
    /// `www/<version>/`, where `Manifest.<bundle>`, `Manifest.MoM`, and `Manifest.full`
    /// are written.
    pub www_dir: PathBuf,
    /// `www/<previous-version>/`, if one exists; used to locate the previous fullfile
    /// store for rename-detection content reads.
    pub prev_www_dir: Option<PathBuf>,
    /// Observed between bundles (never mid-bundle); a cancelled build aborts with
    /// [`error::Error::Cancelled`] once every in-flight bundle job finishes its current
    /// bundle, per §5.
    pub cancel: CancelToken,
}

pub struct BuildOutput {
    pub bundle_manifests: HashMap<String, Manifest>,
    pub mom: Manifest,
    pub full: Manifest,
}

fn effective_workers(requested: usize) -> usize {
    if requested == 0 {
        num_cpus::get().max(1)
    } else {
        requested
    }
}

/// Splits `items` into up to `workers` roughly-equal, order-preserving chunks.
fn partition<T>(items: Vec<T>, workers: usize) -> Vec<Vec<T>> {
    let workers = workers.max(1);
    let mut chunks: Vec<Vec<T>> = (0..workers).map(|_| Vec::new()).collect();
    for (i, item) in items.into_iter().enumerate() {
        chunks[i % workers].push(item);
    }
    chunks.into_iter().filter(|c| !c.is_empty()).collect()
}

struct BundleJobResult {
    name: String,
    manifest: Manifest,
    mom_entry: MomEntry,
}

/// Runs one version build (C5): diffs each bundle against its previous manifest across a
/// pool of `W_bundle` worker threads, writes each resulting bundle manifest to disk,
/// assembles and writes `Manifest.MoM` and `Manifest.full`.
///
/// Ordering follows §5: all per-bundle diff/write jobs complete before `Manifest.MoM` is
/// assembled, and `Manifest.full` is built (and written) last.
pub fn build_version(
    bundles: Vec<BundleBuildInput>,
    previous_bundles: &HashMap<String, Manifest>,
    previous_mom: Option<&Manifest>,
    previous_full: Option<&Manifest>,
    request: &BuildRequest,
) -> Result<BuildOutput> {
    std::fs::create_dir_all(&request.www_dir).context(error::CreateDirSnafu {
        path: request.www_dir.clone(),
    })?;

    let includes_map: HashMap<String, Vec<String>> = bundles
        .iter()
        .map(|b| (b.name.clone(), b.includes.clone()))
        .collect();
    let closures = compute_all(&includes_map)?;

    let workers = effective_workers(request.bundle_workers);
    let chunks = partition(bundles, workers);

    let mut job_results: Vec<BundleJobResult> = Vec::new();
    let mut first_error: Option<error::Error> = None;

    std::thread::scope(|scope| {
        let mut handles = Vec::new();
        for chunk in chunks {
            let previous_bundles = &*previous_bundles;
            let previous_mom = previous_mom;
            let request = &*request;
            handles.push(scope.spawn(move || -> Result<Vec<BundleJobResult>> {
                let mut results = Vec::with_capacity(chunk.len());
                for input in chunk {
                    if request.cancel.is_cancelled() {
                        return error::CancelledSnafu.fail();
                    }
                    results.push(run_one_bundle(input, previous_bundles, previous_mom, request)?);
                }
                Ok(results)
            }));
        }
        for handle in handles {
            match handle.join() {
                Ok(Ok(mut results)) => job_results.append(&mut results),
                Ok(Err(e)) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
                Err(_) => {
                    if first_error.is_none() {
                        first_error = Some(error::Error::WorkerPanic {
                            bundle: "<unknown>".to_string(),
                        });
                    }
                }
            }
        }
    });

    if let Some(e) = first_error {
        return Err(e);
    }

    let mut bundle_manifests: HashMap<String, Manifest> = HashMap::new();
    let mut mom_entries: Vec<MomEntry> = Vec::new();
    for result in job_results {
        bundle_manifests.insert(result.name, result.manifest);
        mom_entries.push(result.mom_entry);
    }

    let mom = build_mom(
        mom_entries,
        &MomParams {
            format: request.format,
            version: request.version,
            previous_version: previous_mom.map(|m| m.header.version).unwrap_or(0),
            build_clock: request.build_clock,
        },
    );
    manifest::write(&mom, request.www_dir.join("Manifest.MoM")).context(error::ManifestSnafu {
        bundle: "MoM",
    })?;

    let full = build_full(
        &bundle_manifests,
        &closures,
        &FullParams {
            format: request.format,
            version: request.version,
            previous_version: previous_full.map(|m| m.header.version).unwrap_or(0),
            build_clock: request.build_clock,
        },
    );
    manifest::write(&full, request.www_dir.join("Manifest.full")).context(error::ManifestSnafu {
        bundle: "full",
    })?;

    Ok(BuildOutput {
        bundle_manifests,
        mom,
        full,
    })
}

fn run_one_bundle(
    input: BundleBuildInput,
    previous_bundles: &HashMap<String, Manifest>,
    previous_mom: Option<&Manifest>,
    request: &BuildRequest,
) -> Result<BundleJobResult> {
    let BundleBuildInput {
        name,
        includes,
        scanned,
        chroot_root,
    } = input;

    let previous = previous_bundles.get(&name);
    let prev_files_dir = request.prev_www_dir.as_ref().map(|p| p.join("files"));
    let rename_inputs = RenameInputs {
        new_chroot: &chroot_root,
        prev_files_dir: prev_files_dir.as_deref(),
    };

    let diff_params = DiffParams {
        format: request.format,
        version: request.version,
        build_clock: request.build_clock,
        rename_threshold: request.rename_threshold,
        rename_size_tolerance_pct: request.rename_size_tolerance_pct,
    };

    let manifest = diff_bundle(&name, scanned, includes, previous, &diff_params, &rename_inputs);

    let manifest_path = request.www_dir.join(format!("Manifest.{name}"));
    manifest::write(&manifest, &manifest_path).context(error::ManifestSnafu {
        bundle: name.as_str(),
    })?;

    let hash =
        content_hash::hash_of(&manifest_path).context(error::HashManifestSnafu { path: manifest_path })?;

    let changed = bundle_manifest_changed(&manifest, previous);
    let carried_version = previous_mom
        .and_then(|m| m.find(&name))
        .map(|f| f.version)
        .unwrap_or(request.version);
    let version = if changed { request.version } else { carried_version };

    Ok(BundleJobResult {
        name: name.clone(),
        manifest,
        mom_entry: MomEntry { name, hash, version },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use manifest::{FileInfo, FileType, Flags};
    use std::fs;
    use tempfile::TempDir;

    fn scanned_hostname(content: &[u8]) -> Vec<FileRecord> {
        let hash = {
            let dir = TempDir::new().unwrap();
            let p = dir.path().join("hostname");
            fs::write(&p, content).unwrap();
            content_hash::hash_of(&p).unwrap()
        };
        let mut f = FileRecord::new("/etc/hostname", hash, 0, Flags::present(FileType::Regular));
        f.info = Some(FileInfo {
            size: content.len() as u64,
            ..Default::default()
        });
        vec![f]
    }

    fn chroot_with(root: &Path, content: &[u8]) -> PathBuf {
        let etc = root.join("etc");
        fs::create_dir_all(&etc).unwrap();
        fs::write(etc.join("hostname"), content).unwrap();
        root.to_path_buf()
    }

    #[test]
    fn first_build_produces_mom_full_and_bundle_manifest() {
        let work = TempDir::new().unwrap();
        let chroot = chroot_with(&work.path().join("image"), b"a\n");
        let www = work.path().join("www/10");

        let request = BuildRequest {
            format: 1,
            version: 10,
            build_clock: 1_700_000_000,
            bundle_workers: 1,
            rename_threshold: 50,
            rename_size_tolerance_pct: 10,
            www_dir: www.clone(),
            prev_www_dir: None,
            cancel: CancelToken::new(),
        };
        let bundles = vec![BundleBuildInput {
            name: "os-core".to_string(),
            includes: vec![],
            scanned: scanned_hostname(b"a\n"),
            chroot_root: chroot,
        }];

        let out = build_version(bundles, &HashMap::new(), None, None, &request).unwrap();
        assert_eq!(out.mom.files.len(), 1);
        assert_eq!(out.mom.files[0].name, "os-core");
        assert_eq!(out.mom.files[0].version, 10);
        assert_eq!(out.full.files.len(), 1);
        assert!(www.join("Manifest.MoM").exists());
        assert!(www.join("Manifest.os-core").exists());
        assert!(www.join("Manifest.full").exists());
    }

    #[test]
    fn unchanged_second_build_carries_mom_version_forward() {
        let work = TempDir::new().unwrap();
        let chroot10 = chroot_with(&work.path().join("image10"), b"a\n");
        let www10 = work.path().join("www/10");
        let request10 = BuildRequest {
            format: 1,
            version: 10,
            build_clock: 1,
            bundle_workers: 1,
            rename_threshold: 50,
            rename_size_tolerance_pct: 10,
            www_dir: www10.clone(),
            prev_www_dir: None,
            cancel: CancelToken::new(),
        };
        let out10 = build_version(
            vec![BundleBuildInput {
                name: "os-core".to_string(),
                includes: vec![],
                scanned: scanned_hostname(b"a\n"),
                chroot_root: chroot10,
            }],
            &HashMap::new(),
            None,
            None,
            &request10,
        )
        .unwrap();

        let chroot20 = chroot_with(&work.path().join("image20"), b"a\n");
        let www20 = work.path().join("www/20");
        let request20 = BuildRequest {
            format: 1,
            version: 20,
            build_clock: 2,
            bundle_workers: 1,
            rename_threshold: 50,
            rename_size_tolerance_pct: 10,
            www_dir: www20,
            prev_www_dir: Some(www10),
            cancel: CancelToken::new(),
        };
        let out20 = build_version(
            vec![BundleBuildInput {
                name: "os-core".to_string(),
                includes: vec![],
                scanned: scanned_hostname(b"a\n"),
                chroot_root: chroot20,
            }],
            &out10.bundle_manifests,
            Some(&out10.mom),
            Some(&out10.full),
            &request20,
        )
        .unwrap();

        assert_eq!(out20.mom.files[0].version, 10);
        assert_eq!(out20.bundle_manifests["os-core"].header.version, 10);
    }

    #[test]
    fn mom_entry_hash_matches_written_manifest_file() {
        let work = TempDir::new().unwrap();
        let chroot = chroot_with(&work.path().join("image"), b"a\n");
        let www = work.path().join("www/10");
        let request = BuildRequest {
            format: 1,
            version: 10,
            build_clock: 1,
            bundle_workers: 1,
            rename_threshold: 50,
            rename_size_tolerance_pct: 10,
            www_dir: www.clone(),
            prev_www_dir: None,
            cancel: CancelToken::new(),
        };
        let out = build_version(
            vec![BundleBuildInput {
                name: "os-core".to_string(),
                includes: vec![],
                scanned: scanned_hostname(b"a\n"),
                chroot_root: chroot,
            }],
            &HashMap::new(),
            None,
            None,
            &request,
        )
        .unwrap();

        let on_disk_hash = content_hash::hash_of(www.join("Manifest.os-core")).unwrap();
        assert_eq!(out.mom.files[0].hash, on_disk_hash);
    }

    #[test]
    fn partition_is_order_preserving_within_each_chunk() {
        let chunks = partition(vec![1, 2, 3, 4, 5], 2);
        let flat: Vec<i32> = chunks.into_iter().flatten().collect();
        let mut sorted = flat.clone();
        sorted.sort();
        assert_eq!(sorted, vec![1, 2, 3, 4, 5]);
    }
}
