use crate::codec::{self, SourceKind};
use crate::error::{self, Result};
use cancel::CancelToken;
use content_hash::Hash;
use manifest::FileInfo;
use snafu::ResultExt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One fullfile to materialize: a distinct hash introduced at this version, plus enough of
/// the source entry's metadata to archive it. Callers (the version-build orchestrator)
/// de-duplicate by hash before building the job list, per §4.6's "never re-emit a hash
/// already emitted in this version".
pub struct FullfileJob {
    pub hash: Hash,
    pub source: SourceKind,
    pub info: Option<FileInfo>,
}

/// Knobs for one [`build_fullfiles`] invocation.
pub struct FullfileRequest {
    /// `www/<version>/files/`.
    pub out_dir: PathBuf,
    /// `0` means "one worker per logical CPU" (§5's `W_full`).
    pub workers: usize,
    /// Stamped onto every tar entry's mtime so output is reproducible for fixed inputs.
    pub build_clock: u64,
    /// Checked between jobs (never mid-job); a cancelled run aborts with
    /// [`error::Error::Cancelled`] once every in-flight worker finishes its current job.
    pub cancel: CancelToken,
}

pub struct BuildSummary {
    pub written: usize,
    pub skipped_existing: usize,
}

fn effective_workers(requested: usize) -> usize {
    if requested == 0 {
        num_cpus::get().max(1)
    } else {
        requested
    }
}

/// Splits `items` into up to `workers` roughly-equal, order-preserving chunks; ordering
/// within the fullfile packager is irrelevant (§4.6), but a deterministic split keeps test
/// assertions simple.
fn partition<T>(items: Vec<T>, workers: usize) -> Vec<Vec<T>> {
    let workers = workers.max(1);
    let mut chunks: Vec<Vec<T>> = (0..workers).map(|_| Vec::new()).collect();
    for (i, item) in items.into_iter().enumerate() {
        chunks[i % workers].push(item);
    }
    chunks.into_iter().filter(|c| !c.is_empty()).collect()
}

/// Materializes `www/<version>/files/<hash>.tar` for every job in `jobs`, across a pool of
/// `request.workers` OS threads (§5's `W_full`). Each worker writes its candidate to a
/// unique tempfile under `out_dir` and renames atomically on success, so concurrent writes
/// to the same hash (which should not happen given de-duplicated input) can never race.
pub fn build_fullfiles(jobs: Vec<FullfileJob>, request: &FullfileRequest) -> Result<BuildSummary> {
    std::fs::create_dir_all(&request.out_dir).context(error::CreateDirSnafu {
        path: request.out_dir.clone(),
    })?;

    let workers = effective_workers(request.workers);
    let chunks = partition(jobs, workers);

    let written = AtomicUsize::new(0);
    let skipped = AtomicUsize::new(0);
    let mut first_error: Option<error::Error> = None;

    std::thread::scope(|scope| {
        let mut handles = Vec::new();
        for chunk in chunks {
            let out_dir = &request.out_dir;
            let build_clock = request.build_clock;
            let written = &written;
            let skipped = &skipped;
            let cancel = &request.cancel;
            handles.push(scope.spawn(move || -> Result<()> {
                for job in chunk {
                    if cancel.is_cancelled() {
                        return error::CancelledSnafu.fail();
                    }
                    let target = out_dir.join(format!("{}.tar", job.hash));
                    if target.exists() {
                        skipped.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }
                    let bytes = codec::build_fullfile_bytes(&job.hash, &job.source, job.info, build_clock)?;
                    write_atomic(out_dir, &target, &job.hash, &bytes)?;
                    written.fetch_add(1, Ordering::Relaxed);
                }
                Ok(())
            }));
        }
        for handle in handles {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
                Err(_) => {
                    if first_error.is_none() {
                        first_error = Some(error::Error::WorkerPanic);
                    }
                }
            }
        }
    });

    if let Some(e) = first_error {
        return Err(e);
    }

    Ok(BuildSummary {
        written: written.load(Ordering::Relaxed),
        skipped_existing: skipped.load(Ordering::Relaxed),
    })
}

fn write_atomic(out_dir: &std::path::Path, target: &std::path::Path, hash: &Hash, bytes: &[u8]) -> Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(out_dir).context(error::WriteFullfileSnafu { hash: *hash })?;
    tmp.write_all(bytes)
        .context(error::WriteFullfileSnafu { hash: *hash })?;
    tmp.as_file()
        .sync_all()
        .context(error::WriteFullfileSnafu { hash: *hash })?;
    tmp.persist(target)
        .context(error::PersistFullfileSnafu { hash: *hash })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn writes_one_tar_per_distinct_hash() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        std::fs::write(&src, b"hello").unwrap();
        let out = dir.path().join("files");

        let hash: Hash = "a".repeat(64).parse().unwrap();
        let jobs = vec![FullfileJob {
            hash,
            source: SourceKind::Regular { path: src },
            info: Some(FileInfo {
                size: 5,
                ..Default::default()
            }),
        }];

        let summary = build_fullfiles(
            jobs,
            &FullfileRequest {
                out_dir: out.clone(),
                workers: 2,
                build_clock: 1,
                cancel: CancelToken::new(),
            },
        )
        .unwrap();

        assert_eq!(summary.written, 1);
        assert_eq!(summary.skipped_existing, 0);
        assert!(out.join(format!("{hash}.tar")).exists());
    }

    #[test]
    fn existing_fullfile_is_skipped_not_rewritten() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        std::fs::write(&src, b"hello").unwrap();
        let out = dir.path().join("files");
        std::fs::create_dir_all(&out).unwrap();

        let hash: Hash = "b".repeat(64).parse().unwrap();
        std::fs::write(out.join(format!("{hash}.tar")), b"already-there").unwrap();

        let jobs = vec![FullfileJob {
            hash,
            source: SourceKind::Regular { path: src },
            info: None,
        }];

        let summary = build_fullfiles(
            jobs,
            &FullfileRequest {
                out_dir: out.clone(),
                workers: 1,
                build_clock: 1,
                cancel: CancelToken::new(),
            },
        )
        .unwrap();

        assert_eq!(summary.written, 0);
        assert_eq!(summary.skipped_existing, 1);
        assert_eq!(std::fs::read(out.join(format!("{hash}.tar"))).unwrap(), b"already-there");
    }

    #[test]
    fn many_jobs_across_workers_all_land() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("files");
        let mut jobs = Vec::new();
        for i in 0..20u8 {
            let src = dir.path().join(format!("src-{i}"));
            std::fs::write(&src, vec![i; 16]).unwrap();
            let hash: Hash = format!("{:02x}", i).repeat(32).parse().unwrap();
            jobs.push(FullfileJob {
                hash,
                source: SourceKind::Regular { path: src },
                info: None,
            });
        }

        let summary = build_fullfiles(
            jobs,
            &FullfileRequest {
                out_dir: out.clone(),
                workers: 4,
                build_clock: 1,
                cancel: CancelToken::new(),
            },
        )
        .unwrap();

        assert_eq!(summary.written, 20);
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 20);
    }
}
