use crate::diff::compute_verified_delta;
use crate::error::{self, Result};
use crate::plan::{PackMember, PlannedEntry};
use cancel::CancelToken;
use snafu::{OptionExt, ResultExt};
use std::io::Write;
use std::path::{Path, PathBuf};
use tar::{Builder, Header};

/// Filesystem locations and version numbers needed to resolve and name a pack's members.
pub struct PackRequest {
    pub from_version: u32,
    pub to_version: u32,
    /// The previous version's fullfile store, used as the delta source. `None` for a zero
    /// pack, where every entry is necessarily a fullfile.
    pub files_dir_from: Option<PathBuf>,
    pub files_dir_to: PathBuf,
    pub out_path: PathBuf,
    pub workers: usize,
    /// Checked between entries (never mid-entry); a cancelled run aborts with
    /// [`error::Error::Cancelled`] once every in-flight worker finishes its current entry.
    pub cancel: CancelToken,
}

struct ResolvedMember {
    tar_path: String,
    bytes: Vec<u8>,
}

fn effective_workers(requested: usize) -> usize {
    if requested == 0 {
        num_cpus::get().max(1)
    } else {
        requested
    }
}

/// Splits `items` round-robin across `workers` chunks, dropping empty chunks. Matches the
/// partitioning the fullfile packager and version builder use for their own worker pools.
fn partition<T>(items: Vec<T>, workers: usize) -> Vec<Vec<T>> {
    let workers = workers.max(1);
    let mut chunks: Vec<Vec<T>> = (0..workers).map(|_| Vec::new()).collect();
    for (i, item) in items.into_iter().enumerate() {
        chunks[i % workers].push(item);
    }
    chunks.into_iter().filter(|c| !c.is_empty()).collect()
}

/// Resolves every planned entry (in parallel, across `request.workers` threads) and
/// assembles the result into one pack tar at `request.out_path`, per §4.7. Returns the
/// number of members written.
///
/// Resolving a [`PackMember::Delta`] reads both the old and new fullfile payloads and
/// computes a verified binary delta; if the delta can't be computed or doesn't survive
/// verification, that entry silently falls back to a fullfile instead, matching the
/// "any mismatch falls back to the fullfile" rule.
pub fn build_pack(entries: Vec<PlannedEntry>, request: &PackRequest) -> Result<usize> {
    if let Some(parent) = request.out_path.parent() {
        std::fs::create_dir_all(parent)
            .context(error::CreateDirSnafu { path: parent.to_path_buf() })?;
    }

    let workers = effective_workers(request.workers);
    let chunks = partition(entries, workers);

    let mut all_members: Vec<ResolvedMember> = Vec::new();
    let mut first_error: Option<error::Error> = None;

    std::thread::scope(|scope| {
        let mut handles = Vec::new();
        for chunk in chunks {
            let request = &*request;
            handles.push(scope.spawn(move || -> Result<Vec<ResolvedMember>> {
                chunk
                    .into_iter()
                    .map(|entry| {
                        if request.cancel.is_cancelled() {
                            return error::CancelledSnafu.fail();
                        }
                        resolve_member(&entry, request)
                    })
                    .collect()
            }));
        }
        for handle in handles {
            match handle.join() {
                Ok(Ok(mut members)) => all_members.append(&mut members),
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

    all_members.sort_by(|a, b| a.tar_path.cmp(&b.tar_path));
    let count = all_members.len();
    write_pack(&all_members, request)?;
    Ok(count)
}

fn resolve_member(entry: &PlannedEntry, request: &PackRequest) -> Result<ResolvedMember> {
    match entry.member {
        PackMember::Fullfile { hash } => {
            let path = request.files_dir_to.join(format!("{hash}.tar"));
            let bytes = std::fs::read(&path).context(error::ReadFullfileSnafu { path })?;
            Ok(ResolvedMember {
                tar_path: format!("files/{hash}.tar"),
                bytes,
            })
        }
        PackMember::Delta { prev_hash, new_hash } => {
            let new_path = request.files_dir_to.join(format!("{new_hash}.tar"));
            let Some(from_dir) = request.files_dir_from.as_ref() else {
                return fallback_fullfile(new_hash, &new_path);
            };
            let old_path = from_dir.join(format!("{prev_hash}.tar"));

            let old_bytes = fullfile_pack::read_fullfile_payload(&old_path)
                .context(error::ReadPayloadSnafu { path: old_path.clone() });
            let new_bytes = fullfile_pack::read_fullfile_payload(&new_path)
                .context(error::ReadPayloadSnafu { path: new_path.clone() });

            match (old_bytes, new_bytes) {
                (Ok(old), Ok(new)) => match compute_verified_delta(&old, &new) {
                    Some(delta) => Ok(ResolvedMember {
                        tar_path: format!(
                            "delta/{}-{}-{}-{}",
                            request.from_version, request.to_version, prev_hash, new_hash
                        ),
                        bytes: delta,
                    }),
                    None => {
                        log::warn!(
                            "delta for '{}' failed verification, falling back to fullfile",
                            entry.name
                        );
                        fallback_fullfile(new_hash, &new_path)
                    }
                },
                _ => {
                    log::warn!(
                        "could not read content to diff '{}', falling back to fullfile",
                        entry.name
                    );
                    fallback_fullfile(new_hash, &new_path)
                }
            }
        }
    }
}

fn fallback_fullfile(hash: content_hash::Hash, path: &Path) -> Result<ResolvedMember> {
    let bytes = std::fs::read(path).context(error::ReadFullfileSnafu {
        path: path.to_path_buf(),
    })?;
    Ok(ResolvedMember {
        tar_path: format!("files/{hash}.tar"),
        bytes,
    })
}

fn write_pack(members: &[ResolvedMember], request: &PackRequest) -> Result<()> {
    let mut builder = Builder::new(Vec::new());
    for member in members {
        let mut header = Header::new_gnu();
        header.set_size(member.bytes.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(request.to_version as u64);
        header.set_cksum();
        builder
            .append_data(&mut header, &member.tar_path, member.bytes.as_slice())
            .context(error::AppendMemberSnafu {
                member: member.tar_path.clone(),
            })?;
    }
    let bytes = builder
        .into_inner()
        .context(error::WritePackSnafu { path: request.out_path.clone() })?;

    let parent = request.out_path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .context(error::WritePackSnafu { path: request.out_path.clone() })?;
    tmp.write_all(&bytes)
        .context(error::WritePackSnafu { path: request.out_path.clone() })?;
    tmp.as_file()
        .sync_all()
        .context(error::WritePackSnafu { path: request.out_path.clone() })?;
    tmp.persist(&request.out_path)
        .context(error::PersistPackSnafu { path: request.out_path.clone() })?;
    Ok(())
}
