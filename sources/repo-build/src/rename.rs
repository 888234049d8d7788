use manifest::{is_rename_eligible, similarity_score, FileRecord, FileRename, RenamePeer};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tar::Archive;

/// Filesystem locations rename detection reads file content from: the newly scanned chroot
/// (for added candidates) and the previous version's published fullfile store (for deleted
/// candidates, whose on-disk chroot entry no longer exists).
pub struct RenameInputs<'a> {
    pub new_chroot: &'a Path,
    pub prev_files_dir: Option<&'a Path>,
}

/// Pairs up `deleted` (original, pre-zeroing records from the previous manifest) with
/// `added` (freshly introduced paths in the new manifest — paths with no entry in the
/// previous manifest at all) per §4.2: both regular files, sizes within tolerance, content
/// similarity above `threshold`. Accepted pairs get `added[i].flags.rename = Renamed` and
/// `rename_peer`/`rename_score` populated.
///
/// Read failures on either side are logged and that pair is simply dropped from
/// consideration — rename detection errors are non-fatal, per §4.5.
pub fn detect_renames(
    deleted: &[FileRecord],
    added: &mut [FileRecord],
    inputs: &RenameInputs,
    threshold: u32,
    size_tolerance_pct: u64,
) -> usize {
    let mut candidates: Vec<(usize, usize, u32)> = Vec::new();

    for (d_idx, d) in deleted.iter().enumerate() {
        for (a_idx, a) in added.iter().enumerate() {
            if !is_rename_eligible(d, a, size_tolerance_pct) {
                continue;
            }
            let Some(old_bytes) = read_deleted(inputs.prev_files_dir, d) else {
                log::warn!(
                    "rename detection: could not read previous content for '{}', skipping as a candidate",
                    d.name
                );
                continue;
            };
            let Some(new_bytes) = read_added(inputs.new_chroot, a) else {
                log::warn!(
                    "rename detection: could not read new content for '{}', skipping as a candidate",
                    a.name
                );
                continue;
            };
            let score = similarity_score(&old_bytes, &new_bytes);
            if score >= threshold {
                candidates.push((d_idx, a_idx, score));
            }
        }
    }

    // Highest score wins; ties broken lexicographically by deleted name then added name, so
    // matching is deterministic regardless of scan order.
    candidates.sort_by(|a, b| {
        b.2.cmp(&a.2)
            .then_with(|| deleted[a.0].name.cmp(&deleted[b.0].name))
            .then_with(|| added[a.1].name.cmp(&added[b.1].name))
    });

    let mut matched_deleted: HashSet<usize> = HashSet::new();
    let mut matched_added: HashSet<usize> = HashSet::new();
    let mut linked = 0;

    for (d_idx, a_idx, score) in candidates {
        if matched_deleted.contains(&d_idx) || matched_added.contains(&a_idx) {
            continue;
        }
        matched_deleted.insert(d_idx);
        matched_added.insert(a_idx);

        let peer = &deleted[d_idx];
        added[a_idx].flags.rename = FileRename::Renamed;
        added[a_idx].rename_peer = Some(RenamePeer {
            name: peer.name.clone(),
            version: peer.version,
        });
        added[a_idx].rename_score = Some(score);
        linked += 1;
    }

    linked
}

fn read_added(new_chroot: &Path, record: &FileRecord) -> Option<Vec<u8>> {
    let rel = record.name.trim_start_matches('/');
    fs::read(new_chroot.join(rel)).ok()
}

fn read_deleted(prev_files_dir: Option<&Path>, record: &FileRecord) -> Option<Vec<u8>> {
    let dir = prev_files_dir?;
    let path = dir.join(format!("{}.tar", record.hash));
    read_single_entry_tar(&path)
}

/// Reads the one data entry out of a fullfile tar (as written by C6). Returns `None` on
/// any I/O or format problem; callers treat that as "content unavailable" rather than fatal.
fn read_single_entry_tar(path: &Path) -> Option<Vec<u8>> {
    let file = fs::File::open(path).ok()?;
    let mut archive = Archive::new(file);
    let mut entries = archive.entries().ok()?;
    let mut entry = entries.next()?.ok()?;
    let mut buf = Vec::new();
    std::io::Read::read_to_end(&mut entry, &mut buf).ok()?;
    Some(buf)
}
