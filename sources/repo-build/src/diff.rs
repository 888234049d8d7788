use crate::rename::{detect_renames, RenameInputs};
use manifest::{FileRecord, FileType, Header, Manifest};
use std::collections::{HashMap, HashSet};

/// Per-bundle knobs for [`diff_bundle`], threaded through from the top-level build request.
pub struct DiffParams {
    pub format: u32,
    pub version: u32,
    pub build_clock: u64,
    pub rename_threshold: u32,
    pub rename_size_tolerance_pct: u64,
}

/// Implements the per-bundle algorithm of §4.5 steps 2-6: classifies every newly scanned
/// file as unchanged/modified/new against `previous`, emits deletions for vanished paths,
/// attempts rename linkage between deletions and genuinely new paths, and recomputes the
/// header.
///
/// `scanned` is the output of [`bundle_scan::scan_bundle`] (version left at `0`); `previous`
/// is the bundle's manifest at the last published version, or `None` if this bundle has
/// never been built before.
pub fn diff_bundle(
    name: &str,
    scanned: Vec<FileRecord>,
    includes: Vec<String>,
    previous: Option<&Manifest>,
    params: &DiffParams,
    rename_inputs: &RenameInputs,
) -> Manifest {
    let prev_by_name: HashMap<&str, &FileRecord> = previous
        .map(|m| m.files.iter().map(|f| (f.name.as_str(), f)).collect())
        .unwrap_or_default();

    let mut seen: HashSet<String> = HashSet::new();
    let mut result: Vec<FileRecord> = Vec::with_capacity(scanned.len());
    let mut added_indices: Vec<usize> = Vec::new();

    for mut file in scanned {
        seen.insert(file.name.clone());
        match prev_by_name.get(file.name.as_str()) {
            Some(prev) if prev.hash == file.hash && prev.flags == file.flags => {
                file.version = prev.version;
            }
            Some(_) => {
                file.version = params.version;
            }
            None => {
                file.version = params.version;
                added_indices.push(result.len());
            }
        }
        result.push(file);
    }

    let deleted_originals: Vec<FileRecord> = previous
        .map(|m| {
            m.files
                .iter()
                .filter(|f| !seen.contains(&f.name))
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    if !deleted_originals.is_empty() && !added_indices.is_empty() {
        let mut added_refs: Vec<FileRecord> =
            added_indices.iter().map(|&i| result[i].clone()).collect();
        let linked = detect_renames(
            &deleted_originals,
            &mut added_refs,
            rename_inputs,
            params.rename_threshold,
            params.rename_size_tolerance_pct,
        );
        if linked > 0 {
            for (slot, &i) in added_indices.iter().enumerate() {
                result[i] = added_refs[slot].clone();
            }
        }
    }

    for deleted in &deleted_originals {
        result.push(FileRecord::deleted(deleted.name.clone(), params.version));
    }

    let contentsize: u64 = result
        .iter()
        .filter(|f| {
            f.is_present() && matches!(f.flags.file_type, FileType::Regular | FileType::Directory)
        })
        .map(|f| f.info.map(|i| i.size).unwrap_or(0))
        .sum::<u64>()
        .max(1);

    let header = Header {
        format: params.format,
        version: params.version,
        previous: previous.map(|p| p.header.version).unwrap_or(0),
        filecount: result.len() as u32,
        timestamp: params.build_clock,
        contentsize,
        includes,
    };

    Manifest::new(name, header, result)
}
