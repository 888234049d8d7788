use content_hash::Hash;
use manifest::{FileRecord, FileStatus, FileType, Flags, Header, Manifest};
use std::collections::{BTreeMap, HashMap};

/// One resolved `Manifest.<bundle>` entry ready to be recorded in `Manifest.MoM`: the hash
/// of its on-disk manifest file, and the version it should carry (its own new version if
/// the manifest changed since the previous build, otherwise the version it last changed at).
pub struct MomEntry {
    pub name: String,
    pub hash: Hash,
    pub version: u32,
}

pub struct MomParams {
    pub format: u32,
    pub version: u32,
    pub previous_version: u32,
    pub build_clock: u64,
}

/// Builds `Manifest.MoM`: one body line per bundle, typed `M`, per §4.5's "Global outputs".
pub fn build_mom(mut entries: Vec<MomEntry>, params: &MomParams) -> Manifest {
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    let files: Vec<FileRecord> = entries
        .into_iter()
        .map(|e| FileRecord::new(e.name, e.hash, e.version, Flags::present(FileType::Manifest)))
        .collect();

    let header = Header {
        format: params.format,
        version: params.version,
        previous: params.previous_version,
        filecount: files.len() as u32,
        timestamp: params.build_clock,
        // MoM body lines are manifest references, not filesystem entries; their "size"
        // contribution is nominal (one unit each) since §3 only requires contentsize > 0.
        contentsize: (files.len() as u64).max(1),
        includes: vec![],
    };
    Manifest::new("MoM", header, files)
}

/// Whether a freshly diffed bundle manifest differs from its predecessor in any way a
/// client needs to know about (ignoring `timestamp`, which changes on every build
/// regardless of content).
pub fn bundle_manifest_changed(new: &Manifest, previous: Option<&Manifest>) -> bool {
    match previous {
        None => true,
        Some(prev) => {
            new.header.previous != prev.header.previous
                || new.header.filecount != prev.header.filecount
                || new.header.contentsize != prev.header.contentsize
                || new.header.includes != prev.header.includes
                || new.files != prev.files
        }
    }
}

pub struct FullParams {
    pub format: u32,
    pub version: u32,
    pub previous_version: u32,
    pub build_clock: u64,
}

/// Builds `Manifest.full`: the union of every bundle's files after resolving each bundle's
/// own include-closure, per invariant 6. When the same path appears in more than one
/// bundle's closure, the more "absent" status wins (deleted dominates ghosted dominates
/// present, per [`FileStatus::dominant`]); ties are resolved by bundle iteration order,
/// which is fixed (sorted bundle names) for determinism.
pub fn build_full(
    bundle_manifests: &HashMap<String, Manifest>,
    closures: &HashMap<String, Vec<String>>,
    params: &FullParams,
) -> Manifest {
    let mut merged: BTreeMap<String, FileRecord> = BTreeMap::new();

    let mut bundle_names: Vec<&String> = bundle_manifests.keys().collect();
    bundle_names.sort();

    for bundle in bundle_names {
        let mut closure = closures
            .get(bundle)
            .cloned()
            .unwrap_or_else(|| vec![bundle.clone()]);
        closure.sort();
        for included in &closure {
            let Some(m) = bundle_manifests.get(included) else {
                continue;
            };
            for f in &m.files {
                merge_one(&mut merged, f.clone());
            }
        }
    }

    let files: Vec<FileRecord> = merged.into_values().collect();
    let contentsize: u64 = files
        .iter()
        .filter(|f| {
            f.flags.status == FileStatus::Present
                && matches!(f.flags.file_type, FileType::Regular | FileType::Directory)
        })
        .map(|f| f.info.map(|i| i.size).unwrap_or(0))
        .sum::<u64>()
        .max(1);

    let header = Header {
        format: params.format,
        version: params.version,
        previous: params.previous_version,
        filecount: files.len() as u32,
        timestamp: params.build_clock,
        contentsize,
        includes: vec![],
    };
    Manifest::new("full", header, files)
}

fn merge_one(merged: &mut BTreeMap<String, FileRecord>, file: FileRecord) {
    match merged.get(&file.name) {
        None => {
            merged.insert(file.name.clone(), file);
        }
        Some(existing) => {
            let dominant = file.flags.status.dominant(existing.flags.status);
            if dominant != existing.flags.status {
                merged.insert(file.name.clone(), file);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use manifest::{FileInfo, FileStatus};

    fn hash(c: char) -> Hash {
        c.to_string().repeat(64).parse().unwrap()
    }

    fn present_file(name: &str, h: Hash, size: u64) -> FileRecord {
        let mut f = FileRecord::new(name, h, 10, Flags::present(FileType::Regular));
        f.info = Some(FileInfo {
            size,
            ..Default::default()
        });
        f
    }

    #[test]
    fn mom_lists_one_entry_per_bundle_sorted_by_name() {
        let entries = vec![
            MomEntry {
                name: "zeta".into(),
                hash: hash('a'),
                version: 10,
            },
            MomEntry {
                name: "alpha".into(),
                hash: hash('b'),
                version: 10,
            },
        ];
        let mom = build_mom(
            entries,
            &MomParams {
                format: 1,
                version: 10,
                previous_version: 0,
                build_clock: 1,
            },
        );
        assert_eq!(mom.files[0].name, "alpha");
        assert_eq!(mom.files[1].name, "zeta");
        assert!(mom.files.iter().all(|f| f.flags.file_type == FileType::Manifest));
    }

    #[test]
    fn unchanged_bundle_is_not_flagged_changed() {
        let header = Header {
            format: 1,
            version: 10,
            previous: 0,
            filecount: 1,
            timestamp: 1,
            contentsize: 2,
            includes: vec![],
        };
        let files = vec![present_file("/etc/hostname", hash('a'), 2)];
        let old = Manifest::new("os-core", header.clone(), files.clone());
        let mut new_header = header;
        new_header.timestamp = 999; // only the build clock changed
        let new = Manifest::new("os-core", new_header, files);
        assert!(!bundle_manifest_changed(&new, Some(&old)));
    }

    #[test]
    fn changed_body_is_flagged() {
        let header = Header {
            format: 1,
            version: 10,
            previous: 0,
            filecount: 1,
            timestamp: 1,
            contentsize: 2,
            includes: vec![],
        };
        let old = Manifest::new(
            "os-core",
            header.clone(),
            vec![present_file("/etc/hostname", hash('a'), 2)],
        );
        let new = Manifest::new(
            "os-core",
            header,
            vec![present_file("/etc/hostname", hash('b'), 2)],
        );
        assert!(bundle_manifest_changed(&new, Some(&old)));
    }

    #[test]
    fn full_merges_included_bundles_files() {
        let mut manifests = HashMap::new();
        manifests.insert(
            "os-core".to_string(),
            Manifest::new(
                "os-core",
                Header {
                    format: 1,
                    version: 10,
                    previous: 0,
                    filecount: 1,
                    timestamp: 1,
                    contentsize: 2,
                    includes: vec!["os-common".into()],
                },
                vec![present_file("/etc/hostname", hash('a'), 2)],
            ),
        );
        manifests.insert(
            "os-common".to_string(),
            Manifest::new(
                "os-common",
                Header {
                    format: 1,
                    version: 10,
                    previous: 0,
                    filecount: 1,
                    timestamp: 1,
                    contentsize: 2,
                    includes: vec![],
                },
                vec![present_file("/usr/bin/bash", hash('b'), 2)],
            ),
        );
        let mut closures = HashMap::new();
        closures.insert(
            "os-core".to_string(),
            vec!["os-core".to_string(), "os-common".to_string()],
        );
        closures.insert("os-common".to_string(), vec!["os-common".to_string()]);

        let full = build_full(
            &manifests,
            &closures,
            &FullParams {
                format: 1,
                version: 10,
                previous_version: 0,
                build_clock: 1,
            },
        );
        assert_eq!(full.files.len(), 2);
        assert!(full.find("/etc/hostname").is_some());
        assert!(full.find("/usr/bin/bash").is_some());
    }

    #[test]
    fn deleted_status_dominates_present_when_merging_duplicate_names() {
        let mut merged = BTreeMap::new();
        let present = present_file("/etc/x", hash('a'), 1);
        let mut deleted = present.clone();
        deleted.flags.status = FileStatus::Deleted;
        deleted.hash = Hash::ZERO;

        merge_one(&mut merged, present);
        merge_one(&mut merged, deleted);
        assert_eq!(merged["/etc/x"].flags.status, FileStatus::Deleted);
    }
}
