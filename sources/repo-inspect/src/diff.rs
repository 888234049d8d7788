use content_hash::Hash;
use manifest::{FileType, Manifest};

/// What changed about a path between the old and new manifest, per §4.8's two-pointer diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffMarker {
    Added,
    Removed,
    Changed,
    Same,
}

/// One line of a manifest diff: a path plus what changed about it and its hash on either
/// side (`None` when the path does not exist on that side).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub marker: DiffMarker,
    pub name: String,
    pub old_hash: Option<Hash>,
    pub new_hash: Option<Hash>,
    pub file_type: FileType,
}

/// Diffs two manifests' sorted file lists with a two-pointer merge, per §4.8 and §8's
/// diff-idempotence property (`diff(M, M)` emits zero `+`/`-` lines: every matching path
/// emits a [`DiffMarker::Same`] line here rather than being dropped, so callers that want
/// only the changes can filter on marker).
pub fn diff_manifests(old: &Manifest, new: &Manifest) -> Vec<DiffLine> {
    let mut lines = Vec::new();
    let (mut i, mut j) = (0, 0);

    while i < old.files.len() || j < new.files.len() {
        match (old.files.get(i), new.files.get(j)) {
            (Some(o), Some(n)) => match o.name.cmp(&n.name) {
                std::cmp::Ordering::Less => {
                    lines.push(DiffLine {
                        marker: DiffMarker::Removed,
                        name: o.name.clone(),
                        old_hash: Some(o.hash),
                        new_hash: None,
                        file_type: o.flags.file_type,
                    });
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    lines.push(DiffLine {
                        marker: DiffMarker::Added,
                        name: n.name.clone(),
                        old_hash: None,
                        new_hash: Some(n.hash),
                        file_type: n.flags.file_type,
                    });
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    let marker = if o.hash == n.hash {
                        DiffMarker::Same
                    } else {
                        DiffMarker::Changed
                    };
                    lines.push(DiffLine {
                        marker,
                        name: o.name.clone(),
                        old_hash: Some(o.hash),
                        new_hash: Some(n.hash),
                        file_type: n.flags.file_type,
                    });
                    i += 1;
                    j += 1;
                }
            },
            (Some(o), None) => {
                lines.push(DiffLine {
                    marker: DiffMarker::Removed,
                    name: o.name.clone(),
                    old_hash: Some(o.hash),
                    new_hash: None,
                    file_type: o.flags.file_type,
                });
                i += 1;
            }
            (None, Some(n)) => {
                lines.push(DiffLine {
                    marker: DiffMarker::Added,
                    name: n.name.clone(),
                    old_hash: None,
                    new_hash: Some(n.hash),
                    file_type: n.flags.file_type,
                });
                j += 1;
            }
            (None, None) => unreachable!("loop condition guarantees at least one side has an entry"),
        }
    }

    lines
}

/// Diffs `old` against `new`, and for every [`DiffMarker::Changed`] line whose type is
/// [`FileType::Manifest`] (a `Manifest.MoM` entry pointing at a bundle manifest), recurses
/// into the two referenced sub-manifests via `resolve`, appending their diff lines after
/// the top-level one. `resolve(name, hash)` fetches and parses the manifest a MoM entry
/// names; callers typically back it with [`crate::get_bundle_manifest`].
pub fn diff_recursive<F>(old: &Manifest, new: &Manifest, resolve: &mut F) -> Vec<DiffLine>
where
    F: FnMut(&str, Hash) -> Option<Manifest>,
{
    let mut lines = diff_manifests(old, new);
    let mut extra = Vec::new();

    for line in &lines {
        if line.marker == DiffMarker::Changed && line.file_type == FileType::Manifest {
            let (Some(old_hash), Some(new_hash)) = (line.old_hash, line.new_hash) else {
                continue;
            };
            let sub_old = resolve(&line.name, old_hash);
            let sub_new = resolve(&line.name, new_hash);
            if let (Some(sub_old), Some(sub_new)) = (sub_old, sub_new) {
                extra.extend(diff_recursive(&sub_old, &sub_new, resolve));
            }
        }
    }

    lines.append(&mut extra);
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use manifest::{FileRecord, Flags, Header};

    fn hash(c: char) -> Hash {
        c.to_string().repeat(64).parse().unwrap()
    }

    fn manifest_with(files: Vec<FileRecord>) -> Manifest {
        let header = Header {
            format: 1,
            version: 20,
            previous: 10,
            filecount: files.len() as u32,
            timestamp: 1,
            contentsize: 0,
            includes: vec![],
        };
        Manifest::new("os-core", header, files)
    }

    #[test]
    fn diff_of_identical_manifests_is_all_same() {
        let files = vec![FileRecord::new("/a", hash('a'), 10, Flags::present(FileType::Regular))];
        let m = manifest_with(files);
        let lines = diff_manifests(&m, &m);
        assert!(lines.iter().all(|l| l.marker == DiffMarker::Same));
        assert!(!lines.iter().any(|l| matches!(l.marker, DiffMarker::Added | DiffMarker::Removed)));
    }

    #[test]
    fn detects_added_removed_and_changed() {
        let old = manifest_with(vec![
            FileRecord::new("/a", hash('a'), 10, Flags::present(FileType::Regular)),
            FileRecord::new("/b", hash('b'), 10, Flags::present(FileType::Regular)),
        ]);
        let new = manifest_with(vec![
            FileRecord::new("/b", hash('c'), 20, Flags::present(FileType::Regular)),
            FileRecord::new("/z", hash('d'), 20, Flags::present(FileType::Regular)),
        ]);

        let lines = diff_manifests(&old, &new);
        let marker_for = |name: &str| lines.iter().find(|l| l.name == name).unwrap().marker;
        assert_eq!(marker_for("/a"), DiffMarker::Removed);
        assert_eq!(marker_for("/b"), DiffMarker::Changed);
        assert_eq!(marker_for("/z"), DiffMarker::Added);
    }

    #[test]
    fn recursive_diff_descends_into_changed_sub_manifests() {
        let old_sub = manifest_with(vec![FileRecord::new("/etc/x", hash('1'), 10, Flags::present(FileType::Regular))]);
        let new_sub = manifest_with(vec![FileRecord::new("/etc/x", hash('2'), 20, Flags::present(FileType::Regular))]);

        let mut old_file = FileRecord::new("os-core", hash('a'), 10, Flags::present(FileType::Manifest));
        old_file.name = "os-core".to_string();
        let mut new_file = FileRecord::new("os-core", hash('b'), 20, Flags::present(FileType::Manifest));
        new_file.name = "os-core".to_string();

        let old_mom = manifest_with(vec![old_file]);
        let new_mom = manifest_with(vec![new_file]);

        let mut resolve = |name: &str, h: Hash| -> Option<Manifest> {
            assert_eq!(name, "os-core");
            if h == hash('a') {
                Some(old_sub.clone())
            } else if h == hash('b') {
                Some(new_sub.clone())
            } else {
                None
            }
        };

        let lines = diff_recursive(&old_mom, &new_mom, &mut resolve);
        assert!(lines.iter().any(|l| l.name == "os-core" && l.marker == DiffMarker::Changed));
        assert!(lines.iter().any(|l| l.name == "/etc/x" && l.marker == DiffMarker::Changed));
    }
}
