use content_hash::Hash;
use manifest::{FileType, Manifest};
use std::collections::HashMap;

/// What a single pack entry carries for one changed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackMember {
    /// A binary delta from `prev_hash` to `new_hash`, carried under
    /// `delta/<from_version>-<to_version>-<prev_hash>-<new_hash>` per §4.7.
    Delta { prev_hash: Hash, new_hash: Hash },
    /// The fullfile for `hash`, embedded under `files/<hash>.tar`.
    Fullfile { hash: Hash },
}

/// One file that needs a pack entry between two versions of a bundle.
#[derive(Debug, Clone)]
pub struct PlannedEntry {
    pub name: String,
    pub member: PackMember,
}

/// Determines which files need a pack entry between `from` (the bundle manifest at the
/// previous published version, or `None` for a "zero pack") and `to` (the version being
/// packed), per §4.7: every present file in `to` whose `(name, hash)` differs from `from`
/// gets an entry. A binary delta is planned only when the file existed previously with a
/// non-zero hash and both the old and new records are regular files; everything else
/// (newly introduced files, type changes, directories, symlinks) gets a fullfile entry.
/// Deleted files contribute nothing — there is no content left to ship.
pub fn plan_pack(from: Option<&Manifest>, to: &Manifest) -> Vec<PlannedEntry> {
    let from_by_name: HashMap<&str, _> = from
        .map(|m| m.files.iter().map(|f| (f.name.as_str(), f)).collect())
        .unwrap_or_default();

    let mut entries = Vec::new();
    for file in &to.files {
        if !file.is_present() {
            continue;
        }

        let prior = from_by_name.get(file.name.as_str()).copied();
        if let Some(prior) = prior {
            if prior.hash == file.hash {
                continue;
            }
        }

        let member = match prior {
            Some(prior)
                if !prior.hash.is_zero()
                    && prior.flags.file_type == FileType::Regular
                    && file.flags.file_type == FileType::Regular =>
            {
                PackMember::Delta {
                    prev_hash: prior.hash,
                    new_hash: file.hash,
                }
            }
            _ => PackMember::Fullfile { hash: file.hash },
        };

        entries.push(PlannedEntry {
            name: file.name.clone(),
            member,
        });
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use manifest::{FileInfo, FileRecord, Flags, Header};

    fn hash(c: char) -> Hash {
        c.to_string().repeat(64).parse().unwrap()
    }

    fn header() -> Header {
        Header {
            format: 1,
            version: 20,
            previous: 10,
            filecount: 1,
            timestamp: 1,
            contentsize: 1,
            includes: vec![],
        }
    }

    fn regular(name: &str, h: Hash, version: u32) -> FileRecord {
        let mut f = FileRecord::new(name, h, version, Flags::present(FileType::Regular));
        f.info = Some(FileInfo {
            size: 4,
            ..Default::default()
        });
        f
    }

    #[test]
    fn unchanged_file_gets_no_entry() {
        let from = Manifest::new("os-core", header(), vec![regular("/a", hash('a'), 10)]);
        let to = Manifest::new("os-core", header(), vec![regular("/a", hash('a'), 10)]);
        assert!(plan_pack(Some(&from), &to).is_empty());
    }

    #[test]
    fn modified_regular_file_plans_a_delta() {
        let from = Manifest::new("os-core", header(), vec![regular("/a", hash('a'), 10)]);
        let to = Manifest::new("os-core", header(), vec![regular("/a", hash('b'), 20)]);
        let entries = plan_pack(Some(&from), &to);
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].member,
            PackMember::Delta {
                prev_hash: hash('a'),
                new_hash: hash('b'),
            }
        );
    }

    #[test]
    fn newly_introduced_file_plans_a_fullfile() {
        let from = Manifest::new("os-core", header(), vec![regular("/a", hash('a'), 10)]);
        let to = Manifest::new(
            "os-core",
            header(),
            vec![regular("/a", hash('a'), 10), regular("/b", hash('c'), 20)],
        );
        let entries = plan_pack(Some(&from), &to);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "/b");
        assert_eq!(entries[0].member, PackMember::Fullfile { hash: hash('c') });
    }

    #[test]
    fn deleted_file_plans_nothing() {
        let from = Manifest::new("os-core", header(), vec![regular("/a", hash('a'), 10)]);
        let to = Manifest::new(
            "os-core",
            header(),
            vec![FileRecord::deleted("/a", 20)],
        );
        assert!(plan_pack(Some(&from), &to).is_empty());
    }

    #[test]
    fn zero_pack_plans_fullfiles_for_every_present_file() {
        let to = Manifest::new(
            "os-core",
            header(),
            vec![regular("/a", hash('a'), 20), regular("/b", hash('b'), 20)],
        );
        let entries = plan_pack(None, &to);
        assert_eq!(entries.len(), 2);
        assert!(entries
            .iter()
            .all(|e| matches!(e.member, PackMember::Fullfile { .. })));
    }

    #[test]
    fn type_change_at_same_name_falls_back_to_fullfile() {
        let from = Manifest::new("os-core", header(), vec![regular("/a", hash('a'), 10)]);
        let mut dir_now = regular("/a", hash('b'), 20);
        dir_now.flags.file_type = FileType::Directory;
        let to = Manifest::new("os-core", header(), vec![dir_now]);
        let entries = plan_pack(Some(&from), &to);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].member, PackMember::Fullfile { hash: hash('b') });
    }
}
