use crate::cache;
use crate::error::{self, Result};
use crate::state::StateDir;
use crate::transport::Transport;
use content_hash::{EntryKind, Hash};
use snafu::ResultExt;
use std::io::Write;
use std::path::PathBuf;
use tar::EntryType;
use tempfile::NamedTempFile;

/// Downloads (or reads) the fullfile tar for `hash` at version `v`, unwraps it, verifies
/// that the archived entry's recomputed content hash matches `hash`, and stages the entry
/// under `<stateDir>/staged/<hash>` as the filesystem type it actually is. Returns the
/// staged path.
///
/// If `<stateDir>/staged/<hash>` already exists, staging is skipped: the store is
/// content-addressed, so a hash that already has a staged entry needs nothing further.
pub fn get_fullfile(transport: &Transport, state: &StateDir, v: u32, hash: Hash, no_cache: bool) -> Result<PathBuf> {
    let staged_path = state.staged_dir().join(hash.to_string());
    if staged_path.exists() && !no_cache {
        return Ok(staged_path);
    }

    let rel = format!("{}/files/{}.tar", v, hash);
    let cache_path = state.version_dir(v).join("files").join(format!("{}.tar", hash));
    let path = cache::fetch_cached(transport, &rel, &cache_path, no_cache)?;

    let entry = fullfile_pack::read_fullfile_entry(&path).context(error::ReadFullfileSnafu { hash })?;
    let kind = entry_kind(hash, entry.entry_type)?;
    let actual = content_hash::hash_of_entry(kind, entry.mode, entry.uid, entry.gid, &entry.payload);

    let entry = if actual != hash {
        log::warn!(
            "fullfile for hash {} at version {} recomputed to {}, refetching once",
            hash,
            v,
            actual
        );
        let path = cache::refetch(transport, &rel, &cache_path)?;
        let entry = fullfile_pack::read_fullfile_entry(&path).context(error::ReadFullfileSnafu { hash })?;
        let kind = entry_kind(hash, entry.entry_type)?;
        let actual = content_hash::hash_of_entry(kind, entry.mode, entry.uid, entry.gid, &entry.payload);
        if actual != hash {
            return error::HashMismatchSnafu {
                name: format!("fullfile {}", hash),
                expected: hash,
                actual,
            }
            .fail();
        }
        entry
    } else {
        entry
    };

    stage_entry(hash, &staged_path, entry_kind(hash, entry.entry_type)?, &entry.payload)?;
    Ok(staged_path)
}

pub(crate) fn entry_kind(hash: Hash, entry_type: EntryType) -> Result<EntryKind> {
    match entry_type {
        EntryType::Regular => Ok(EntryKind::Regular),
        EntryType::Directory => Ok(EntryKind::Directory),
        EntryType::Symlink => Ok(EntryKind::Symlink),
        other => error::UnsupportedEntryTypeSnafu {
            hash,
            entry_type: format!("{:?}", other),
        }
        .fail(),
    }
}

pub(crate) fn stage_entry(hash: Hash, staged_path: &std::path::Path, kind: EntryKind, payload: &[u8]) -> Result<()> {
    let parent = staged_path
        .parent()
        .expect("staged path always has a parent (the staged directory)");
    std::fs::create_dir_all(parent).context(error::StageFullfileSnafu { hash, path: parent.to_path_buf() })?;

    // Staging is idempotent and content-addressed: clear out whatever may be here from a
    // previous (possibly different-typed) attempt before writing the verified entry.
    if staged_path.exists() || staged_path.symlink_metadata().is_ok() {
        let remove = if staged_path.is_dir() {
            std::fs::remove_dir_all(staged_path)
        } else {
            std::fs::remove_file(staged_path)
        };
        remove.context(error::StageFullfileSnafu { hash, path: staged_path.to_path_buf() })?;
    }

    match kind {
        EntryKind::Directory => {
            std::fs::create_dir_all(staged_path)
                .context(error::StageFullfileSnafu { hash, path: staged_path.to_path_buf() })?;
        }
        EntryKind::Symlink => {
            let target = String::from_utf8_lossy(payload).into_owned();
            std::os::unix::fs::symlink(target, staged_path)
                .context(error::StageFullfileSnafu { hash, path: staged_path.to_path_buf() })?;
        }
        EntryKind::Regular => {
            let mut tmp = NamedTempFile::new_in(parent)
                .context(error::StageFullfileSnafu { hash, path: parent.to_path_buf() })?;
            tmp.write_all(payload)
                .context(error::StageFullfileSnafu { hash, path: staged_path.to_path_buf() })?;
            tmp.as_file().sync_all().context(error::StageFullfileSnafu { hash, path: staged_path.to_path_buf() })?;
            tmp.persist(staged_path).map_err(|e| error::Error::StageFullfile {
                hash,
                path: staged_path.to_path_buf(),
                source: e.error,
            })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{DEFAULT_RETRIES, DEFAULT_TIMEOUT};
    use crate::url::ContentBase;
    use content_hash::hash_of_entry;
    use fullfile_pack::{build_fullfile_bytes, SourceKind};
    use tempfile::TempDir;

    fn write_fullfile(origin: &std::path::Path, v: u32, hash: Hash, contents: &[u8]) {
        std::fs::create_dir_all(origin.join(v.to_string()).join("files")).unwrap();
        let src_dir = TempDir::new().unwrap();
        let src = src_dir.path().join("payload");
        std::fs::write(&src, contents).unwrap();
        let bytes = build_fullfile_bytes(&hash, &SourceKind::Regular { path: src }, None, 1).unwrap();
        std::fs::write(origin.join(v.to_string()).join("files").join(format!("{}.tar", hash)), bytes).unwrap();
    }

    #[test]
    fn stages_a_verified_regular_fullfile() {
        let origin = TempDir::new().unwrap();
        let hash = hash_of_entry(EntryKind::Regular, 0o644, 0, 0, b"hello");
        write_fullfile(origin.path(), 20, hash, b"hello");

        let transport = Transport::new(
            ContentBase::File(origin.path().to_path_buf()),
            false,
            DEFAULT_RETRIES,
            DEFAULT_TIMEOUT,
        )
        .unwrap();
        let state_dir = TempDir::new().unwrap();
        let state = StateDir::open(
            state_dir.path().join("state"),
            &ContentBase::File(origin.path().to_path_buf()),
        )
        .unwrap();

        let staged = get_fullfile(&transport, &state, 20, hash, false).unwrap();
        assert_eq!(std::fs::read(&staged).unwrap(), b"hello");
    }

    #[test]
    fn already_staged_hash_is_not_refetched() {
        let origin = TempDir::new().unwrap();
        let hash = hash_of_entry(EntryKind::Regular, 0o644, 0, 0, b"hello");
        write_fullfile(origin.path(), 20, hash, b"hello");

        let transport = Transport::new(
            ContentBase::File(origin.path().to_path_buf()),
            false,
            DEFAULT_RETRIES,
            DEFAULT_TIMEOUT,
        )
        .unwrap();
        let state_dir = TempDir::new().unwrap();
        let state = StateDir::open(
            state_dir.path().join("state"),
            &ContentBase::File(origin.path().to_path_buf()),
        )
        .unwrap();

        get_fullfile(&transport, &state, 20, hash, false).unwrap();
        std::fs::remove_dir_all(origin.path().join("20")).unwrap();

        let staged = get_fullfile(&transport, &state, 20, hash, false).unwrap();
        assert_eq!(std::fs::read(&staged).unwrap(), b"hello");
    }

    #[test]
    fn hash_mismatch_is_fatal_after_one_refetch() {
        let origin = TempDir::new().unwrap();
        let claimed: Hash = "9".repeat(64).parse().unwrap();
        write_fullfile(origin.path(), 20, claimed, b"not what the hash says");

        let transport = Transport::new(
            ContentBase::File(origin.path().to_path_buf()),
            false,
            DEFAULT_RETRIES,
            DEFAULT_TIMEOUT,
        )
        .unwrap();
        let state_dir = TempDir::new().unwrap();
        let state = StateDir::open(
            state_dir.path().join("state"),
            &ContentBase::File(origin.path().to_path_buf()),
        )
        .unwrap();

        let result = get_fullfile(&transport, &state, 20, claimed, false);
        assert!(result.is_err());
    }
}
