use crate::error::{self, Result};
use crate::hash::Hash;
use crate::key::StatKey;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use snafu::ResultExt;
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

type HmacSha256 = Hmac<Sha256>;

/// Payload written for a directory entry; directories carry no content of their own.
const DIRECTORY_PAYLOAD: &[u8] = b"DIRECTORY";

/// Mask applied to a regular file's mode before it becomes part of the hash key: keeps the
/// on-disk permission bits (including setuid/setgid/sticky) and drops the file-type bits that
/// `st_mode` otherwise carries.
const PERMISSION_MASK: u64 = 0o7777;

/// Which kind of filesystem entry [`hash_of_entry`] is hashing. A deliberately narrower
/// enumeration than `manifest::FileType`: this crate has no business knowing about
/// manifest-body concepts like `Unset` or `Manifest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Regular,
    Directory,
    Symlink,
}

/// Computes the content hash of the filesystem entry at `path`, following Lstat semantics:
/// symlinks are hashed by their target, never followed.
pub fn hash_of(path: impl AsRef<Path>) -> Result<Hash> {
    let path = path.as_ref();
    let meta = fs::symlink_metadata(path).context(error::StatSnafu { path })?;
    let file_type = meta.file_type();

    if file_type.is_symlink() {
        let target = fs::read_link(path).context(error::ReadLinkSnafu { path })?;
        let target_bytes = target.to_string_lossy().into_owned().into_bytes();
        Ok(hash_of_entry(
            EntryKind::Symlink,
            0,
            meta.uid(),
            meta.gid(),
            &target_bytes,
        ))
    } else if file_type.is_dir() {
        Ok(hash_of_entry(
            EntryKind::Directory,
            meta.mode(),
            meta.uid(),
            meta.gid(),
            &[],
        ))
    } else if file_type.is_file() {
        let contents = fs::read(path).context(error::ReadFileSnafu { path })?;
        Ok(hash_of_entry(
            EntryKind::Regular,
            meta.mode(),
            meta.uid(),
            meta.gid(),
            &contents,
        ))
    } else {
        // Block/char devices, FIFOs, and sockets are not supported entry types.
        error::UnsupportedTypeSnafu { path }.fail()
    }
}

/// Computes the same hash as [`hash_of`], but from already-in-memory attributes rather than
/// a filesystem path. Used by callers that have unpacked an entry from a tar archive (a
/// fullfile, in the inspector's case) and need to verify its content hash without writing it
/// to disk and re-stat-ing it.
///
/// `payload` is the symlink target bytes for [`EntryKind::Symlink`], the file contents for
/// [`EntryKind::Regular`], and ignored (replaced by the fixed `DIRECTORY` marker) for
/// [`EntryKind::Directory`], mirroring [`hash_of`]'s own branches exactly.
pub fn hash_of_entry(kind: EntryKind, mode: u32, uid: u32, gid: u32, payload: &[u8]) -> Hash {
    let (key, bytes): (StatKey, &[u8]) = match kind {
        EntryKind::Symlink => (
            StatKey {
                mode: 0,
                uid: uid as u64,
                gid: gid as u64,
                size: payload.len() as u64,
            },
            payload,
        ),
        EntryKind::Directory => (
            StatKey {
                mode: mode as u64 & PERMISSION_MASK,
                uid: uid as u64,
                gid: gid as u64,
                size: 0,
            },
            DIRECTORY_PAYLOAD,
        ),
        EntryKind::Regular => (
            StatKey {
                mode: mode as u64 & PERMISSION_MASK,
                uid: uid as u64,
                gid: gid as u64,
                size: payload.len() as u64,
            },
            payload,
        ),
    };
    hash_payload(&key, bytes)
}

fn hash_payload(key: &StatKey, payload: &[u8]) -> Hash {
    // `Hmac::new_from_slice` never fails for HMAC-SHA256: any key length is accepted.
    let mut mac =
        HmacSha256::new_from_slice(&key.to_bytes()).expect("HMAC-SHA256 accepts any key length");
    mac.update(payload);
    Hash::from_mac(mac.finalize().into_bytes().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    #[test]
    fn hash_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a");
        fs::write(&file, b"hello\n").unwrap();

        let h1 = hash_of(&file).unwrap();
        let h2 = hash_of(&file).unwrap();
        assert_eq!(h1, h2);
    }

    #[test]
    fn different_contents_hash_differently() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        fs::write(&a, b"a\n").unwrap();
        fs::write(&b, b"b\n").unwrap();

        assert_ne!(hash_of(&a).unwrap(), hash_of(&b).unwrap());
    }

    #[test]
    fn directory_hash_ignores_name() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        fs::create_dir(&a).unwrap();
        fs::create_dir(&b).unwrap();

        assert_eq!(hash_of(&a).unwrap(), hash_of(&b).unwrap());
    }

    #[test]
    fn symlink_hash_depends_on_target_not_mode() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("target");
        fs::write(&target, b"ignored").unwrap();
        let link = dir.path().join("link");
        symlink(&target, &link).unwrap();

        let h1 = hash_of(&link).unwrap();
        let h2 = hash_of(&link).unwrap();
        assert_eq!(h1, h2);

        // A symlink with a different target hashes differently even if both point within
        // the same directory.
        let other_target = dir.path().join("other-target-name");
        fs::write(&other_target, b"ignored").unwrap();
        let other_link = dir.path().join("other-link");
        symlink(&other_target, &other_link).unwrap();
        assert_ne!(hash_of(&link).unwrap(), hash_of(&other_link).unwrap());
    }

    #[test]
    fn zero_hash_is_reserved() {
        assert!(Hash::ZERO.is_zero());
        assert_eq!(Hash::ZERO.to_string(), "0".repeat(64));
    }

    #[test]
    fn hash_of_entry_matches_hash_of_for_regular_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a");
        fs::write(&file, b"hello\n").unwrap();
        let meta = fs::symlink_metadata(&file).unwrap();

        let from_disk = hash_of(&file).unwrap();
        let from_memory = hash_of_entry(
            EntryKind::Regular,
            meta.mode(),
            meta.uid(),
            meta.gid(),
            b"hello\n",
        );
        assert_eq!(from_disk, from_memory);
    }

    #[test]
    fn hash_of_entry_matches_hash_of_for_symlink() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("target");
        fs::write(&target, b"ignored").unwrap();
        let link = dir.path().join("link");
        symlink(&target, &link).unwrap();
        let meta = fs::symlink_metadata(&link).unwrap();

        let from_disk = hash_of(&link).unwrap();
        let from_memory = hash_of_entry(
            EntryKind::Symlink,
            0,
            meta.uid(),
            meta.gid(),
            target.to_string_lossy().as_bytes(),
        );
        assert_eq!(from_disk, from_memory);
    }

    #[test]
    fn hash_of_entry_directory_ignores_payload() {
        let a = hash_of_entry(EntryKind::Directory, 0o755, 0, 0, b"");
        let b = hash_of_entry(EntryKind::Directory, 0o755, 0, 0, b"anything, really");
        assert_eq!(a, b);
    }
}
