use crate::classify::classify;
use crate::error::{self, Result};
use manifest::{FileInfo, FileRecord, FileType, Flags};
use snafu::ResultExt;
use std::collections::HashMap;
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use walkdir::WalkDir;

/// A `(dev, inode)` pair, used to recognize hard-linked files so their hash is computed once.
type InodeKey = (u64, u64);

/// Walks `root` (an `image/<ver>/<bundle>/` tree) and returns one [`FileRecord`] per entry,
/// with `name` set to the absolute path from the bundle root and `version` left at `0` —
/// the version builder decides the real version during the diff against the previous
/// manifest.
///
/// Hard-linked regular files sharing the same `(dev, inode)` are hashed once and the result
/// reused for every path pointing at that inode.
pub fn scan_bundle(root: impl AsRef<Path>) -> Result<Vec<FileRecord>> {
    let root = root.as_ref();
    let mut files = Vec::new();
    let mut inode_cache: HashMap<InodeKey, content_hash::Hash> = HashMap::new();

    // `contents_first(true)` walks post-order, as the specification requires, though the
    // scanner itself is order-independent: the version builder sorts by name before diffing.
    for entry in WalkDir::new(root).contents_first(true).min_depth(1) {
        let entry = entry.context(error::WalkSnafu { root })?;
        let path = entry.path();
        let rel = path.strip_prefix(root).expect("walkdir yields paths under root");
        let name = format!("/{}", rel.to_string_lossy());

        let meta = std::fs::symlink_metadata(path).context(error::StatSnafu { path })?;
        let file_type = meta.file_type();

        let (kind, cache_key) = if file_type.is_symlink() {
            (FileType::Symlink, None)
        } else if file_type.is_dir() {
            (FileType::Directory, None)
        } else if file_type.is_file() {
            let key = (meta.dev(), meta.ino());
            (FileType::Regular, Some(key))
        } else {
            return error::UnsupportedTypeSnafu { path }.fail();
        };

        let hash = if let Some(key) = cache_key {
            if let Some(cached) = inode_cache.get(&key) {
                *cached
            } else {
                let h = content_hash::hash_of(path).context(error::HashSnafu { path })?;
                inode_cache.insert(key, h);
                h
            }
        } else {
            content_hash::hash_of(path).context(error::HashSnafu { path })?
        };

        let (modifier, status) = classify(&name);
        let mut flags = Flags::present(kind);
        flags.modifier = modifier;
        flags.status = status;

        let mut record = FileRecord::new(name, hash, 0, flags);
        record.info = Some(FileInfo {
            size: meta.len(),
            uid: meta.uid(),
            gid: meta.gid(),
            mode: meta.mode(),
        });
        files.push(record);
    }

    Ok(files)
}
