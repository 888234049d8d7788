use crate::error::{self, Result};
use content_hash::Hash;
use manifest::FileInfo;
use snafu::{OptionExt, ResultExt};
use std::io::Write;
use std::path::PathBuf;
use tar::{Builder, EntryType, Header};

/// What a fullfile job archives: a regular file's content read from `path`, an empty
/// directory entry, or a symlink's target string. Mirrors [`manifest::FileType`] minus the
/// variants that never reach the packager (deleted/ghosted entries produce no fullfile).
#[derive(Debug, Clone)]
pub enum SourceKind {
    Regular { path: PathBuf },
    Directory,
    Symlink { target: String },
}

/// One of the candidate codecs tried for a regular file's fullfile, in tie-break preference
/// order (§4.6): when two candidates produce the same size, the earlier one in this list
/// wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Xz,
    Bzip2,
    Gzip,
    Raw,
}

const PREFERENCE: [Codec; 4] = [Codec::Xz, Codec::Bzip2, Codec::Gzip, Codec::Raw];

fn preference_rank(codec: Codec) -> usize {
    PREFERENCE.iter().position(|&c| c == codec).unwrap_or(usize::MAX)
}

/// Builds the uncompressed single-entry tar archive for `kind`, per §4.6(a): the one entry
/// is named by the hex hash, its type reflects the source's file type, and its metadata
/// (mode/uid/gid) mirrors the source. `mtime` is the build clock, not the source file's own
/// mtime, so that identical inputs always produce byte-identical tars.
fn build_raw_tar(hash: &Hash, kind: &SourceKind, info: Option<FileInfo>, mtime: u64) -> Result<Vec<u8>> {
    let name = hash.to_string();
    let mut header = Header::new_gnu();
    header.set_mtime(mtime);
    apply_info(&mut header, info);

    let mut builder = Builder::new(Vec::new());
    match kind {
        SourceKind::Regular { path } => {
            let data = std::fs::read(path).context(error::ReadSourceSnafu { path, hash: *hash })?;
            header.set_entry_type(EntryType::Regular);
            header.set_size(data.len() as u64);
            header.set_cksum();
            builder
                .append_data(&mut header, &name, data.as_slice())
                .context(error::BuildTarSnafu { hash: *hash })?;
        }
        SourceKind::Directory => {
            header.set_entry_type(EntryType::Directory);
            header.set_size(0);
            header.set_cksum();
            builder
                .append_data(&mut header, &name, std::io::empty())
                .context(error::BuildTarSnafu { hash: *hash })?;
        }
        SourceKind::Symlink { target } => {
            header.set_entry_type(EntryType::Symlink);
            header.set_size(0);
            header.set_cksum();
            builder
                .append_link(&mut header, &name, target)
                .context(error::BuildTarSnafu { hash: *hash })?;
        }
    }

    builder.into_inner().context(error::BuildTarSnafu { hash: *hash })
}

fn apply_info(header: &mut Header, info: Option<FileInfo>) {
    let info = info.unwrap_or_default();
    let mode = if info.mode != 0 { info.mode & 0o7777 } else { 0o644 };
    header.set_mode(mode);
    header.set_uid(info.uid as u64);
    header.set_gid(info.gid as u64);
}

fn compress_gzip(raw: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::best());
    enc.write_all(raw)?;
    enc.finish()
}

fn compress_bzip2(raw: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut enc = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::best());
    enc.write_all(raw)?;
    enc.finish()
}

fn compress_xz(raw: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut enc = xz2::write::XzEncoder::new(Vec::new(), 9);
    enc.write_all(raw)?;
    enc.finish()
}

/// Produces the bytes to write as `files/<hash>.tar`, per §4.6.
///
/// Directories and symlinks skip codec selection entirely: a single gzip pass over the raw
/// tar, falling back to the raw tar itself if gzip fails. Regular files are tried against
/// every codec in [`Codec`]; the smallest surviving candidate wins, ties broken by
/// [`PREFERENCE`]. At least one candidate (the raw tar) always succeeds, so this only fails
/// if even the in-memory tar construction does.
pub fn build_fullfile_bytes(
    hash: &Hash,
    kind: &SourceKind,
    info: Option<FileInfo>,
    mtime: u64,
) -> Result<Vec<u8>> {
    let raw = build_raw_tar(hash, kind, info, mtime)?;

    if !matches!(kind, SourceKind::Regular { .. }) {
        return match compress_gzip(&raw) {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                log::warn!("gzip compression failed for {hash}, falling back to raw tar: {e}");
                Ok(raw)
            }
        };
    }

    let mut candidates: Vec<(Codec, Vec<u8>)> = vec![(Codec::Raw, raw.clone())];
    for (codec, result) in [
        (Codec::Gzip, compress_gzip(&raw)),
        (Codec::Bzip2, compress_bzip2(&raw)),
        (Codec::Xz, compress_xz(&raw)),
    ] {
        match result {
            Ok(bytes) => candidates.push((codec, bytes)),
            Err(e) => log::warn!("{codec:?} compression failed for {hash}, skipping candidate: {e}"),
        }
    }

    candidates.sort_by(|a, b| {
        a.1.len()
            .cmp(&b.1.len())
            .then_with(|| preference_rank(a.0).cmp(&preference_rank(b.0)))
    });

    candidates
        .into_iter()
        .next()
        .map(|(_, bytes)| bytes)
        .context(error::NoCandidateSnafu { hash: *hash })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn regular_file_picks_smallest_and_is_self_consistent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("payload");
        // Highly compressible content so every codec beats raw.
        std::fs::write(&path, vec![b'a'; 4096]).unwrap();
        let hash: Hash = "a".repeat(64).parse().unwrap();

        let bytes = build_fullfile_bytes(
            &hash,
            &SourceKind::Regular { path },
            Some(FileInfo {
                size: 4096,
                uid: 0,
                gid: 0,
                mode: 0o644,
            }),
            1_700_000_000,
        )
        .unwrap();

        assert!(bytes.len() < 4096 + 512);
    }

    #[test]
    fn directory_fullfile_is_gzip_only() {
        let hash: Hash = "b".repeat(64).parse().unwrap();
        let bytes = build_fullfile_bytes(&hash, &SourceKind::Directory, None, 1).unwrap();
        // gzip magic bytes
        assert_eq!(&bytes[0..2], &[0x1f, 0x8b]);
    }

    #[test]
    fn symlink_fullfile_archives_target_as_link() {
        let hash: Hash = "c".repeat(64).parse().unwrap();
        let bytes = build_fullfile_bytes(
            &hash,
            &SourceKind::Symlink {
                target: "/usr/bin/bash".to_string(),
            },
            None,
            1,
        )
        .unwrap();
        assert_eq!(&bytes[0..2], &[0x1f, 0x8b]);
    }

    #[test]
    fn raw_tar_round_trips_a_single_regular_entry() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, b"hello").unwrap();
        let hash: Hash = "d".repeat(64).parse().unwrap();

        let raw = build_raw_tar(
            &hash,
            &SourceKind::Regular { path },
            Some(FileInfo {
                size: 5,
                uid: 1,
                gid: 2,
                mode: 0o640,
            }),
            42,
        )
        .unwrap();

        let mut archive = tar::Archive::new(raw.as_slice());
        let mut entries = archive.entries().unwrap();
        let mut entry = entries.next().unwrap().unwrap();
        let mut buf = Vec::new();
        std::io::Read::read_to_end(&mut entry, &mut buf).unwrap();
        assert_eq!(buf, b"hello");
    }
}
