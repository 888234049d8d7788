use crate::error::{self, Result};
use snafu::{OptionExt, ResultExt};
use std::io::Read;
use std::path::Path;
use tar::EntryType;

/// The single archived entry's metadata and payload, as read back out of a fullfile.
#[derive(Debug, Clone)]
pub struct FullfileEntry {
    pub entry_type: EntryType,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    /// File content for a regular entry, the link target for a symlink entry, empty for a
    /// directory entry.
    pub payload: Vec<u8>,
}

/// Reads the single archived entry (metadata and payload) back out of a fullfile written by
/// [`crate::build_fullfiles`], transparently undoing whichever codec §4.6 picked for it.
///
/// Shared by the delta/pack builder (diffing a file against its previous-version content)
/// and the inspector (staging a downloaded fullfile and recomputing its content hash), so the
/// compression magic-byte sniffing that [`crate::build_fullfile_bytes`] produces lives in
/// exactly one place.
pub fn read_fullfile_entry(path: &Path) -> Result<FullfileEntry> {
    let bytes = std::fs::read(path).context(error::ReadFullfileSnafu { path })?;
    let tar_bytes = decompress(&bytes);
    let mut archive = tar::Archive::new(tar_bytes.as_slice());
    let mut entries = archive.entries().context(error::ReadFullfileSnafu { path })?;
    let mut entry = entries
        .next()
        .context(error::EmptyFullfileSnafu { path })?
        .context(error::ReadFullfileSnafu { path })?;

    let header = entry.header();
    let entry_type = header.entry_type();
    let mode = header.mode().unwrap_or(0o644);
    let uid = header.uid().unwrap_or(0) as u32;
    let gid = header.gid().unwrap_or(0) as u32;

    let payload = if entry_type == EntryType::Symlink {
        entry
            .link_name()
            .context(error::ReadFullfileSnafu { path })?
            .map(|p| p.to_string_lossy().into_owned().into_bytes())
            .unwrap_or_default()
    } else {
        let mut buf = Vec::new();
        entry.read_to_end(&mut buf).context(error::ReadFullfileSnafu { path })?;
        buf
    };

    Ok(FullfileEntry {
        entry_type,
        mode,
        uid,
        gid,
        payload,
    })
}

/// Convenience wrapper over [`read_fullfile_entry`] for callers that only need the payload
/// bytes (the delta builder diffs raw content and never needs the tar metadata back).
pub fn read_fullfile_payload(path: &Path) -> Result<Vec<u8>> {
    Ok(read_fullfile_entry(path)?.payload)
}

/// Sniffs `bytes` for a known compression magic and decompresses if found; returns `bytes`
/// unchanged otherwise (either an uncompressed tar, or a format the caller's tar reader will
/// report a clear parse error for).
fn decompress(bytes: &[u8]) -> Vec<u8> {
    if bytes.starts_with(&[0x1f, 0x8b]) {
        let mut out = Vec::new();
        if flate2::read::GzDecoder::new(bytes).read_to_end(&mut out).is_ok() {
            return out;
        }
    } else if bytes.starts_with(b"BZh") {
        let mut out = Vec::new();
        if bzip2::read::BzDecoder::new(bytes).read_to_end(&mut out).is_ok() {
            return out;
        }
    } else if bytes.starts_with(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]) {
        let mut out = Vec::new();
        if xz2::read::XzDecoder::new(bytes).read_to_end(&mut out).is_ok() {
            return out;
        }
    }
    bytes.to_vec()
}
