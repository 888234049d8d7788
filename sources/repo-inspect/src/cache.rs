use crate::error::{self, Result};
use crate::transport::Transport;
use snafu::ResultExt;
use std::path::{Path, PathBuf};

/// Materializes `rel` (fetched via `transport`) at `cache_path`, returning `cache_path`.
///
/// If `cache_path` already exists and `no_cache` is false, returns it without touching the
/// network at all, per §4.8's `get_file`. Otherwise downloads to a `.downloading` sibling
/// tempfile and renames it into place atomically on success, so a reader never observes a
/// partially written cache entry.
pub fn fetch_cached(transport: &Transport, rel: &str, cache_path: &Path, no_cache: bool) -> Result<PathBuf> {
    if cache_path.exists() && !no_cache {
        return Ok(cache_path.to_path_buf());
    }
    let bytes = transport.fetch_bytes(rel)?;
    write_atomic(cache_path, &bytes)?;
    Ok(cache_path.to_path_buf())
}

/// Unconditionally refetches and overwrites `cache_path`, used for the single redownload
/// attempt after a hash-mismatch (§7's recovery policy).
pub fn refetch(transport: &Transport, rel: &str, cache_path: &Path) -> Result<PathBuf> {
    let bytes = transport.fetch_bytes(rel)?;
    write_atomic(cache_path, &bytes)?;
    Ok(cache_path.to_path_buf())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context(error::WriteCacheSnafu { path: parent.to_path_buf() })?;
    }
    let downloading = path.with_file_name(format!(
        "{}.downloading",
        path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
    ));
    std::fs::write(&downloading, bytes).context(error::WriteCacheSnafu { path: downloading.clone() })?;
    std::fs::rename(&downloading, path).context(error::WriteCacheSnafu { path: path.to_path_buf() })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{DEFAULT_RETRIES, DEFAULT_TIMEOUT};
    use crate::url::ContentBase;
    use tempfile::TempDir;

    #[test]
    fn first_fetch_downloads_and_caches() {
        let origin = TempDir::new().unwrap();
        std::fs::create_dir_all(origin.path().join("20")).unwrap();
        std::fs::write(origin.path().join("20/Manifest.MoM"), b"content").unwrap();
        let transport = Transport::new(
            ContentBase::File(origin.path().to_path_buf()),
            false,
            DEFAULT_RETRIES,
            DEFAULT_TIMEOUT,
        )
        .unwrap();

        let cache_dir = TempDir::new().unwrap();
        let cache_path = cache_dir.path().join("20/Manifest.MoM");
        let path = fetch_cached(&transport, "20/Manifest.MoM", &cache_path, false).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"content");
    }

    #[test]
    fn cached_entry_is_returned_without_refetch_when_origin_goes_away() {
        let origin = TempDir::new().unwrap();
        std::fs::create_dir_all(origin.path().join("20")).unwrap();
        std::fs::write(origin.path().join("20/Manifest.MoM"), b"content").unwrap();
        let transport = Transport::new(
            ContentBase::File(origin.path().to_path_buf()),
            false,
            DEFAULT_RETRIES,
            DEFAULT_TIMEOUT,
        )
        .unwrap();

        let cache_dir = TempDir::new().unwrap();
        let cache_path = cache_dir.path().join("20/Manifest.MoM");
        fetch_cached(&transport, "20/Manifest.MoM", &cache_path, false).unwrap();

        std::fs::remove_file(origin.path().join("20/Manifest.MoM")).unwrap();
        let path = fetch_cached(&transport, "20/Manifest.MoM", &cache_path, false).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"content");
    }

    #[test]
    fn no_cache_forces_a_refetch() {
        let origin = TempDir::new().unwrap();
        std::fs::create_dir_all(origin.path().join("20")).unwrap();
        std::fs::write(origin.path().join("20/Manifest.MoM"), b"v1").unwrap();
        let transport = Transport::new(
            ContentBase::File(origin.path().to_path_buf()),
            false,
            DEFAULT_RETRIES,
            DEFAULT_TIMEOUT,
        )
        .unwrap();

        let cache_dir = TempDir::new().unwrap();
        let cache_path = cache_dir.path().join("20/Manifest.MoM");
        fetch_cached(&transport, "20/Manifest.MoM", &cache_path, false).unwrap();

        std::fs::write(origin.path().join("20/Manifest.MoM"), b"v2").unwrap();
        let path = fetch_cached(&transport, "20/Manifest.MoM", &cache_path, true).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"v2");
    }
}
