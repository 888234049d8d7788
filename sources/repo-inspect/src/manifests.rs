use crate::cache;
use crate::error::{self, Result};
use crate::state::StateDir;
use crate::transport::Transport;
use content_hash::Hash;
use manifest::Manifest;
use snafu::ResultExt;

/// Downloads or reads (depending on the content base) `Manifest.MoM` for version `v`, caching
/// it under `<stateDir>/<v>/Manifest.MoM`. `Manifest.MoM` has no expected hash of its own: it
/// is the trust root callers verify bundle manifests against.
pub fn get_mom(transport: &Transport, state: &StateDir, v: u32, no_cache: bool) -> Result<Manifest> {
    fetch_manifest(transport, state, v, "MoM", "Manifest.MoM", None, no_cache)
}

/// Downloads or reads `Manifest.<name>` for version `v`, verifying its content hash against
/// `expected_hash` when the caller has one (taken from the entry in an already-trusted
/// `Manifest.MoM`). On a first mismatch, refetches once; a second mismatch is fatal, per
/// the recovery policy in §7.
pub fn get_bundle_manifest(
    transport: &Transport,
    state: &StateDir,
    v: u32,
    name: &str,
    expected_hash: Option<Hash>,
    no_cache: bool,
) -> Result<Manifest> {
    let filename = format!("Manifest.{}", name);
    fetch_manifest(transport, state, v, name, &filename, expected_hash, no_cache)
}

fn fetch_manifest(
    transport: &Transport,
    state: &StateDir,
    v: u32,
    label: &str,
    filename: &str,
    expected_hash: Option<Hash>,
    no_cache: bool,
) -> Result<Manifest> {
    let rel = format!("{}/{}", v, filename);
    let cache_path = state.version_dir(v).join(filename);

    let path = cache::fetch_cached(transport, &rel, &cache_path, no_cache)?;
    let text = std::fs::read_to_string(&path).context(error::ReadLocalSnafu { path: path.clone() })?;

    if let Some(expected) = expected_hash {
        let actual = content_hash::hash_of(&path).map_err(|_| error::Error::ManifestParse {
            name: label.to_string(),
            expected,
            source: manifest::Error::Parse {
                line: 0,
                reason: "failed to hash downloaded manifest".to_string(),
            },
        })?;
        if actual != expected {
            log::warn!(
                "manifest '{}' at version {} hash mismatch (expected {}, got {}), retrying once",
                label,
                v,
                expected,
                actual
            );
            let path = cache::refetch(transport, &rel, &cache_path)?;
            let actual = content_hash::hash_of(&path).ok();
            if actual != Some(expected) {
                return error::HashMismatchSnafu {
                    name: label.to_string(),
                    expected,
                    actual: actual.unwrap_or(Hash::ZERO),
                }
                .fail();
            }
        }
    }

    manifest::parse(label, &text).context(error::ManifestParseSnafu {
        name: label.to_string(),
        expected: expected_hash.unwrap_or(Hash::ZERO),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{DEFAULT_RETRIES, DEFAULT_TIMEOUT};
    use crate::url::ContentBase;
    use manifest::{FileRecord, Flags, Header, FileType};
    use tempfile::TempDir;

    fn sample_manifest_text() -> String {
        let header = Header {
            format: 1,
            version: 20,
            previous: 10,
            filecount: 1,
            timestamp: 1,
            contentsize: 1,
            includes: vec![],
        };
        let files = vec![FileRecord::new(
            "/etc/hostname",
            Hash::ZERO,
            20,
            Flags::present(FileType::Regular),
        )];
        let m = Manifest::new("os-core", header, files);
        manifest::emit(&m).unwrap()
    }

    #[test]
    fn fetches_and_caches_mom() {
        let origin = TempDir::new().unwrap();
        std::fs::create_dir_all(origin.path().join("20")).unwrap();
        std::fs::write(origin.path().join("20/Manifest.MoM"), sample_manifest_text()).unwrap();

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

        let manifest = get_mom(&transport, &state, 20, false).unwrap();
        assert_eq!(manifest.header.version, 20);
        assert!(state.version_dir(20).join("Manifest.MoM").exists());
    }

    #[test]
    fn bundle_manifest_hash_match_succeeds() {
        let origin = TempDir::new().unwrap();
        std::fs::create_dir_all(origin.path().join("20")).unwrap();
        let text = sample_manifest_text();
        std::fs::write(origin.path().join("20/Manifest.os-core"), &text).unwrap();

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

        let expected = content_hash::hash_of(&origin.path().join("20/Manifest.os-core")).unwrap();
        let manifest = get_bundle_manifest(&transport, &state, 20, "os-core", Some(expected), false).unwrap();
        assert_eq!(manifest.name, "os-core");
    }

    #[test]
    fn bundle_manifest_hash_mismatch_is_fatal_after_one_retry() {
        let origin = TempDir::new().unwrap();
        std::fs::create_dir_all(origin.path().join("20")).unwrap();
        std::fs::write(origin.path().join("20/Manifest.os-core"), sample_manifest_text()).unwrap();

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

        let bogus: Hash = "a".repeat(64).parse().unwrap();
        let result = get_bundle_manifest(&transport, &state, 20, "os-core", Some(bogus), false);
        assert!(result.is_err());
    }
}
