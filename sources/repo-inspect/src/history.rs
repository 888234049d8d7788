use crate::error::{self, Result};
use crate::manifests;
use crate::state::StateDir;
use crate::transport::Transport;
use content_hash::Hash;
use manifest::Manifest;

/// One distinct content hash a path held, and the version at which it started holding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryEntry {
    pub version: u32,
    pub hash: Hash,
}

/// Walks `path`'s history backward from `start_version`, per §4.8's `log` operation.
///
/// Finds the bundle (among `bundles`) whose manifest contains `path` at `start_version`,
/// then follows that bundle manifest's `header.previous` chain, re-checking the
/// last-known bundle first at each step before falling back to scanning `bundles` again
/// (a path can in principle move to a different bundle between versions, though this
/// engine never does that itself). Consecutive identical hashes are collapsed into a
/// single entry, so the result lists each distinct content the path ever held.
pub fn log_file(
    transport: &Transport,
    state: &StateDir,
    bundles: &[String],
    start_version: u32,
    path: &str,
    no_cache: bool,
) -> Result<Vec<HistoryEntry>> {
    let mut out: Vec<HistoryEntry> = Vec::new();
    let mut version = start_version;
    let mut hint: Option<String> = None;

    loop {
        let mom = manifests::get_mom(transport, state, version, no_cache)?;
        let found = find_bundle_with_path(transport, state, &mom, bundles, path, hint.as_deref(), no_cache)?;
        let Some((bundle_name, manifest)) = found else {
            return error::PathNotFoundSnafu {
                path: path.to_string(),
                version,
                bundles: bundles.to_vec(),
            }
            .fail();
        };

        let record = manifest
            .find(path)
            .expect("find_bundle_with_path only returns a manifest that contains path");
        if out.last().map(|e| e.hash) != Some(record.hash) {
            out.push(HistoryEntry {
                version: record.version,
                hash: record.hash,
            });
        }

        hint = Some(bundle_name);
        if manifest.header.previous == 0 || manifest.header.previous >= version {
            break;
        }
        version = manifest.header.previous;
    }

    Ok(out)
}

/// Locates the bundle (and its manifest) containing `path` at the version `mom` describes.
/// Tries `hint` first when given (the locality optimization), then the rest of `bundles`
/// in order.
fn find_bundle_with_path(
    transport: &Transport,
    state: &StateDir,
    mom: &Manifest,
    bundles: &[String],
    path: &str,
    hint: Option<&str>,
    no_cache: bool,
) -> Result<Option<(String, Manifest)>> {
    let mut order: Vec<&str> = Vec::new();
    if let Some(hint) = hint {
        order.push(hint);
    }
    for b in bundles {
        if Some(b.as_str()) != hint {
            order.push(b);
        }
    }

    for bundle_name in order {
        let Some(entry) = mom.find(bundle_name) else {
            continue;
        };
        if entry.hash.is_zero() {
            continue;
        }
        let manifest = manifests::get_bundle_manifest(
            transport,
            state,
            entry.version,
            bundle_name,
            Some(entry.hash),
            no_cache,
        )?;
        if manifest.find(path).is_some() {
            return Ok(Some((bundle_name.to_string(), manifest)));
        }
    }
    Ok(None)
}
