use crate::cmd::Common;
use crate::error::{self, Result};
use clap::Parser;
use content_hash::Hash;
use manifest::Manifest;
use repo_inspect::{diff_recursive, DiffLine, DiffMarker, StateDir, Transport};
use snafu::{OptionExt, ResultExt};
use std::collections::HashMap;

/// Diffs two versions of `Manifest.MoM`, or a single bundle's manifest across two versions.
#[derive(Debug, Parser)]
pub(crate) struct Diff {
    #[clap(flatten)]
    common: Common,

    /// Version to diff against. Defaults to the manifest's own `previous` pointer.
    #[clap(long = "from-version")]
    from_version: Option<u32>,

    /// Bundle to diff. Omit to diff `Manifest.MoM` itself.
    #[clap(long)]
    bundle: Option<String>,

    /// Descend into every changed sub-manifest `Manifest.MoM` references. Ignored with
    /// `--bundle`.
    #[clap(long)]
    recursive: bool,

    /// Also print unchanged paths.
    #[clap(long)]
    all: bool,
}

impl Diff {
    pub(super) fn run(&self) -> Result<()> {
        let (transport, state, to_version) = self.common.resolve()?;
        let no_cache = self.common.no_cache;

        let lines = match &self.bundle {
            None => {
                let new_mom =
                    repo_inspect::get_mom(&transport, &state, to_version, no_cache).context(error::FetchMomSnafu)?;
                let from_version = self.from_version.unwrap_or(new_mom.header.previous);
                let old_mom = repo_inspect::get_mom(&transport, &state, from_version, no_cache)
                    .context(error::FetchMomSnafu)?;

                if self.recursive {
                    let mut resolve = sub_manifest_resolver(&transport, &state, &old_mom, &new_mom, no_cache);
                    diff_recursive(&old_mom, &new_mom, &mut resolve)
                } else {
                    repo_inspect::diff_manifests(&old_mom, &new_mom)
                }
            }
            Some(bundle) => {
                let new_manifest = fetch_via_mom(&transport, &state, bundle, to_version, no_cache)?;
                let from_version = self.from_version.unwrap_or(new_manifest.header.previous);
                let old_manifest = fetch_via_mom(&transport, &state, bundle, from_version, no_cache)?;
                repo_inspect::diff_manifests(&old_manifest, &new_manifest)
            }
        };

        for line in &lines {
            if line.marker == DiffMarker::Same && !self.all {
                continue;
            }
            print_line(line);
        }
        Ok(())
    }
}

/// Fetches bundle `name`'s manifest at `version`, trusting whatever `Manifest.MoM` at that
/// version says its content hash should be.
fn fetch_via_mom(
    transport: &Transport,
    state: &StateDir,
    name: &str,
    version: u32,
    no_cache: bool,
) -> Result<Manifest> {
    let mom = repo_inspect::get_mom(transport, state, version, no_cache).context(error::FetchMomSnafu)?;
    let entry = mom.find(name).context(error::BundleNotInMomSnafu {
        bundle: name.to_string(),
        version,
    })?;
    repo_inspect::get_bundle_manifest(transport, state, entry.version, name, Some(entry.hash), no_cache)
        .context(error::FetchManifestSnafu { bundle: name.to_string() })
}

/// Builds the `resolve` closure `diff_recursive` needs to follow a changed `Manifest.MoM`
/// entry down into the two bundle manifests it points at. `diff_recursive` only passes a
/// name and a hash, so the version each hash was published at is recovered from the two
/// `Manifest.MoM` file lists gathered up front.
fn sub_manifest_resolver<'a>(
    transport: &'a Transport,
    state: &'a StateDir,
    old_mom: &Manifest,
    new_mom: &Manifest,
    no_cache: bool,
) -> impl FnMut(&str, Hash) -> Option<Manifest> + 'a {
    let mut version_by_hash: HashMap<(String, Hash), u32> = HashMap::new();
    for record in old_mom.files.iter().chain(new_mom.files.iter()) {
        version_by_hash.insert((record.name.clone(), record.hash), record.version);
    }

    move |name: &str, hash: Hash| {
        let version = *version_by_hash.get(&(name.to_string(), hash))?;
        repo_inspect::get_bundle_manifest(transport, state, version, name, Some(hash), no_cache).ok()
    }
}

fn print_line(line: &DiffLine) {
    match line.marker {
        DiffMarker::Added => println!("+ {} {}", line.name, line.new_hash.unwrap_or(Hash::ZERO)),
        DiffMarker::Removed => println!("- {} {}", line.name, line.old_hash.unwrap_or(Hash::ZERO)),
        DiffMarker::Changed => println!(
            "! {} {} -> {}",
            line.name,
            line.old_hash.unwrap_or(Hash::ZERO),
            line.new_hash.unwrap_or(Hash::ZERO)
        ),
        DiffMarker::Same => println!("= {} {}", line.name, line.new_hash.unwrap_or(Hash::ZERO)),
    }
}
