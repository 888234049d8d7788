use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Failed to read repo config '{}': {}", path.display(), source))]
    ReadConfig {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Failed to parse repo config '{}': {}", path.display(), source))]
    ParseConfig {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[snafu(display("Failed to scan chroot '{}' for bundle '{}': {}", path.display(), bundle, source))]
    Scan {
        bundle: String,
        path: PathBuf,
        source: bundle_scan::Error,
    },

    #[snafu(display("Failed to read previous manifest '{}': {}", path.display(), source))]
    ReadPreviousManifest {
        path: PathBuf,
        source: manifest::Error,
    },

    #[snafu(display("Version build failed: {}", source))]
    Build { source: repo_build::Error },

    #[snafu(display("Fullfile packaging failed: {}", source))]
    Fullfile { source: fullfile_pack::Error },

    #[snafu(display("Pack build failed for bundle '{}': {}", bundle, source))]
    Pack {
        bundle: String,
        source: delta_pack::Error,
    },

    #[snafu(display("Failed to resolve recent pack jobs: {}", source))]
    RecentJobs { source: delta_pack::Error },

    #[snafu(display("Failed to read last published version from '{}': {}", path.display(), source))]
    ReadLastVersion {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("'{}' does not contain a valid version integer", path.display()))]
    InvalidLastVersion { path: PathBuf },

    #[snafu(display("Failed to publish pointer file '{}': {}", path.display(), source))]
    WritePointer {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Failed to persist pointer file '{}': {}", path.display(), source))]
    PersistPointer {
        path: PathBuf,
        source: tempfile::PersistError,
    },

    #[snafu(display("Failed to hash entry '{}' for fullfile source resolution: {}", path.display(), source))]
    HashSource {
        path: PathBuf,
        source: content_hash::error::Error,
    },

    #[snafu(display("Failed to read symlink target at '{}': {}", path.display(), source))]
    ReadLink {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Signer '{}' could not be located on PATH: {}", name, source))]
    SignerNotFound {
        name: String,
        source: which::Error,
    },

    #[snafu(display("Failed to invoke signer for '{}': {}", path.display(), source))]
    SpawnSigner { path: PathBuf, source: cancel::Error },

    #[snafu(display("Signer exited non-zero signing '{}': {}", path.display(), stderr))]
    SignerFailed { path: PathBuf, stderr: String },

    #[snafu(display("No chroot recorded for file '{}' when materializing fullfiles", name))]
    UnresolvedSource { name: String },
}

pub type Result<T> = std::result::Result<T, Error>;
