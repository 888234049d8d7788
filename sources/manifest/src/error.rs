use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Failed to read manifest '{}': {}", path.display(), source))]
    ManifestRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Failed to write manifest '{}': {}", path.display(), source))]
    ManifestWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Failed to persist temporary manifest to '{}': {}", path.display(), source))]
    ManifestPersist {
        path: PathBuf,
        source: tempfile::PersistError,
    },

    #[snafu(display("line {}: {}", line, reason))]
    Parse { line: usize, reason: String },

    #[snafu(display("invalid header field '{}': {}", key, reason))]
    BadHeader { key: String, reason: String },

    #[snafu(display("manifest invariant violated: {}", reason))]
    Invariant { reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
