use content_hash::Hash;
use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Failed to read source file '{}' for hash {}: {}", path.display(), hash, source))]
    ReadSource {
        path: PathBuf,
        hash: Hash,
        source: std::io::Error,
    },

    #[snafu(display("Failed to build tar entry for hash {}: {}", hash, source))]
    BuildTar { hash: Hash, source: std::io::Error },

    #[snafu(display("Every codec failed to produce a fullfile for hash {}", hash))]
    NoCandidate { hash: Hash },

    #[snafu(display("Failed to create output directory '{}': {}", path.display(), source))]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Failed to write fullfile for hash {}: {}", hash, source))]
    WriteFullfile {
        hash: Hash,
        source: std::io::Error,
    },

    #[snafu(display("Failed to persist fullfile for hash {}: {}", hash, source))]
    PersistFullfile {
        hash: Hash,
        source: tempfile::PersistError,
    },

    #[snafu(display("Fullfile worker thread panicked"))]
    WorkerPanic,

    #[snafu(display("Failed to read fullfile '{}': {}", path.display(), source))]
    ReadFullfile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Fullfile '{}' contains no archive entry", path.display()))]
    EmptyFullfile { path: PathBuf },

    #[snafu(display("Fullfile packaging cancelled"))]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;
