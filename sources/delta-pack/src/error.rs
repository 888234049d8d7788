use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Failed to read fullfile '{}': {}", path.display(), source))]
    ReadFullfile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Fullfile '{}' contains no archive entry", path.display()))]
    EmptyFullfile { path: PathBuf },

    #[snafu(display("Failed to create output directory '{}': {}", path.display(), source))]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Failed to append pack member '{}': {}", member, source))]
    AppendMember {
        member: String,
        source: std::io::Error,
    },

    #[snafu(display("Failed to write pack '{}': {}", path.display(), source))]
    WritePack {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Failed to persist pack '{}': {}", path.display(), source))]
    PersistPack {
        path: PathBuf,
        source: tempfile::PersistError,
    },

    #[snafu(display("Pack worker thread panicked"))]
    WorkerPanic,

    #[snafu(display("No previous fullfile store available to diff '{}' against", name))]
    NoPreviousStore { name: String },

    #[snafu(display("Failed to read fullfile payload '{}': {}", path.display(), source))]
    ReadPayload {
        path: PathBuf,
        source: fullfile_pack::Error,
    },

    #[snafu(display("Failed to list published versions under '{}': {}", path.display(), source))]
    ListVersions {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Failed to read manifest '{}': {}", path.display(), source))]
    ReadManifest {
        path: PathBuf,
        source: manifest::Error,
    },

    #[snafu(display("Pack build cancelled"))]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;
