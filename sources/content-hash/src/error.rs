use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Failed to stat '{}': {}", path.display(), source))]
    Stat {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Failed to read file '{}': {}", path.display(), source))]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Failed to read symlink '{}': {}", path.display(), source))]
    ReadLink {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Unsupported file type at '{}'", path.display()))]
    UnsupportedType { path: PathBuf },

    #[snafu(display("Invalid hash string '{}'", value))]
    InvalidHash { value: String },
}

pub type Result<T> = std::result::Result<T, Error>;
