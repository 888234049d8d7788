use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Failed to walk bundle root '{}': {}", root.display(), source))]
    Walk {
        root: PathBuf,
        source: walkdir::Error,
    },

    #[snafu(display("Failed to stat '{}': {}", path.display(), source))]
    Stat {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Failed to hash '{}': {}", path.display(), source))]
    Hash {
        path: PathBuf,
        source: content_hash::error::Error,
    },

    #[snafu(display("Entry '{}' has an unsupported file type", path.display()))]
    UnsupportedType { path: PathBuf },
}

pub type Result<T> = std::result::Result<T, Error>;
