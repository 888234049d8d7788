use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Include cycle detected while resolving '{}': {}", name, path.join(" -> ")))]
    IncludeCycle { name: String, path: Vec<String> },

    #[snafu(display("Failed to create output directory '{}': {}", path.display(), source))]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Manifest error for bundle '{}': {}", bundle, source))]
    Manifest {
        bundle: String,
        source: manifest::Error,
    },

    #[snafu(display("Failed to hash manifest file '{}': {}", path.display(), source))]
    HashManifest {
        path: PathBuf,
        source: content_hash::error::Error,
    },

    #[snafu(display("Worker thread for bundle '{}' panicked", bundle))]
    WorkerPanic { bundle: String },

    #[snafu(display("Build cancelled"))]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;
