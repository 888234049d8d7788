use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Failed to load alias table '{}': {}", path.display(), source))]
    LoadAliases {
        path: std::path::PathBuf,
        source: repo_inspect::Error,
    },

    #[snafu(display("Failed to parse location '{}': {}", location, source))]
    ParseLocation {
        location: String,
        source: repo_inspect::Error,
    },

    #[snafu(display("Failed to construct transport: {}", source))]
    BuildTransport { source: repo_inspect::Error },

    #[snafu(display("Failed to open state directory '{}': {}", path.display(), source))]
    OpenStateDir {
        path: std::path::PathBuf,
        source: repo_inspect::Error,
    },

    #[snafu(display("Failed to fetch Manifest.MoM: {}", source))]
    FetchMom { source: repo_inspect::Error },

    #[snafu(display("Failed to fetch manifest for bundle '{}': {}", bundle, source))]
    FetchManifest {
        bundle: String,
        source: repo_inspect::Error,
    },

    #[snafu(display("Bundle '{}' is not listed in Manifest.MoM at version {}", bundle, version))]
    BundleNotInMom { bundle: String, version: u32 },

    #[snafu(display("'{}' is not a valid content hash: {}", value, source))]
    InvalidHash {
        value: String,
        source: content_hash::error::Error,
    },

    #[snafu(display("Failed to fetch fullfile for hash '{}': {}", hash, source))]
    FetchFullfile {
        hash: content_hash::Hash,
        source: repo_inspect::Error,
    },

    #[snafu(display("Failed to fetch zero pack for bundle '{}': {}", bundle, source))]
    FetchZeroPack {
        bundle: String,
        source: repo_inspect::Error,
    },

    #[snafu(display("Failed to walk history of '{}': {}", path, source))]
    LogFile {
        path: String,
        source: repo_inspect::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
