use content_hash::Hash;
use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Invalid content base '{}': {}", value, reason))]
    InvalidBase { value: String, reason: String },

    #[snafu(display("Invalid inspector URL '{}': {}", value, reason))]
    InvalidUrl { value: String, reason: String },

    #[snafu(display("Failed to read alias table '{}': {}", path.display(), source))]
    ReadAliasTable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Failed to parse alias table '{}': {}", path.display(), source))]
    ParseAliasTable {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[snafu(display("Offline mode: refusing network fetch of '{}'", url))]
    Offline { url: String },

    #[snafu(display("HTTP GET '{}' failed after {} attempt(s): {}", url, attempts, source))]
    HttpGet {
        url: String,
        attempts: u32,
        source: reqwest::Error,
    },

    #[snafu(display("HTTP GET '{}' returned status {}", url, status))]
    HttpStatus { url: String, status: u16 },

    #[snafu(display("Failed to read local content '{}': {}", path.display(), source))]
    ReadLocal {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Failed to create state directory '{}': {}", path.display(), source))]
    CreateStateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Failed to manage state directory '{}': {}", path.display(), source))]
    WipeStateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Failed to stage downloaded content to '{}': {}", path.display(), source))]
    WriteCache {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Failed to persist cached content to '{}': {}", path.display(), source))]
    PersistCache {
        path: PathBuf,
        source: tempfile::PersistError,
    },

    #[snafu(display("Manifest '{}' (expected hash {}) failed parsing: {}", name, expected, source))]
    ManifestParse {
        name: String,
        expected: Hash,
        source: manifest::Error,
    },

    #[snafu(display(
        "Hash mismatch for '{}': expected {}, recomputed {} (retried once, still mismatched)",
        name,
        expected,
        actual
    ))]
    HashMismatch {
        name: String,
        expected: Hash,
        actual: Hash,
    },

    #[snafu(display("Fullfile '{}' contains no archive entry", name))]
    EmptyFullfile { name: String },

    #[snafu(display("Failed to read fullfile payload for hash {}: {}", hash, source))]
    ReadFullfile { hash: Hash, source: fullfile_pack::Error },

    #[snafu(display("Fullfile for hash {} has unsupported archive entry type {:?}", hash, entry_type))]
    UnsupportedEntryType { hash: Hash, entry_type: String },

    #[snafu(display("Failed to stage hash {} under '{}': {}", hash, path.display(), source))]
    StageFullfile {
        hash: Hash,
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("External tool '{}' not found on PATH: {}", name, source))]
    ToolNotFound {
        name: String,
        source: which::Error,
    },

    #[snafu(display("External process '{}' exited with status {}: {}", name, status, stderr))]
    ExternalFailed {
        name: String,
        status: i32,
        stderr: String,
    },

    #[snafu(display("External process '{}' failed: {}", name, source))]
    SpawnExternal { name: String, source: cancel::Error },

    #[snafu(display("No bundle among {:?} contains path '{}' at version {}", bundles, path, version))]
    PathNotFound {
        path: String,
        version: u32,
        bundles: Vec<String>,
    },

    #[snafu(display("Failed to parse pack archive '{}': {}", path.display(), source))]
    ParsePack {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Pack archive '{}' has a malformed member name '{}'", path.display(), name))]
    BadPackMember { path: PathBuf, name: String },

    #[snafu(display("Failed to write sentinel '{}': {}", path.display(), source))]
    WriteSentinel {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
