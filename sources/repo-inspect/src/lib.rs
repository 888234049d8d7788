/*!
Inspector (`repo-inspect`) for the update repository engine.

Resolves a content base URL (a local directory or an HTTP(S) origin) plus a version into
manifests, fullfiles, and zero packs, caching everything under a state directory so repeated
invocations against the same content base avoid redundant network traffic. Also provides the
two read-only analysis operations an operator runs against cached content: a two-manifest
diff, and a per-file history walk.
*/

mod cache;
pub mod diff;
pub mod error;
mod fullfile;
mod history;
mod manifests;
mod state;
mod transport;
mod url;
mod zero_pack;

pub use diff::{diff_manifests, diff_recursive, DiffLine, DiffMarker};
pub use error::{Error, Result};
pub use fullfile::get_fullfile;
pub use history::{log_file, HistoryEntry};
pub use manifests::{get_bundle_manifest, get_mom};
pub use state::StateDir;
pub use transport::{Transport, DEFAULT_RETRIES, DEFAULT_TIMEOUT};
pub use url::{parse_base, parse_location, AliasTable, ContentBase, ContentLocation};
pub use zero_pack::get_zero_pack;
