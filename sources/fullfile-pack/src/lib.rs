/*!
The fullfile packager (C6): for every hash introduced at a version, materializes
`www/<version>/files/<hash>.tar` — a single-entry tar archive named by content hash, with
the smallest of several candidate compressions chosen per §4.6.

[`build_fullfiles`] drains a job list across a pool of OS-thread workers; each job names a
hash and the filesystem entry (regular file, directory, or symlink) that produced it. The
caller is responsible for de-duplicating hashes across bundles before building the job list,
since the content store is addressed by hash alone.
*/

mod codec;
pub mod error;
mod reader;
mod worker;

pub use codec::{build_fullfile_bytes, Codec, SourceKind};
pub use error::{Error, Result};
pub use reader::{read_fullfile_entry, read_fullfile_payload, FullfileEntry};
pub use worker::{build_fullfiles, BuildSummary, FullfileJob, FullfileRequest};
