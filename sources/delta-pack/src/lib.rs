/*!
The delta / pack builder (C7): for one bundle moving from a previously published version
to a new one, decides which changed files need a binary delta and which need their full
content, then assembles the result into one `pack-<bundle>-from-<F>.tar` archive.

[`plan_pack`] implements the per-file decision of §4.7 by comparing two bundle manifests.
[`build_pack`] resolves that plan against the fullfile stores of both versions — computing
and self-verifying a rolling-checksum delta for each candidate, falling back to the
fullfile whenever the delta can't be trusted — and writes the archive atomically.
[`resolve_recent_jobs`] is the "last K versions" convenience entry point: it walks a
repository's published version directories and turns them into one job per bundle.
*/

mod builder;
mod diff;
pub mod error;
mod plan;
mod recent;

pub use builder::{build_pack, PackRequest};
pub use diff::compute_verified_delta;
pub use error::{Error, Result};
pub use plan::{plan_pack, PackMember, PlannedEntry};
pub use recent::{recent_versions, resolve_recent_jobs, RecentPackJob};
