/*!
The manifest data model and text codec for the update repository engine.

A [`Manifest`] is a sorted list of [`FileRecord`]s plus a [`Header`]; [`codec::parse`] and
[`codec::emit`] convert between that in-memory form and the tab-separated wire format
described by the grammar in the manifest format specification. [`flags`] models the
four-character `TYPE STATUS MODIFIER RENAME` quartet that precedes every body line.

This crate owns the data model only: scanning chroots (bundle-scan), diffing versions
(repo-build), and fetching manifests over HTTP (repo-inspect) all build on top of it.
*/

pub mod codec;
pub mod error;
pub mod file_record;
pub mod flags;
pub mod header;
#[allow(clippy::module_inception)]
mod manifest;

pub use codec::{emit, parse, read, write};
pub use error::{Error, Result};
pub use file_record::{
    FileInfo, FileRecord, RenameCandidate, RenamePeer, DEFAULT_RENAME_THRESHOLD,
};
pub use flags::{parse_flags, FileModifier, FileRename, FileStatus, FileType, Flags};
pub use header::Header;
pub use manifest::Manifest;
