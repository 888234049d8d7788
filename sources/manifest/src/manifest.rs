use crate::error::{self, Result};
use crate::file_record::FileRecord;
use crate::header::Header;
use snafu::ensure;

/// A parsed manifest: header fields plus a sorted body of file records.
///
/// `name` is bookkeeping local to this engine (which bundle, or the literal `MoM`/`full`,
/// this manifest represents); it is never written to or read from the wire format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub name: String,
    pub header: Header,
    pub files: Vec<FileRecord>,
}

impl Manifest {
    pub fn new(name: impl Into<String>, header: Header, mut files: Vec<FileRecord>) -> Self {
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Manifest {
            name: name.into(),
            header,
            files,
        }
    }

    pub fn find(&self, name: &str) -> Option<&FileRecord> {
        // Body is kept sorted by name, but binary_search needs the comparator to match
        // exactly; a linear scan avoids subtle bugs if a caller mutates `files` directly.
        self.files.iter().find(|f| f.name == name)
    }

    /// Checks the invariants from §3 that can be verified from this manifest alone
    /// (invariants 5-7, which depend on sibling manifests or the published file store,
    /// are the version builder's responsibility).
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.header.version > 0,
            error::InvariantSnafu {
                reason: "version must be > 0".to_string(),
            }
        );
        ensure!(
            self.header.version >= self.header.previous,
            error::InvariantSnafu {
                reason: "version must be >= previous".to_string(),
            }
        );
        ensure!(
            self.header.filecount > 0,
            error::InvariantSnafu {
                reason: "filecount must be > 0".to_string(),
            }
        );
        ensure!(
            self.header.filecount as usize == self.files.len(),
            error::InvariantSnafu {
                reason: format!(
                    "filecount {} does not match body length {}",
                    self.header.filecount,
                    self.files.len()
                ),
            }
        );
        ensure!(
            self.header.contentsize > 0,
            error::InvariantSnafu {
                reason: "contentsize must be > 0".to_string(),
            }
        );
        ensure!(
            self.header.timestamp > 0,
            error::InvariantSnafu {
                reason: "timestamp must be > 0".to_string(),
            }
        );

        for window in self.files.windows(2) {
            ensure!(
                window[0].name < window[1].name,
                error::InvariantSnafu {
                    reason: format!(
                        "body is not strictly ascending by name: '{}' then '{}'",
                        window[0].name, window[1].name
                    ),
                }
            );
        }

        Ok(())
    }
}
