use crate::error::{self, Result};
use crate::url::ContentBase;
use snafu::ResultExt;
use std::path::{Path, PathBuf};

const CONTENT_MARKER: &str = "content";

/// Implements the state-directory contract of §4.8: `<stateDir>/content` records which
/// base URL this cache belongs to. A subsequent open against a different base wipes the
/// directory's contents (but not the directory itself, which may be user-managed) before
/// proceeding.
pub struct StateDir {
    root: PathBuf,
}

impl StateDir {
    pub fn open(root: PathBuf, base: &ContentBase) -> Result<Self> {
        std::fs::create_dir_all(&root).context(error::CreateStateDirSnafu { path: root.clone() })?;

        let marker = root.join(CONTENT_MARKER);
        let canonical = base.canonical();
        match std::fs::read_to_string(&marker) {
            Ok(existing) if existing.trim() == canonical => {}
            Ok(_) => {
                log::info!(
                    "state directory '{}' was tracking a different content base, wiping cached entries",
                    root.display()
                );
                wipe_entries(&root)?;
                std::fs::write(&marker, &canonical).context(error::WipeStateDirSnafu { path: root.clone() })?;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                std::fs::write(&marker, &canonical).context(error::WipeStateDirSnafu { path: root.clone() })?;
            }
            Err(source) => return Err(error::Error::WipeStateDir { path: root, source }),
        }

        Ok(StateDir { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn version_dir(&self, version: u32) -> PathBuf {
        self.root.join(version.to_string())
    }

    pub fn staged_dir(&self) -> PathBuf {
        self.root.join("staged")
    }
}

/// Deletes every entry directly under `root` except the `content` marker, leaving the
/// directory itself (and any ACLs/mounts a user set up on it) untouched.
fn wipe_entries(root: &Path) -> Result<()> {
    let entries = std::fs::read_dir(root).context(error::WipeStateDirSnafu { path: root.to_path_buf() })?;
    for entry in entries {
        let entry = entry.context(error::WipeStateDirSnafu { path: root.to_path_buf() })?;
        if entry.file_name() == CONTENT_MARKER {
            continue;
        }
        let path = entry.path();
        let result = if path.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        result.context(error::WipeStateDirSnafu { path })?;
    }
    Ok(())
}
