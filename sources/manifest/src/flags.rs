use crate::error::{self, Result};
use snafu::ensure;
use std::fmt;

/// What kind of filesystem entry a [`crate::FileRecord`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Unset,
    Regular,
    Directory,
    Symlink,
    /// A bundle manifest, as referenced from `Manifest.MoM`.
    Manifest,
}

impl FileType {
    fn to_char(self) -> char {
        match self {
            FileType::Unset => '.',
            FileType::Regular => 'F',
            FileType::Directory => 'D',
            FileType::Symlink => 'L',
            FileType::Manifest => 'M',
        }
    }

    fn from_char(c: char) -> Option<Self> {
        match c {
            '.' => Some(FileType::Unset),
            'F' => Some(FileType::Regular),
            'D' => Some(FileType::Directory),
            'L' => Some(FileType::Symlink),
            'M' => Some(FileType::Manifest),
            _ => None,
        }
    }
}

/// Whether a file is present, deleted, or deliberately absent at install time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FileStatus {
    /// Present. Ranked lowest: deleted and ghosted both dominate it when merging statuses
    /// across included bundles (see [`FileStatus::dominant`]).
    Present,
    /// Tracked-absent, e.g. state files under `/var`.
    Ghosted,
    /// Removed at this version.
    Deleted,
}

impl FileStatus {
    fn to_char(self) -> char {
        match self {
            FileStatus::Present => '.',
            FileStatus::Deleted => 'd',
            FileStatus::Ghosted => 'g',
        }
    }

    fn from_char(c: char) -> Option<Self> {
        match c {
            '.' => Some(FileStatus::Present),
            'd' => Some(FileStatus::Deleted),
            'g' => Some(FileStatus::Ghosted),
            _ => None,
        }
    }

    /// The more "absent" of two statuses: deleted dominates ghosted dominates present.
    pub fn dominant(self, other: Self) -> Self {
        std::cmp::max(self, other)
    }
}

/// Additional classification applied by the bundle chroot scanner based on path prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileModifier {
    None,
    Config,
    State,
    Boot,
}

impl FileModifier {
    fn to_char(self) -> char {
        match self {
            FileModifier::None => '.',
            FileModifier::Config => 'C',
            FileModifier::State => 's',
            FileModifier::Boot => 'b',
        }
    }

    fn from_char(c: char) -> Option<Self> {
        match c {
            '.' => Some(FileModifier::None),
            'C' => Some(FileModifier::Config),
            's' => Some(FileModifier::State),
            'b' => Some(FileModifier::Boot),
            _ => None,
        }
    }
}

/// Whether this record's content replaces a deleted peer under a different name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRename {
    None,
    Renamed,
}

impl FileRename {
    fn to_char(self) -> char {
        match self {
            FileRename::None => '.',
            FileRename::Renamed => 'r',
        }
    }

    fn from_char(c: char) -> Option<Self> {
        match c {
            '.' => Some(FileRename::None),
            'r' => Some(FileRename::Renamed),
            _ => None,
        }
    }
}

/// The four-character `TYPE STATUS MODIFIER RENAME` flag quartet that precedes every body
/// line in a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flags {
    pub file_type: FileType,
    pub status: FileStatus,
    pub modifier: FileModifier,
    pub rename: FileRename,
}

impl Flags {
    pub fn present(file_type: FileType) -> Self {
        Flags {
            file_type,
            status: FileStatus::Present,
            modifier: FileModifier::None,
            rename: FileRename::None,
        }
    }

    pub fn is_present(&self) -> bool {
        self.status == FileStatus::Present
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}",
            self.file_type.to_char(),
            self.status.to_char(),
            self.modifier.to_char(),
            self.rename.to_char()
        )
    }
}

/// Parses a four-character flag quartet, e.g. `F.C.`.
pub fn parse_flags(s: &str) -> Result<Flags> {
    let chars: Vec<char> = s.chars().collect();
    ensure!(
        chars.len() == 4,
        error::BadHeaderSnafu {
            key: "flags",
            reason: format!("expected 4 characters, got '{}'", s),
        }
    );
    let file_type = FileType::from_char(chars[0]).ok_or_else(|| error::Error::BadHeader {
        key: "flags".into(),
        reason: format!("invalid TYPE character '{}'", chars[0]),
    })?;
    let status = FileStatus::from_char(chars[1]).ok_or_else(|| error::Error::BadHeader {
        key: "flags".into(),
        reason: format!("invalid STATUS character '{}'", chars[1]),
    })?;
    let modifier = FileModifier::from_char(chars[2]).ok_or_else(|| error::Error::BadHeader {
        key: "flags".into(),
        reason: format!("invalid MODIFIER character '{}'", chars[2]),
    })?;
    let rename = FileRename::from_char(chars[3]).ok_or_else(|| error::Error::BadHeader {
        key: "flags".into(),
        reason: format!("invalid RENAME character '{}'", chars[3]),
    })?;

    Ok(Flags {
        file_type,
        status,
        modifier,
        rename,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_every_combination() {
        let types = [
            FileType::Unset,
            FileType::Regular,
            FileType::Directory,
            FileType::Symlink,
            FileType::Manifest,
        ];
        let statuses = [FileStatus::Present, FileStatus::Deleted, FileStatus::Ghosted];
        let modifiers = [
            FileModifier::None,
            FileModifier::Config,
            FileModifier::State,
            FileModifier::Boot,
        ];
        let renames = [FileRename::None, FileRename::Renamed];

        for &file_type in &types {
            for &status in &statuses {
                for &modifier in &modifiers {
                    for &rename in &renames {
                        let flags = Flags {
                            file_type,
                            status,
                            modifier,
                            rename,
                        };
                        let s = flags.to_string();
                        let parsed = parse_flags(&s).unwrap();
                        assert_eq!(parsed.file_type, flags.file_type);
                        assert_eq!(parsed.status, flags.status);
                        assert_eq!(parsed.modifier, flags.modifier);
                        assert_eq!(parsed.rename, flags.rename);
                    }
                }
            }
        }
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(parse_flags("F.C").is_err());
        assert!(parse_flags("F.C..").is_err());
    }

    #[test]
    fn rejects_unknown_chars() {
        assert!(parse_flags("X...").is_err());
    }

    #[test]
    fn status_dominance_orders_deleted_over_ghosted_over_present() {
        assert_eq!(
            FileStatus::Present.dominant(FileStatus::Ghosted),
            FileStatus::Ghosted
        );
        assert_eq!(
            FileStatus::Ghosted.dominant(FileStatus::Deleted),
            FileStatus::Deleted
        );
        assert_eq!(
            FileStatus::Present.dominant(FileStatus::Deleted),
            FileStatus::Deleted
        );
    }
}
