use crate::error::{self, Result};
use crate::file_record::FileRecord;
use crate::flags::{self, Flags};
use crate::header::Header;
use crate::manifest::Manifest;
use content_hash::{Hash, HASH_HEX_LEN};
use snafu::{ensure, OptionExt, ResultExt};
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

/// Header keys, in the order they are emitted. `includes:` may repeat; the rest appear
/// exactly once.
const KEY_MANIFEST: &str = "MANIFEST";
const KEY_VERSION: &str = "version:";
const KEY_PREVIOUS: &str = "previous:";
const KEY_FILECOUNT: &str = "filecount:";
const KEY_TIMESTAMP: &str = "timestamp:";
const KEY_CONTENTSIZE: &str = "contentsize:";
const KEY_INCLUDES: &str = "includes:";

/// Parses a manifest's textual form, as emitted by [`emit`].
///
/// `name` is not part of the wire format; it is the caller's label for the manifest
/// (the bundle name, or the literal `MoM`/`full`).
pub fn parse(name: impl Into<String>, text: &str) -> Result<Manifest> {
    let mut lines = text.lines().enumerate();

    let mut format = None;
    let mut version = None;
    let mut previous = None;
    let mut filecount = None;
    let mut timestamp = None;
    let mut contentsize = None;
    let mut includes = Vec::new();
    let mut saw_blank = false;

    for (idx, line) in &mut lines {
        let lineno = idx + 1;
        if line.is_empty() {
            saw_blank = true;
            break;
        }
        let (key, value) = split_header_line(lineno, line)?;
        match key {
            KEY_MANIFEST => {
                let parsed = value
                    .parse::<u32>()
                    .ok()
                    .context(error::BadHeaderSnafu {
                        key: KEY_MANIFEST,
                        reason: format!("not a valid format integer: '{}'", value),
                    })?;
                ensure!(
                    format.replace(parsed).is_none(),
                    error::BadHeaderSnafu {
                        key: KEY_MANIFEST,
                        reason: "duplicate MANIFEST header",
                    }
                );
            }
            KEY_VERSION => set_once(&mut version, KEY_VERSION, value)?,
            KEY_PREVIOUS => set_once(&mut previous, KEY_PREVIOUS, value)?,
            KEY_FILECOUNT => set_once(&mut filecount, KEY_FILECOUNT, value)?,
            KEY_TIMESTAMP => set_once(&mut timestamp, KEY_TIMESTAMP, value)?,
            KEY_CONTENTSIZE => set_once(&mut contentsize, KEY_CONTENTSIZE, value)?,
            KEY_INCLUDES => includes.push(value.to_string()),
            _ => {
                // Unknown header keys are ignored for forward compatibility.
                log::debug!("ignoring unknown manifest header key '{}'", key);
            }
        }
    }

    ensure!(
        saw_blank,
        error::ParseSnafu {
            line: lines.clone().next().map(|(i, _)| i + 1).unwrap_or(0),
            reason: "missing blank line between header and body".to_string(),
        }
    );

    let header = Header {
        format: format.context(error::BadHeaderSnafu {
            key: KEY_MANIFEST,
            reason: "missing MANIFEST header",
        })?,
        version: version.context(error::BadHeaderSnafu {
            key: KEY_VERSION,
            reason: "missing version",
        })?,
        previous: previous.context(error::BadHeaderSnafu {
            key: KEY_PREVIOUS,
            reason: "missing previous",
        })?,
        filecount: filecount.context(error::BadHeaderSnafu {
            key: KEY_FILECOUNT,
            reason: "missing filecount",
        })?,
        timestamp: timestamp.context(error::BadHeaderSnafu {
            key: KEY_TIMESTAMP,
            reason: "missing timestamp",
        })?,
        contentsize: contentsize.context(error::BadHeaderSnafu {
            key: KEY_CONTENTSIZE,
            reason: "missing contentsize",
        })?,
        includes,
    };

    let mut files = Vec::new();
    let mut saw_second_blank = false;
    for (idx, line) in lines {
        let lineno = idx + 1;
        if line.is_empty() {
            ensure!(
                !saw_second_blank,
                error::ParseSnafu {
                    line: lineno,
                    reason: "unexpected repeated blank line in body".to_string(),
                }
            );
            saw_second_blank = true;
            continue;
        }
        ensure!(
            !saw_second_blank,
            error::ParseSnafu {
                line: lineno,
                reason: "body line after a second blank line".to_string(),
            }
        );
        files.push(parse_body_line(lineno, line)?);
    }

    let manifest = Manifest {
        name: name.into(),
        header,
        files,
    };
    manifest.validate()?;
    Ok(manifest)
}

fn set_once(slot: &mut Option<u64>, key: &'static str, value: &str) -> Result<()> {
    let parsed = value.parse::<u64>().ok().context(error::BadHeaderSnafu {
        key,
        reason: format!("not a valid integer: '{}'", value),
    })?;
    ensure!(
        slot.replace(parsed).is_none(),
        error::BadHeaderSnafu {
            key,
            reason: "duplicate header key",
        }
    );
    Ok(())
}

fn split_header_line(lineno: usize, line: &str) -> Result<(&str, &str)> {
    let (key, rest) = line.split_once('\t').context(error::ParseSnafu {
        line: lineno,
        reason: format!("header line missing tab separator: '{}'", line),
    })?;
    Ok((key, rest))
}

fn parse_body_line(lineno: usize, line: &str) -> Result<FileRecord> {
    let mut parts = line.splitn(4, '\t');
    let flags_str = parts.next().context(error::ParseSnafu {
        line: lineno,
        reason: "missing flags field".to_string(),
    })?;
    let hash_str = parts.next().context(error::ParseSnafu {
        line: lineno,
        reason: "missing hash field".to_string(),
    })?;
    let version_str = parts.next().context(error::ParseSnafu {
        line: lineno,
        reason: "missing version field".to_string(),
    })?;
    let name = parts.next().context(error::ParseSnafu {
        line: lineno,
        reason: "missing name field".to_string(),
    })?;
    ensure!(
        parts.next().is_none(),
        error::ParseSnafu {
            line: lineno,
            reason: "too many tab-separated fields".to_string(),
        }
    );

    let flags = flags::parse_flags(flags_str).map_err(|e| error::Error::Parse {
        line: lineno,
        reason: e.to_string(),
    })?;

    ensure!(
        hash_str.len() == HASH_HEX_LEN,
        error::ParseSnafu {
            line: lineno,
            reason: format!("hash '{}' is not {} hex characters", hash_str, HASH_HEX_LEN),
        }
    );
    let hash = Hash::from_str(hash_str).map_err(|_| error::Error::Parse {
        line: lineno,
        reason: format!("invalid hash '{}'", hash_str),
    })?;

    let version = version_str.parse::<u32>().ok().context(error::ParseSnafu {
        line: lineno,
        reason: format!("invalid version '{}'", version_str),
    })?;

    Ok(FileRecord::new(name, hash, version, flags))
}

/// Renders `manifest` to its textual form, sorting the body and validating invariants first.
pub fn emit(manifest: &Manifest) -> Result<String> {
    manifest.validate()?;

    let mut out = String::new();
    out.push_str(&format!("{}\t{}\n", KEY_MANIFEST, manifest.header.format));
    out.push_str(&format!("{}\t{}\n", KEY_VERSION, manifest.header.version));
    out.push_str(&format!("{}\t{}\n", KEY_PREVIOUS, manifest.header.previous));
    out.push_str(&format!(
        "{}\t{}\n",
        KEY_FILECOUNT, manifest.header.filecount
    ));
    out.push_str(&format!(
        "{}\t{}\n",
        KEY_TIMESTAMP, manifest.header.timestamp
    ));
    out.push_str(&format!(
        "{}\t{}\n",
        KEY_CONTENTSIZE, manifest.header.contentsize
    ));
    for include in &manifest.header.includes {
        out.push_str(&format!("{}\t{}\n", KEY_INCLUDES, include));
    }
    out.push('\n');

    let mut sorted = manifest.files.clone();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));
    for file in &sorted {
        out.push_str(&format_body_line(file));
    }

    Ok(out)
}

fn format_body_line(file: &FileRecord) -> String {
    format!(
        "{}\t{}\t{}\t{}\n",
        file.flags, file.hash, file.version, file.name
    )
}

/// Reads and parses the manifest at `path`.
pub fn read(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Manifest> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).context(error::ManifestReadSnafu { path })?;
    parse(name, &text)
}

/// Writes `manifest` to `path` atomically: write to a tempfile in the same directory,
/// fsync, then rename into place.
pub fn write(manifest: &Manifest, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let text = emit(manifest)?;

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).context(error::ManifestWriteSnafu { path })?;
    tmp.write_all(text.as_bytes())
        .context(error::ManifestWriteSnafu { path })?;
    tmp.as_file()
        .sync_all()
        .context(error::ManifestWriteSnafu { path })?;
    tmp.persist(path)
        .context(error::ManifestPersistSnafu { path })?;
    Ok(())
}

/// Checks that `flags` satisfies the enumerated §3 flag grammar; a thin re-export used by
/// callers that only have a flag string on hand (e.g. the inspector).
pub fn validate_flag_string(s: &str) -> Result<Flags> {
    flags::parse_flags(s)
}
