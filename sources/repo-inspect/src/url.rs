use crate::error::{self, Result};
use snafu::{ensure, ResultExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A resolved content base: either a local directory (`file:///...`) or an HTTP(S) origin,
/// per §6's "Inspector URL grammar".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentBase {
    File(PathBuf),
    Http(url::Url),
}

impl ContentBase {
    /// Canonical string form, used as the `<stateDir>/content` marker and for display.
    pub fn canonical(&self) -> String {
        match self {
            ContentBase::File(path) => format!("file://{}", path.display()),
            ContentBase::Http(url) => url.to_string(),
        }
    }

    /// Joins a relative path (e.g. `20/Manifest.MoM`) onto this base.
    pub fn join(&self, rel: &str) -> ContentLocation {
        match self {
            ContentBase::File(path) => ContentLocation::File(path.join(rel)),
            ContentBase::Http(url) => {
                let mut joined = url.clone();
                let mut segments = joined.path().trim_end_matches('/').to_string();
                segments.push('/');
                segments.push_str(rel);
                joined.set_path(&segments);
                ContentLocation::Http(joined)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum ContentLocation {
    File(PathBuf),
    Http(url::Url),
}

impl std::fmt::Display for ContentLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentLocation::File(path) => write!(f, "{}", path.display()),
            ContentLocation::Http(url) => write!(f, "{}", url),
        }
    }
}

/// A user-provided table mapping short aliases (e.g. `clear`) to canonical base URLs, loaded
/// from a small TOML file per §10.3. The `clear` alias is always available even with no
/// table loaded, matching §6's "the alias `clear` is built in".
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct AliasTable {
    #[serde(default)]
    alias: HashMap<String, String>,
}

const BUILTIN_CLEAR_URL: &str = "https://cdn.download.clearlinux.org/update";

impl AliasTable {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).context(error::ReadAliasTableSnafu { path })?;
        toml::from_str(&text).context(error::ParseAliasTableSnafu { path })
    }

    fn resolve_alias(&self, name: &str) -> Option<String> {
        if let Some(url) = self.alias.get(name) {
            return Some(url.clone());
        }
        if name == "clear" {
            return Some(BUILTIN_CLEAR_URL.to_string());
        }
        None
    }
}

/// Parses `<base>/<version>` per §6's grammar: `base` is `clear/<version>`, an alias entry,
/// `file:///...`, or `https?://...`; `version` is a positive decimal integer.
pub fn parse_location(spec: &str, aliases: &AliasTable) -> Result<(ContentBase, u32)> {
    let (base_part, version_part) = spec.rsplit_once('/').context_invalid(spec, "expected '<base>/<version>'")?;

    let version: u32 = version_part.parse().ok().context_invalid(
        spec,
        format!("'{}' is not a positive decimal version", version_part),
    )?;
    ensure!(
        version > 0,
        error::InvalidUrlSnafu {
            value: spec.to_string(),
            reason: "version must be a positive integer".to_string(),
        }
    );

    let resolved_base = aliases.resolve_alias(base_part).unwrap_or_else(|| base_part.to_string());
    let base = parse_base(&resolved_base)?;
    Ok((base, version))
}

/// Parses a bare base (no trailing version segment), used when a caller already has the
/// version number in hand.
pub fn parse_base(value: &str) -> Result<ContentBase> {
    if let Some(rest) = value.strip_prefix("file://") {
        return Ok(ContentBase::File(PathBuf::from(rest)));
    }
    if value.starts_with("http://") || value.starts_with("https://") {
        let parsed = url::Url::parse(value).map_err(|e| error::Error::InvalidBase {
            value: value.to_string(),
            reason: e.to_string(),
        })?;
        return Ok(ContentBase::Http(parsed));
    }
    error::InvalidBaseSnafu {
        value: value.to_string(),
        reason: "base must start with 'file://' or 'http(s)://'".to_string(),
    }
    .fail()
}

/// Small helper so `parse_location` can turn an `Option`/parse failure into an
/// [`error::Error::InvalidUrl`] without repeating the spec string at every call site.
trait ContextInvalid<T> {
    fn context_invalid(self, spec: &str, reason: impl Into<String>) -> Result<T>;
}

impl<T> ContextInvalid<T> for Option<T> {
    fn context_invalid(self, spec: &str, reason: impl Into<String>) -> Result<T> {
        self.ok_or_else(|| error::Error::InvalidUrl {
            value: spec.to_string(),
            reason: reason.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_file_base_with_version() {
        let (base, version) = parse_location("file:///srv/repo/20520", &AliasTable::default()).unwrap();
        assert_eq!(version, 20520);
        assert_eq!(base, ContentBase::File(PathBuf::from("/srv/repo")));
    }

    #[test]
    fn parses_http_base_with_version() {
        let (base, version) =
            parse_location("https://example.com/update/20520", &AliasTable::default()).unwrap();
        assert_eq!(version, 20520);
        assert!(matches!(base, ContentBase::Http(_)));
    }

    #[test]
    fn clear_alias_resolves_to_builtin_url() {
        let (base, version) = parse_location("clear/20520", &AliasTable::default()).unwrap();
        assert_eq!(version, 20520);
        assert_eq!(base.canonical(), format!("{BUILTIN_CLEAR_URL}"));
    }

    #[test]
    fn user_alias_overrides_nothing_but_adds_new_names() {
        let mut table = AliasTable::default();
        table.alias.insert("internal".to_string(), "https://repo.internal/update".to_string());
        let (base, _) = parse_location("internal/5", &table).unwrap();
        assert_eq!(base.canonical(), "https://repo.internal/update");
    }

    #[test]
    fn rejects_zero_or_non_numeric_version() {
        assert!(parse_location("clear/0", &AliasTable::default()).is_err());
        assert!(parse_location("clear/notanumber", &AliasTable::default()).is_err());
    }

    #[test]
    fn rejects_unrecognized_base_scheme() {
        assert!(parse_location("ftp://example.com/5", &AliasTable::default()).is_err());
    }

    #[test]
    fn join_appends_relative_path_for_file_base() {
        let base = ContentBase::File(PathBuf::from("/srv/repo"));
        match base.join("20/Manifest.MoM") {
            ContentLocation::File(p) => assert_eq!(p, PathBuf::from("/srv/repo/20/Manifest.MoM")),
            _ => panic!("expected file location"),
        }
    }
}
