use crate::error::{self, Result};
use serde::Deserialize;
use snafu::ResultExt;
use std::path::Path;

/// Declarative bundle definitions for one repository, read from a small TOML file at the
/// repository root. Parsing this file is CLI-layer plumbing, not the core engine's
/// concern (§1's Non-goals exclude "configuration file parsing" from the core); the core
/// only ever sees the resolved [`BundleDef`] list.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoConfig {
    /// Manifest format this repository currently publishes at.
    pub format: u32,
    #[serde(rename = "bundle", default)]
    pub bundles: Vec<BundleDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BundleDef {
    pub name: String,
    #[serde(default)]
    pub includes: Vec<String>,
}

impl RepoConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).context(error::ReadConfigSnafu { path })?;
        toml::from_str(&text).context(error::ParseConfigSnafu { path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parses_bundles_with_includes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Repo.toml");
        std::fs::write(
            &path,
            r#"
            format = 1

            [[bundle]]
            name = "os-core"

            [[bundle]]
            name = "os-core-update"
            includes = ["os-core"]
            "#,
        )
        .unwrap();

        let config = RepoConfig::load(&path).unwrap();
        assert_eq!(config.format, 1);
        assert_eq!(config.bundles.len(), 2);
        assert_eq!(config.bundles[0].name, "os-core");
        assert!(config.bundles[0].includes.is_empty());
        assert_eq!(config.bundles[1].includes, vec!["os-core".to_string()]);
    }
}
