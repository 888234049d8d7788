use crate::error::{self, Result};
use cancel::CancelToken;
use snafu::ResultExt;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Reads `image/LAST_VER`: the ASCII integer recording the last fully published version,
/// or `None` if this repository has never published one.
pub fn read_last_version(image_root: &Path) -> Result<Option<u32>> {
    let path = image_root.join("LAST_VER");
    match std::fs::read_to_string(&path) {
        Ok(text) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| error::Error::InvalidLastVersion { path }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(error::Error::ReadLastVersion { path, source }),
    }
}

/// Publishes the version/format pointer files described in §6, plus `image/LAST_VER`.
/// Called only after every other artifact for the version (manifests, fullfiles, packs)
/// has been written successfully, per §5's ordering guarantee and §7's recovery policy:
/// a failed build must never advance these pointers.
pub fn publish_pointers(repo_root: &Path, image_root: &Path, format: u32, version: u32) -> Result<()> {
    let www_version = repo_root.join("www").join("version");
    write_atomic(&www_version.join("latest_version"), version.to_string().as_bytes())?;
    write_atomic(
        &www_version.join(format!("format{format}")).join("latest"),
        version.to_string().as_bytes(),
    )?;
    write_atomic(&image_root.join("LAST_VER"), version.to_string().as_bytes())?;
    Ok(())
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path.parent().expect("pointer paths always have a parent");
    std::fs::create_dir_all(parent).context(error::WritePointerSnafu { path: path.to_path_buf() })?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .context(error::WritePointerSnafu { path: path.to_path_buf() })?;
    tmp.write_all(contents)
        .context(error::WritePointerSnafu { path: path.to_path_buf() })?;
    tmp.flush().context(error::WritePointerSnafu { path: path.to_path_buf() })?;
    tmp.persist(path)
        .context(error::PersistPointerSnafu { path: path.to_path_buf() })?;
    Ok(())
}

/// Invokes an external signer over `Manifest.MoM`, per §6's signing interface: the engine
/// hands off the manifest path and a certificate and does not verify the result itself.
/// Mirrors the `openssl smime -sign` invocation named in §5/§9; any other signer binary on
/// `PATH` works as long as it accepts the same three arguments and writes `<mom>.sig`.
pub fn sign_mom(mom_path: &Path, cert_path: &Path, cancel: &CancelToken) -> Result<PathBuf> {
    let tool = which::which("openssl").context(error::SignerNotFoundSnafu {
        name: "openssl".to_string(),
    })?;
    let sig_path = mom_path
        .parent()
        .map(|p| p.join("Manifest.MoM.sig"))
        .unwrap_or_else(|| mom_path.with_extension("sig"));

    let expr = duct::cmd(
        tool,
        [
            "smime",
            "-sign",
            "-in",
            &mom_path.to_string_lossy(),
            "-signer",
            &cert_path.to_string_lossy(),
            "-outform",
            "DER",
            "-out",
            &sig_path.to_string_lossy(),
            "-binary",
        ],
    )
    .stderr_capture()
    .unchecked();

    let output = cancel::run_killable(expr, "openssl smime")
        .wait(cancel)
        .context(error::SpawnSignerSnafu {
            path: mom_path.to_path_buf(),
        })?;

    if !output.status.success() {
        return error::SignerFailedSnafu {
            path: mom_path.to_path_buf(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
        .fail();
    }

    Ok(sig_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_last_ver_is_none() {
        let dir = TempDir::new().unwrap();
        assert_eq!(read_last_version(dir.path()).unwrap(), None);
    }

    #[test]
    fn publish_pointers_writes_all_three_files() {
        let dir = TempDir::new().unwrap();
        let repo_root = dir.path().join("repo");
        let image_root = repo_root.join("image");
        std::fs::create_dir_all(&image_root).unwrap();

        publish_pointers(&repo_root, &image_root, 1, 20520).unwrap();

        assert_eq!(
            std::fs::read_to_string(repo_root.join("www/version/latest_version")).unwrap(),
            "20520"
        );
        assert_eq!(
            std::fs::read_to_string(repo_root.join("www/version/format1/latest")).unwrap(),
            "20520"
        );
        assert_eq!(std::fs::read_to_string(image_root.join("LAST_VER")).unwrap(), "20520");
        assert_eq!(read_last_version(&image_root).unwrap(), Some(20520));
    }
}
