use crate::error::{self, Result};
use crate::url::{ContentBase, ContentLocation};
use snafu::{ensure, ResultExt};
use std::time::Duration;

/// Default per-request HTTP timeout, per §5.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
/// Default retry count for transient `IO`/`External` failures, per §6/§7.
pub const DEFAULT_RETRIES: u32 = 3;

/// Fetches bytes from a [`ContentBase`], transparently handling both `file://` reads and
/// HTTP(S) GETs with retry-with-backoff. File reads are not retried: a missing or
/// unreadable local path is not a transient condition.
pub struct Transport {
    base: ContentBase,
    client: Option<reqwest::blocking::Client>,
    offline: bool,
    retries: u32,
}

impl Transport {
    pub fn new(base: ContentBase, offline: bool, retries: u32, timeout: Duration) -> Result<Self> {
        let client = match &base {
            ContentBase::Http(_) => Some(
                reqwest::blocking::Client::builder()
                    .timeout(timeout)
                    .build()
                    .map_err(|source| error::Error::HttpGet {
                        url: "<client construction>".to_string(),
                        attempts: 0,
                        source,
                    })?,
            ),
            ContentBase::File(_) => None,
        };
        Ok(Transport {
            base,
            client,
            offline,
            retries: retries.max(1),
        })
    }

    pub fn base(&self) -> &ContentBase {
        &self.base
    }

    /// Fetches `rel` (joined onto the base) as raw bytes.
    pub fn fetch_bytes(&self, rel: &str) -> Result<Vec<u8>> {
        match self.base.join(rel) {
            ContentLocation::File(path) => {
                std::fs::read(&path).context(error::ReadLocalSnafu { path })
            }
            ContentLocation::Http(url) => {
                ensure!(
                    !self.offline,
                    error::OfflineSnafu {
                        url: url.to_string(),
                    }
                );
                self.fetch_http(&url)
            }
        }
    }

    fn fetch_http(&self, url: &url::Url) -> Result<Vec<u8>> {
        let client = self
            .client
            .as_ref()
            .expect("http client is always constructed for an http content base");

        let mut last_error: Option<error::Error> = None;
        for attempt in 0..self.retries {
            match client.get(url.clone()).send() {
                Ok(resp) if resp.status().is_success() => {
                    return resp.bytes().map(|b| b.to_vec()).map_err(|source| error::Error::HttpGet {
                        url: url.to_string(),
                        attempts: attempt + 1,
                        source,
                    })
                }
                Ok(resp) => {
                    last_error = Some(error::Error::HttpStatus {
                        url: url.to_string(),
                        status: resp.status().as_u16(),
                    });
                }
                Err(source) => {
                    last_error = Some(error::Error::HttpGet {
                        url: url.to_string(),
                        attempts: attempt + 1,
                        source,
                    });
                }
            }

            if attempt + 1 < self.retries {
                let backoff = Duration::from_millis(200 * 2u64.pow(attempt));
                log::warn!("GET '{}' failed (attempt {}), retrying in {:?}", url, attempt + 1, backoff);
                std::thread::sleep(backoff);
            }
        }

        Err(last_error.expect("loop runs at least once since retries is clamped to >= 1"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn file_base_reads_local_bytes() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("20")).unwrap();
        fs::write(dir.path().join("20/Manifest.MoM"), b"hello").unwrap();

        let transport = Transport::new(
            ContentBase::File(dir.path().to_path_buf()),
            false,
            DEFAULT_RETRIES,
            DEFAULT_TIMEOUT,
        )
        .unwrap();
        let bytes = transport.fetch_bytes("20/Manifest.MoM").unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn missing_local_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let transport = Transport::new(
            ContentBase::File(dir.path().to_path_buf()),
            false,
            DEFAULT_RETRIES,
            DEFAULT_TIMEOUT,
        )
        .unwrap();
        assert!(transport.fetch_bytes("20/Manifest.MoM").is_err());
    }

    #[test]
    fn offline_mode_refuses_http_fetch() {
        let base = ContentBase::Http(url::Url::parse("https://example.com/update").unwrap());
        let transport = Transport::new(base, true, DEFAULT_RETRIES, DEFAULT_TIMEOUT).unwrap();
        let err = transport.fetch_bytes("20/Manifest.MoM").unwrap_err();
        assert!(matches!(err, error::Error::Offline { .. }));
    }
}
