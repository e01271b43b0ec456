//! Reading source documents
//!
//! Paths starting with `http://` or `https://` are remote documents and go
//! through [`HttpReader`] (with the `http` feature); everything else is a
//! file read by [`FsReader`].

use std::path::Path;
#[cfg(feature = "http")]
use std::time::Duration;

use crate::error::{Error, Result};

/// Reads the raw bytes of a source document.
///
/// Reads are blocking calls and their failures are propagated unchanged.
pub trait SourceReader: Send + Sync {
    /// Read the whole document at `path`
    fn read(&self, path: &Path) -> Result<Vec<u8>>;
}

/// Reads documents from the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsReader;

impl SourceReader for FsReader {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        std::fs::read(path).map_err(|e| {
            let err = Error::io(path.display().to_string(), e.to_string());
            if e.kind() == std::io::ErrorKind::NotFound {
                err.with_help("Check that the file exists relative to the manifest")
            } else {
                err
            }
        })
    }
}

/// Whether `path` names a document fetched over HTTP(S)
pub fn is_remote(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

/// The part of a source path that carries its file suffix. URLs drop their
/// query string and fragment.
pub(crate) fn suffix_path(path: &str) -> &str {
    if is_remote(path) {
        path.split(['?', '#']).next().unwrap_or(path)
    } else {
        path
    }
}

/// Fetches documents with a blocking HTTP GET
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct HttpReader {
    timeout: Duration,
}

#[cfg(feature = "http")]
impl Default for HttpReader {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(feature = "http")]
impl HttpReader {
    /// A reader giving up on each request after `timeout`
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[cfg(feature = "http")]
impl SourceReader for HttpReader {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let url = path
            .to_str()
            .ok_or_else(|| Error::io(path.display().to_string(), "URL is not valid UTF-8"))?;

        let config = ureq::Agent::config_builder()
            .timeout_global(Some(self.timeout))
            .build();
        let agent: ureq::Agent = config.into();

        log::debug!("fetching {}", url);
        let response = agent.get(url).call().map_err(|e| match e {
            ureq::Error::StatusCode(code) => {
                let err = Error::io(url, format!("HTTP {}", code));
                if code == 404 {
                    err.with_help("Check the URL in the manifest")
                } else {
                    err
                }
            }
            ureq::Error::Timeout(kind) => {
                Error::io(url, format!("Request timeout: {:?}", kind))
            }
            ureq::Error::Io(io_err) => Error::io(url, format!("Connection error: {}", io_err)),
            other => Error::io(url, format!("HTTP request failed: {}", other)),
        })?;

        response
            .into_body()
            .read_to_vec()
            .map_err(|e| Error::io(url, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_fs_reader_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.yaml");
        std::fs::write(&path, "key: value\n").unwrap();

        assert_eq!(FsReader.read(&path).unwrap(), b"key: value\n");
    }

    #[test]
    fn test_fs_reader_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = FsReader.read(&dir.path().join("missing.yaml")).unwrap_err();

        assert_eq!(err.kind, ErrorKind::Io);
        assert!(err.source_path.unwrap().ends_with("missing.yaml"));
        assert!(err.help.is_some());
    }

    #[test]
    fn test_is_remote() {
        assert!(is_remote("https://cfg.example/app.yaml"));
        assert!(is_remote("http://localhost:8080/app.env"));
        assert!(!is_remote("app.yaml"));
        assert!(!is_remote("/srv/https/app.yaml"));
    }

    #[test]
    fn test_suffix_path_strips_query_from_urls() {
        assert_eq!(
            suffix_path("https://cfg.example/app.json?rev=3#top"),
            "https://cfg.example/app.json"
        );
        assert_eq!(suffix_path("dir/odd?name.env"), "dir/odd?name.env");
    }
}
