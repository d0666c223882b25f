//! External Resource Loading
//!
//! Fetches the documents that top-level fields may point at instead of
//! carrying their value inline. Local paths are resolved against a list of
//! search directories, `http`/`https` URIs are fetched with a blocking
//! client and a short timeout.
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//! use swflow::decode::loader::{DefaultLoader, ResourceLoader};
//!
//! let loader = DefaultLoader::default();
//! let resource = loader.load("functions.json", &[PathBuf::from("/srv/workflows")]).unwrap();
//! println!("{} bytes", resource.bytes.len());
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, warn};
use once_cell::sync::OnceCell;
use url::Url;

use super::document::DocumentFormat;
use crate::error::LoadError;

/// Default timeout for HTTP fetches.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(1);

/// Raw bytes of a fetched resource, with the format its name implies.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub bytes: Vec<u8>,
    pub format: Option<DocumentFormat>,
}

impl Resource {
    pub fn new(bytes: Vec<u8>, uri: &str) -> Self {
        Self {
            bytes,
            format: DocumentFormat::from_extension(uri),
        }
    }
}

/// Source of referenced documents.
///
/// Implementations must be shareable across threads: a single decoder may
/// be used concurrently.
pub trait ResourceLoader: Send + Sync {
    /// Loads `uri`, resolving relative paths against `search` in order.
    fn load(&self, uri: &str, search: &[PathBuf]) -> Result<Resource, LoadError>;
}

/// Where a URI points.
#[derive(Debug, PartialEq)]
enum Location {
    File(PathBuf),
    Http(Url),
}

fn classify(uri: &str) -> Result<Location, LoadError> {
    match Url::parse(uri) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(Location::Http(url)),
            "file" => url
                .to_file_path()
                .map(Location::File)
                .map_err(|_| LoadError::UnsupportedScheme(uri.to_string())),
            // A single letter is a Windows drive, not a scheme.
            scheme if scheme.len() == 1 => Ok(Location::File(PathBuf::from(uri))),
            scheme => Err(LoadError::UnsupportedScheme(scheme.to_string())),
        },
        Err(_) => Ok(Location::File(PathBuf::from(uri))),
    }
}

/// Filesystem and HTTP loader.
#[derive(Debug)]
pub struct DefaultLoader {
    timeout: Duration,
    client: OnceCell<reqwest::blocking::Client>,
}

impl Default for DefaultLoader {
    fn default() -> Self {
        Self::with_timeout(DEFAULT_HTTP_TIMEOUT)
    }
}

impl DefaultLoader {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            client: OnceCell::new(),
        }
    }

    fn client(&self) -> Result<&reqwest::blocking::Client, LoadError> {
        self.client.get_or_try_init(|| {
            reqwest::blocking::Client::builder()
                .timeout(self.timeout)
                .build()
                .map_err(|e| LoadError::Http(e.to_string()))
        })
    }

    fn fetch(&self, url: Url) -> Result<Vec<u8>, LoadError> {
        debug!("Fetching {}", url);
        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                LoadError::Timeout(self.timeout)
            } else {
                LoadError::Http(e.to_string())
            }
        };

        let response = self
            .client()?
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(map_err)?;
        let bytes = response.bytes().map_err(map_err)?;
        Ok(bytes.to_vec())
    }

    fn read(&self, path: &Path, search: &[PathBuf]) -> Result<Vec<u8>, LoadError> {
        let resolved = resolve_path(path, search)?;
        debug!("Reading {}", resolved.display());
        fs::read(&resolved).map_err(|source| LoadError::Io {
            path: resolved,
            source,
        })
    }
}

impl ResourceLoader for DefaultLoader {
    fn load(&self, uri: &str, search: &[PathBuf]) -> Result<Resource, LoadError> {
        let bytes = match classify(uri)? {
            Location::Http(url) => self.fetch(url)?,
            Location::File(path) => self.read(&path, search)?,
        };
        Ok(Resource::new(bytes, uri))
    }
}

/// Finds the first search directory containing `path`.
///
/// Absolute paths, and relative paths with no search directories, are
/// returned unchanged.
fn resolve_path(path: &Path, search: &[PathBuf]) -> Result<PathBuf, LoadError> {
    if path.is_absolute() || search.is_empty() {
        return Ok(path.to_path_buf());
    }

    search
        .iter()
        .map(|dir| dir.join(path))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| {
            warn!("{} not found in {} include paths", path.display(), search.len());
            LoadError::NotFound {
                searched: search.to_vec(),
            }
        })
}

/// In-memory loader keyed by URI.
///
/// Useful when the referenced documents are already at hand, and in tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryLoader {
    resources: HashMap<String, Vec<u8>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, uri: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.resources.insert(uri.into(), content.into());
        self
    }
}

impl ResourceLoader for MemoryLoader {
    fn load(&self, uri: &str, search: &[PathBuf]) -> Result<Resource, LoadError> {
        self.resources
            .get(uri)
            .map(|bytes| Resource::new(bytes.clone(), uri))
            .ok_or_else(|| LoadError::NotFound {
                searched: search.to_vec(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_classify() {
        assert_eq!(
            classify("functions.json").unwrap(),
            Location::File(PathBuf::from("functions.json"))
        );
        assert!(matches!(
            classify("https://example.com/f.json").unwrap(),
            Location::Http(_)
        ));
        assert_eq!(
            classify("file:///tmp/f.json").unwrap(),
            Location::File(PathBuf::from("/tmp/f.json"))
        );
        assert!(matches!(
            classify("ftp://example.com/f.json"),
            Err(LoadError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_resolve_in_second_search_dir() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let mut file = fs::File::create(second.path().join("events.yaml")).unwrap();
        writeln!(file, "events: []").unwrap();

        let search = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        let resource = DefaultLoader::default().load("events.yaml", &search).unwrap();
        assert_eq!(resource.format, Some(DocumentFormat::Yaml));
        assert_eq!(resource.bytes, b"events: []\n");
    }

    #[test]
    fn test_not_found_lists_search_dirs() {
        let dir = TempDir::new().unwrap();
        let search = vec![dir.path().to_path_buf()];
        let err = DefaultLoader::default().load("missing.json", &search).unwrap_err();
        match err {
            LoadError::NotFound { searched } => assert_eq!(searched, search),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_absolute_path_skips_search() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("retries.json");
        fs::write(&path, "{\"retries\": []}").unwrap();

        let uri = path.to_string_lossy().to_string();
        let resource = DefaultLoader::default()
            .load(&uri, &[PathBuf::from("/nonexistent")])
            .unwrap();
        assert_eq!(resource.format, Some(DocumentFormat::Json));
    }

    #[test]
    fn test_memory_loader() {
        let loader = MemoryLoader::new().with("errors.json", "{\"errors\": []}");
        assert!(loader.load("errors.json", &[]).is_ok());
        assert!(matches!(
            loader.load("other.json", &[]),
            Err(LoadError::NotFound { .. })
        ));
    }
}
