//! Access to schema content: local files and remote URLs
//!
//! The resolver never touches the file system or the network directly; it goes
//! through a [`ResourceAccess`] supplied when the validator is built. Production code
//! uses [`FileSystemResources`], tests and embedders with bundled schemas use
//! [`InMemoryResources`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Result, ValidationError};
use crate::http_client::AsyncHttpClient;

/// Read-only access to local and remote resources.
///
/// Implementations must be callable from many validations at once.
#[async_trait]
pub trait ResourceAccess: Send + Sync {
    /// Read a local file; `Ok(None)` when it does not exist
    async fn read_local(&self, path: &Path) -> Result<Option<Vec<u8>>>;

    /// Fetch a remote URL
    async fn fetch_remote(&self, url: &str) -> Result<Vec<u8>>;
}

#[async_trait]
impl<T: ResourceAccess + ?Sized> ResourceAccess for Arc<T> {
    async fn read_local(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        (**self).read_local(path).await
    }

    async fn fetch_remote(&self, url: &str) -> Result<Vec<u8>> {
        (**self).fetch_remote(url).await
    }
}

/// Local files through tokio, remote URLs through an optional HTTP client.
///
/// Without a client every remote fetch fails with
/// [`ValidationError::NetworkDisabled`].
#[derive(Debug, Clone, Default)]
pub struct FileSystemResources {
    http_client: Option<AsyncHttpClient>,
}

impl FileSystemResources {
    /// Local files only
    pub fn offline() -> Self {
        Self { http_client: None }
    }

    pub fn with_http_client(http_client: AsyncHttpClient) -> Self {
        Self {
            http_client: Some(http_client),
        }
    }
}

#[async_trait]
impl ResourceAccess for FileSystemResources {
    async fn read_local(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ValidationError::Io(e)),
        }
    }

    async fn fetch_remote(&self, url: &str) -> Result<Vec<u8>> {
        match &self.http_client {
            Some(client) => client.download_schema(url).await,
            None => Err(ValidationError::NetworkDisabled {
                url: url.to_string(),
            }),
        }
    }
}

/// An in-memory environment of files and remote URLs.
///
/// Unknown URLs behave like an unreachable network.
#[derive(Debug, Clone, Default)]
pub struct InMemoryResources {
    files: HashMap<PathBuf, Arc<Vec<u8>>>,
    remote: HashMap<String, Arc<Vec<u8>>>,
}

impl InMemoryResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) -> Self {
        self.files.insert(path.into(), Arc::new(content.into()));
        self
    }

    pub fn with_remote(mut self, url: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.remote.insert(url.into(), Arc::new(content.into()));
        self
    }

    /// Content of a file, as a document would be read by a caller
    pub fn file(&self, path: impl AsRef<Path>) -> Option<&[u8]> {
        self.files.get(path.as_ref()).map(|bytes| bytes.as_slice())
    }
}

#[async_trait]
impl ResourceAccess for InMemoryResources {
    async fn read_local(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        Ok(self.files.get(path).map(|bytes| bytes.as_ref().clone()))
    }

    async fn fetch_remote(&self, url: &str) -> Result<Vec<u8>> {
        self.remote
            .get(url)
            .map(|bytes| bytes.as_ref().clone())
            .ok_or_else(|| ValidationError::SchemaNotFound {
                location: url.to_string(),
            })
    }
}
