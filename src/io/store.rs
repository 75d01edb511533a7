use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::IoError;

/// Trait for fetching the raw bytes of a source image.
///
/// This abstraction lets the raster backend work with different storage
/// backends (local disk, S3, in-memory fixtures) without knowing which.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Fetch the full contents of the object named by `key`.
    async fn fetch(&self, key: &str) -> Result<Bytes, IoError>;

    /// A short description of where sources come from, for startup logs.
    fn describe(&self) -> String;
}

/// Source store backed by a local directory.
///
/// Keys are interpreted as paths relative to the root. Absolute keys and keys
/// that step outside the root are reported as not found.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Create a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to a path under the root, refusing traversal.
    fn resolve(&self, key: &str) -> Option<PathBuf> {
        let relative = Path::new(key);
        if key.is_empty() {
            return None;
        }

        let confined = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !confined {
            return None;
        }

        Some(self.root.join(relative))
    }
}

#[async_trait]
impl SourceStore for LocalStore {
    async fn fetch(&self, key: &str) -> Result<Bytes, IoError> {
        let path = self
            .resolve(key)
            .ok_or_else(|| IoError::NotFound(key.to_string()))?;

        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(IoError::NotFound(key.to_string()))
            }
            Err(e) => Err(IoError::Local(format!("{}: {}", path.display(), e))),
        }
    }

    fn describe(&self) -> String {
        format!("file://{}", self.root.display())
    }
}
