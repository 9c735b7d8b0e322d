use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use super::{FetchError, ObjectFetcher};

/// Reads objects from a directory on the local filesystem
#[derive(Debug, Clone)]
pub struct LocalObjectFetcher {
    root: PathBuf,
}

impl LocalObjectFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map an object path below the root, refusing anything that escapes it
    pub fn resolve(&self, path: &str) -> Result<PathBuf, FetchError> {
        let relative = Path::new(path.trim_start_matches('/'));
        let mut resolved = self.root.clone();
        let mut depth = 0;

        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    resolved.push(part);
                    depth += 1;
                },
                Component::CurDir => {},
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(FetchError::InvalidPath(path.to_string()));
                },
            }
        }

        if depth == 0 {
            return Err(FetchError::InvalidPath(path.to_string()));
        }
        Ok(resolved)
    }
}

#[async_trait]
impl ObjectFetcher for LocalObjectFetcher {
    async fn fetch_to(&self, path: &str, dest: &Path) -> Result<u64, FetchError> {
        let source = self.resolve(path)?;
        match tokio::fs::copy(&source, dest).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(FetchError::NotFound(path.to_string()))
            },
            Err(e) => Err(FetchError::Io(e)),
        }
    }

    fn backend_name(&self) -> &str {
        "local"
    }
}
