use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Local persistence for uploaded and generated photos.
///
/// Writes are best effort: the orchestrator logs a failed write and moves on.
#[async_trait]
pub trait ImageCache: Send + Sync {
    /// Store `bytes` under `file_name`, returning where they ended up.
    async fn save(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, CacheError>;
}

/// Writes files into a single directory on disk.
pub struct FsImageCache {
    dir: PathBuf,
}

impl FsImageCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ImageCache for FsImageCache {
    async fn save(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, CacheError> {
        if file_name.contains(['/', '\\']) || file_name.starts_with('.') {
            return Err(CacheError::InvalidName(file_name.to_string()));
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(file_name);
        tokio::fs::write(&path, bytes).await?;

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "Image cached");
        Ok(path)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Refusing to cache under name {0:?}")]
    InvalidName(String),
}
