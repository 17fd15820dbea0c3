use std::path::PathBuf;

use common::prelude::FilesError;

/// Cache of rendered thumbnails keyed by item identity hash.
///
/// Thumbnail generation is a collaborator's job; the engine only needs to
/// evict stale entries when the underlying item goes away.
pub struct ThumbnailCache {
    dir: PathBuf,
}

impl ThumbnailCache {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn path_for(&self, hash: &str) -> PathBuf {
        self.dir.join(format!("{}.thumb", hash))
    }

    pub async fn put(&self, hash: &str, bytes: &[u8]) -> Result<(), FilesError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.path_for(hash), bytes).await?;
        Ok(())
    }

    pub async fn contains(&self, hash: &str) -> bool {
        tokio::fs::metadata(self.path_for(hash)).await.is_ok()
    }

    /// Drop a cached thumbnail. Missing entries are fine.
    pub async fn evict(&self, hash: &str) -> Result<(), FilesError> {
        match tokio::fs::remove_file(self.path_for(hash)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
