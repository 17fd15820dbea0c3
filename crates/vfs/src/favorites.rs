use std::path::PathBuf;

use common::prelude::{FilesError, StorageType, VirtualPath};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// A favorite reference: one user bookmarking one item by location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FavoriteRecord {
    pub user: String,
    pub storage: StorageType,
    pub full_path: VirtualPath,
}

/// JSON-file-backed favorite references.
pub struct FavoriteStore {
    path: PathBuf,
    inner: RwLock<Vec<FavoriteRecord>>,
}

impl FavoriteStore {
    pub async fn open(path: PathBuf) -> Result<Self, FilesError> {
        let inner = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            path,
            inner: RwLock::new(inner),
        })
    }

    pub fn list_for(&self, user: &str) -> Vec<FavoriteRecord> {
        self.inner
            .read()
            .iter()
            .filter(|r| r.user == user)
            .cloned()
            .collect()
    }

    pub async fn add(
        &self,
        user: &str,
        storage: StorageType,
        full_path: VirtualPath,
    ) -> Result<(), FilesError> {
        self.mutate(|records| {
            if !records.iter().any(|r| {
                r.user == user && r.storage == storage && r.full_path.same_location(&full_path)
            }) {
                records.push(FavoriteRecord {
                    user: user.to_string(),
                    storage,
                    full_path: full_path.clone(),
                });
            }
        })
        .await
    }

    /// Drop references to an item and anything underneath it.
    pub async fn remove_under(
        &self,
        user: &str,
        storage: StorageType,
        full_path: &VirtualPath,
    ) -> Result<(), FilesError> {
        self.mutate(|records| {
            records.retain(|r| {
                !(r.user == user
                    && r.storage == storage
                    && r.full_path.is_same_or_inside(full_path))
            });
        })
        .await
    }

    /// Re-point references after an item (or subtree) moved.
    pub async fn rewrite_paths(
        &self,
        user: &str,
        from_storage: StorageType,
        old_full: &VirtualPath,
        to_storage: StorageType,
        new_full: &VirtualPath,
    ) -> Result<(), FilesError> {
        self.mutate(|records| {
            for r in records.iter_mut() {
                if r.user != user || r.storage != from_storage {
                    continue;
                }
                if let Some(rebased) = r.full_path.rebase(old_full, new_full) {
                    r.full_path = rebased;
                    r.storage = to_storage;
                }
            }
        })
        .await
    }

    async fn mutate(
        &self,
        apply: impl FnOnce(&mut Vec<FavoriteRecord>),
    ) -> Result<(), FilesError> {
        let bytes = {
            let mut inner = self.inner.write();
            apply(&mut inner);
            serde_json::to_vec_pretty(&*inner)?
        };
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}
