use std::collections::BTreeMap;
use std::path::PathBuf;

use common::hash::hash_id;
use common::prelude::{FilesError, StorageType, VirtualPath};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Payload behind a public-link hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicLinkRecord {
    pub owner: String,
    pub storage: StorageType,
    /// Containing folder of the published item.
    pub path: VirtualPath,
    pub name: String,
    pub size: u64,
    pub is_folder: bool,
}

/// Hash-keyed registry of public links.
///
/// A link's hash is a pure function of (owner, type, path, name) at creation
/// time. Path-changing operations must migrate entries explicitly; the
/// registry offers [`migrate`](LinkRegistry::migrate) and
/// [`migrate_subtree`](LinkRegistry::migrate_subtree) for that.
pub struct LinkRegistry {
    path: PathBuf,
    inner: RwLock<BTreeMap<String, PublicLinkRecord>>,
}

/// Turn a registry hash into the opaque link string handed to callers.
pub fn link_string(hash: &str) -> String {
    format!("?/files-pub/{}/list", hash)
}

impl LinkRegistry {
    pub async fn open(path: PathBuf) -> Result<Self, FilesError> {
        let inner = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            path,
            inner: RwLock::new(inner),
        })
    }

    /// Register a public link, returning the link string. Idempotent: an
    /// existing record with the same hash is returned unchanged.
    pub async fn create(
        &self,
        owner: &str,
        storage: StorageType,
        path: &VirtualPath,
        name: &str,
        size: u64,
        is_folder: bool,
    ) -> Result<String, FilesError> {
        let hash = hash_id(owner, storage, path, name);
        {
            let inner = self.inner.read();
            if inner.contains_key(&hash) {
                return Ok(link_string(&hash));
            }
        }
        let record = PublicLinkRecord {
            owner: owner.to_string(),
            storage,
            path: path.clone(),
            name: name.to_string(),
            size,
            is_folder,
        };
        self.mutate(|links| {
            links.insert(hash.clone(), record);
        })
        .await?;
        tracing::debug!(owner, %path, name, hash, "registered public link");
        Ok(link_string(&hash))
    }

    /// Remove a link by recomputed hash. Deleting a link that does not exist
    /// is a no-op success.
    pub async fn delete(
        &self,
        owner: &str,
        storage: StorageType,
        path: &VirtualPath,
        name: &str,
    ) -> Result<bool, FilesError> {
        let hash = hash_id(owner, storage, path, name);
        self.mutate(|links| {
            links.remove(&hash);
        })
        .await?;
        Ok(true)
    }

    pub fn record_for_hash(&self, hash: &str) -> Option<PublicLinkRecord> {
        self.inner.read().get(hash).cloned()
    }

    pub fn is_published(
        &self,
        owner: &str,
        storage: StorageType,
        path: &VirtualPath,
        name: &str,
    ) -> bool {
        let hash = hash_id(owner, storage, path, name);
        self.inner.read().contains_key(&hash)
    }

    /// Re-key one entry after its item moved or was renamed. No-op when no
    /// link exists at the old location.
    pub async fn migrate(
        &self,
        owner: &str,
        from_storage: StorageType,
        from_path: &VirtualPath,
        from_name: &str,
        to_storage: StorageType,
        to_path: &VirtualPath,
        to_name: &str,
    ) -> Result<bool, FilesError> {
        let old_hash = hash_id(owner, from_storage, from_path, from_name);
        let new_hash = hash_id(owner, to_storage, to_path, to_name);
        let migrated = self
            .mutate_counted(|links| {
                if let Some(mut record) = links.remove(&old_hash) {
                    record.storage = to_storage;
                    record.path = to_path.clone();
                    record.name = to_name.to_string();
                    links.insert(new_hash.clone(), record);
                    1
                } else {
                    0
                }
            })
            .await?;
        if migrated > 0 {
            tracing::debug!(owner, from = %from_path, to = %to_path, "migrated public link");
        }
        Ok(migrated > 0)
    }

    /// Re-key every entry beneath a moved or renamed folder.
    pub async fn migrate_subtree(
        &self,
        owner: &str,
        from_storage: StorageType,
        old_dir: &VirtualPath,
        to_storage: StorageType,
        new_dir: &VirtualPath,
    ) -> Result<usize, FilesError> {
        self.mutate_counted(|links| {
            let stale: Vec<String> = links
                .iter()
                .filter(|(_, r)| {
                    r.owner == owner
                        && r.storage == from_storage
                        && r.path.is_same_or_inside(old_dir)
                })
                .map(|(hash, _)| hash.clone())
                .collect();
            let mut moved = 0;
            for hash in stale {
                if let Some(mut record) = links.remove(&hash) {
                    if let Some(rebased) = record.path.rebase(old_dir, new_dir) {
                        record.path = rebased;
                        record.storage = to_storage;
                        let new_hash =
                            hash_id(&record.owner, record.storage, &record.path, &record.name);
                        links.insert(new_hash, record);
                        moved += 1;
                    }
                }
            }
            moved
        })
        .await
    }

    /// Drop every entry beneath a permanently deleted folder.
    pub async fn remove_subtree(
        &self,
        owner: &str,
        storage: StorageType,
        dir: &VirtualPath,
    ) -> Result<usize, FilesError> {
        self.mutate_counted(|links| {
            let before = links.len();
            links.retain(|_, r| {
                !(r.owner == owner && r.storage == storage && r.path.is_same_or_inside(dir))
            });
            before - links.len()
        })
        .await
    }

    async fn mutate(
        &self,
        apply: impl FnOnce(&mut BTreeMap<String, PublicLinkRecord>),
    ) -> Result<(), FilesError> {
        self.mutate_counted(|links| {
            apply(links);
            0
        })
        .await
        .map(|_| ())
    }

    async fn mutate_counted(
        &self,
        apply: impl FnOnce(&mut BTreeMap<String, PublicLinkRecord>) -> usize,
    ) -> Result<usize, FilesError> {
        let (count, bytes) = {
            let mut inner = self.inner.write();
            let count = apply(&mut inner);
            (count, serde_json::to_vec_pretty(&*inner)?)
        };
        tokio::fs::write(&self.path, bytes).await?;
        Ok(count)
    }
}
