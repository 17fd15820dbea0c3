use std::path::PathBuf;

use common::prelude::{FilesError, StorageType, VirtualPath};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Access level a share grants its recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Read,
    Write,
}

/// One shared-access grant.
///
/// `owner`/`storage`/`path` address the physical item on the owner's side;
/// `principal`/`mount_path`/`name` describe where the item surfaces inside
/// the recipient's shared view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareRecord {
    pub owner: String,
    pub storage: StorageType,
    /// Owner-side full path of the shared item.
    pub path: VirtualPath,
    pub principal: String,
    /// Recipient-side folder inside the shared view; root in practice.
    #[serde(default)]
    pub mount_path: VirtualPath,
    /// Recipient-side display name of the mount.
    pub name: String,
    pub access: Access,
    /// True when the grant exists via a share chain rather than a direct
    /// share of this exact item.
    #[serde(default)]
    pub inherited: bool,
    #[serde(default)]
    pub group_id: i64,
    /// Who initiated the share.
    pub initiator: String,
}

/// JSON-file-backed shared-access records.
pub struct ShareStore {
    path: PathBuf,
    inner: RwLock<Vec<ShareRecord>>,
}

impl ShareStore {
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

    pub async fn add(&self, record: ShareRecord) -> Result<(), FilesError> {
        self.mutate(|records| {
            records.push(record);
            0
        })
        .await
        .map(|_| ())
    }

    /// All mounts visible to a recipient in one folder of the shared view.
    pub fn mounts_in(&self, principal: &str, mount_path: &VirtualPath) -> Vec<ShareRecord> {
        self.inner
            .read()
            .iter()
            .filter(|r| r.principal == principal && r.mount_path.same_location(mount_path))
            .cloned()
            .collect()
    }

    pub fn find_mount(
        &self,
        principal: &str,
        mount_path: &VirtualPath,
        name: &str,
    ) -> Option<ShareRecord> {
        self.inner
            .read()
            .iter()
            .find(|r| {
                r.principal == principal && r.mount_path.same_location(mount_path) && r.name == name
            })
            .cloned()
    }

    /// Grants attached to one owner-side item (exact path match).
    pub fn shares_on_item(
        &self,
        owner: &str,
        storage: StorageType,
        full_path: &VirtualPath,
    ) -> Vec<ShareRecord> {
        self.inner
            .read()
            .iter()
            .filter(|r| {
                r.owner == owner
                    && r.storage == storage.physical()
                    && r.path.same_location(full_path)
            })
            .cloned()
            .collect()
    }

    /// Drop every grant on an item and anything underneath it. Returns the
    /// number of removed records.
    pub async fn remove_item_shares(
        &self,
        owner: &str,
        storage: StorageType,
        full_path: &VirtualPath,
    ) -> Result<usize, FilesError> {
        let storage = storage.physical();
        self.mutate(|records| {
            let before = records.len();
            records.retain(|r| {
                !(r.owner == owner
                    && r.storage == storage
                    && r.path.is_same_or_inside(full_path))
            });
            before - records.len()
        })
        .await
    }

    /// Remove a recipient's mount record (unmounting a shared item from the
    /// recipient's view without touching the owner's bytes).
    pub async fn remove_mount(
        &self,
        principal: &str,
        mount_path: &VirtualPath,
        name: &str,
    ) -> Result<usize, FilesError> {
        self.mutate(|records| {
            let before = records.len();
            records.retain(|r| {
                !(r.principal == principal
                    && r.mount_path.same_location(mount_path)
                    && r.name == name)
            });
            before - records.len()
        })
        .await
    }

    /// Recipient-side relocation of a mount: only the record changes, the
    /// owner's bytes stay where they are.
    pub async fn update_mount_location(
        &self,
        principal: &str,
        name: &str,
        new_name: &str,
        from_mount_path: &VirtualPath,
        to_mount_path: &VirtualPath,
        group_id: i64,
    ) -> Result<bool, FilesError> {
        let changed = self
            .mutate(|records| {
                let mut changed = 0;
                for r in records.iter_mut() {
                    if r.principal == principal
                        && r.name == name
                        && r.mount_path.same_location(from_mount_path)
                        && r.group_id == group_id
                    {
                        r.name = new_name.to_string();
                        r.mount_path = to_mount_path.clone();
                        changed += 1;
                    }
                }
                changed
            })
            .await?;
        Ok(changed > 0)
    }

    /// Owner-side path rewrite after an item moved: every grant pointing at
    /// the old location (or under it, for folders) is re-pointed at the new
    /// one.
    pub async fn rewrite_item_paths(
        &self,
        owner: &str,
        from_storage: StorageType,
        old_full: &VirtualPath,
        to_storage: StorageType,
        new_full: &VirtualPath,
    ) -> Result<usize, FilesError> {
        let from_storage = from_storage.physical();
        let to_storage = to_storage.physical();
        self.mutate(|records| {
            let mut changed = 0;
            for r in records.iter_mut() {
                if r.owner != owner || r.storage != from_storage {
                    continue;
                }
                if let Some(rebased) = r.path.rebase(old_full, new_full) {
                    r.path = rebased;
                    r.storage = to_storage;
                    changed += 1;
                }
            }
            changed
        })
        .await
    }

    async fn mutate(
        &self,
        apply: impl FnOnce(&mut Vec<ShareRecord>) -> usize,
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
