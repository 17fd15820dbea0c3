use std::collections::BTreeMap;
use std::sync::Arc;

use common::hash::hash_id;
use common::prelude::{FilesError, StorageType, VirtualPath};
use common::props::keys;
use serde_json::json;

use crate::links::LinkRegistry;
use crate::node::sidecar;
use crate::propagation::Propagation;
use crate::router::Router;
use crate::shares::ShareStore;
use crate::thumbs::ThumbnailCache;

/// Soft-delete / restore workflow over the personal backend.
///
/// Items move Active -> Trashed -> Purged; purging is terminal. With trash
/// disabled, deletes purge directly. None of the sequences below are
/// transactional: a failure mid-way can leave the original item active with
/// partial bookkeeping already done. Every step tolerates re-running, so
/// retrying a partially processed delete is safe (best effort, not atomic).
pub struct TrashManager {
    router: Arc<Router>,
    shares: Arc<ShareStore>,
    links: Arc<LinkRegistry>,
    propagation: Arc<Propagation>,
    thumbs: Arc<ThumbnailCache>,
    trash_enabled: bool,
}

impl TrashManager {
    pub fn new(
        router: Arc<Router>,
        shares: Arc<ShareStore>,
        links: Arc<LinkRegistry>,
        propagation: Arc<Propagation>,
        thumbs: Arc<ThumbnailCache>,
        trash_enabled: bool,
    ) -> Self {
        Self {
            router,
            shares,
            links,
            propagation,
            thumbs,
            trash_enabled,
        }
    }

    /// Delete one item under the trash policy: soft-delete where the trash
    /// applies, permanent delete otherwise.
    pub async fn delete(
        &self,
        user: &str,
        storage: StorageType,
        path: &VirtualPath,
        name: &str,
    ) -> Result<(), FilesError> {
        let node = self
            .router
            .child(user, storage, path, name)
            .await?
            .ok_or_else(|| FilesError::NotFound(path.join(name)))?;

        if node.is_shared() {
            if !node.is_inherited() {
                return Err(FilesError::CantDeleteSharedItem);
            }
            // an inherited mount is removed from the recipient's view only;
            // the owner's bytes are not ours to delete
            if storage == StorageType::Shared
                && self.shares.find_mount(user, path, name).is_some()
            {
                self.shares.remove_mount(user, path, name).await?;
                return Ok(());
            }
        }

        // Soft-delete covers the personal backend (and its virtual views)
        // only; items already under the trash root purge on a second delete.
        let soft = self.trash_enabled
            && storage != StorageType::Trash
            && storage.physical() == StorageType::Personal
            && !self.router.is_in_trash(path);
        if soft {
            self.soft_delete(user, path, name, node.is_dir()).await
        } else {
            self.hard_delete(user, storage, path, name, node.is_dir())
                .await
        }
    }

    /// Soft-delete: relocate into the trash root, recording the origin.
    async fn soft_delete(
        &self,
        user: &str,
        path: &VirtualPath,
        name: &str,
        is_dir: bool,
    ) -> Result<(), FilesError> {
        let full = path.join(name);
        tracing::debug!(user, item = %full, "soft-deleting into trash");

        // 1. shared-access grants on the item do not survive deletion
        self.shares
            .remove_item_shares(user, StorageType::Personal, &full)
            .await?;

        // 2. the trash root exists on demand
        let trash = self.router.trash_tree(user);
        trash.ensure_root().await?;

        // 3-4. plain copy under a non-colliding name
        let trash_name = self
            .router
            .non_existent_name(user, StorageType::Trash, &VirtualPath::root(), name, false)
            .await?;
        let personal = self.router.personal_tree(user);
        personal
            .copy_recursive(path, name, &trash, &VirtualPath::root(), &trash_name)
            .await?;

        // 5. record where the item came from
        sidecar::update(trash.root(), &trash_name, |props| {
            props
                .extended_props
                .insert(keys::TRASH_ORIGINAL_PATH.to_string(), json!(full.as_str()));
        })
        .await?;

        // 6-7. the public link and any cached thumbnail die with the
        // original location; favorite references are left for the restore
        self.links
            .delete(user, StorageType::Personal, path, name)
            .await?;
        if is_dir {
            self.links
                .remove_subtree(user, StorageType::Personal, &full)
                .await?;
        }
        self.thumbs
            .evict(&hash_id(user, StorageType::Personal, path, name))
            .await?;

        // 8. drop the original
        personal.delete(path, name).await
    }

    /// Permanent delete: the node goes away along with its public links,
    /// share grants, favorite references and cached thumbnail.
    async fn hard_delete(
        &self,
        user: &str,
        storage: StorageType,
        path: &VirtualPath,
        name: &str,
        is_dir: bool,
    ) -> Result<(), FilesError> {
        tracing::debug!(user, %storage, item = %path.join(name), "permanently deleting");
        self.propagation
            .item_deleted(user, storage, path, name, is_dir)
            .await?;
        self.thumbs
            .evict(&hash_id(user, storage, path, name))
            .await?;
        let located = self.router.locate(user, storage, path);
        located.tree.delete(&located.path, name).await
    }

    /// Restore a batch of trash-root items to their recorded origins.
    ///
    /// Items without a recorded origin are logged and skipped; no guess is
    /// made. Returns original name -> assigned name so the caller can
    /// reconcile references when a collision forced a rename. The trash copy
    /// is left in place for a later purge.
    pub async fn restore(
        &self,
        user: &str,
        names: &[String],
    ) -> Result<BTreeMap<String, String>, FilesError> {
        let trash = self.router.trash_tree(user);
        let personal = self.router.personal_tree(user);
        let mut assigned_names = BTreeMap::new();

        for trash_name in names {
            if trash.node(&VirtualPath::root(), trash_name).await?.is_none() {
                tracing::warn!(user, trash_name, "restore target missing from trash");
                continue;
            }
            let props = sidecar::get(trash.root(), trash_name).await?;
            let Some(origin) = props
                .extended_props
                .get(keys::TRASH_ORIGINAL_PATH)
                .and_then(|value| value.as_str())
            else {
                tracing::warn!(user, trash_name, "trash item has no recorded origin, skipping");
                continue;
            };

            let origin = VirtualPath::new(origin);
            let (parent, original_name) = origin.split();
            let Some(original_name) = original_name else {
                tracing::warn!(user, trash_name, "trash origin is empty, skipping");
                continue;
            };

            // the original parent may itself have been deleted since
            personal.create_dir_all(&parent).await?;

            let assigned = self
                .router
                .non_existent_name(user, StorageType::Personal, &parent, original_name, false)
                .await?;
            trash
                .copy_recursive(&VirtualPath::root(), trash_name, &personal, &parent, &assigned)
                .await?;
            // the origin marker is consumed by the restore
            sidecar::update(&personal.physical(&parent), &assigned, |props| {
                props.extended_props.remove(keys::TRASH_ORIGINAL_PATH);
            })
            .await?;

            assigned_names.insert(original_name.to_string(), assigned);
        }

        Ok(assigned_names)
    }
}
