use std::sync::Arc;

use common::prelude::{FilesError, StorageType, VirtualPath};

use crate::favorites::FavoriteStore;
use crate::links::LinkRegistry;
use crate::shares::ShareStore;

/// Central fan-out for "this item's path changed" and "this item is gone".
///
/// Every path-mutating operation (rename, move) and every permanent delete
/// routes through here, so public links, favorite references and
/// shared-access records can never be silently orphaned by a mutator that
/// forgot one of the three.
pub struct Propagation {
    links: Arc<LinkRegistry>,
    favorites: Arc<FavoriteStore>,
    shares: Arc<ShareStore>,
}

impl Propagation {
    pub fn new(
        links: Arc<LinkRegistry>,
        favorites: Arc<FavoriteStore>,
        shares: Arc<ShareStore>,
    ) -> Self {
        Self {
            links,
            favorites,
            shares,
        }
    }

    /// An item moved (or was renamed) from one location to another.
    #[allow(clippy::too_many_arguments)]
    pub async fn item_moved(
        &self,
        user: &str,
        from_storage: StorageType,
        from_path: &VirtualPath,
        name: &str,
        to_storage: StorageType,
        to_path: &VirtualPath,
        new_name: &str,
        is_folder: bool,
    ) -> Result<(), FilesError> {
        let old_full = from_path.join(name);
        let new_full = to_path.join(new_name);
        tracing::debug!(user, from = %old_full, to = %new_full, "propagating path change");

        self.links
            .migrate(
                user,
                from_storage,
                from_path,
                name,
                to_storage,
                to_path,
                new_name,
            )
            .await?;
        if is_folder {
            self.links
                .migrate_subtree(user, from_storage, &old_full, to_storage, &new_full)
                .await?;
        }
        self.favorites
            .rewrite_paths(user, from_storage, &old_full, to_storage, &new_full)
            .await?;
        self.shares
            .rewrite_item_paths(user, from_storage, &old_full, to_storage, &new_full)
            .await?;
        Ok(())
    }

    /// An item was permanently deleted.
    pub async fn item_deleted(
        &self,
        user: &str,
        storage: StorageType,
        path: &VirtualPath,
        name: &str,
        is_folder: bool,
    ) -> Result<(), FilesError> {
        let full = path.join(name);
        self.links.delete(user, storage, path, name).await?;
        if is_folder {
            self.links.remove_subtree(user, storage, &full).await?;
        }
        self.favorites.remove_under(user, storage, &full).await?;
        self.shares
            .remove_item_shares(user, storage, &full)
            .await?;
        Ok(())
    }
}
