use std::sync::Arc;

use common::prelude::{FilesError, StorageType, VirtualPath};
use common::props::keys;

use crate::node::{sidecar, Tree, WriteMode};
use crate::propagation::Propagation;
use crate::router::Router;
use crate::shares::{ShareRecord, ShareStore};

/// Future-proofing hook bounding a recursive copy. No limit is enforced by
/// default, matching current behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyBudget {
    pub max_depth: Option<usize>,
}

/// Recursive, cross-backend copy and move with conflict resolution and
/// propagation to the public-link registry, favorites and shared-access
/// records.
///
/// Whether a call is a move is an explicit parameter threaded through every
/// level of the recursion; there is no ambient mode flag.
pub struct CopyEngine {
    router: Arc<Router>,
    shares: Arc<ShareStore>,
    propagation: Arc<Propagation>,
    history_suffix: String,
    budget: CopyBudget,
}

impl CopyEngine {
    pub fn new(
        router: Arc<Router>,
        shares: Arc<ShareStore>,
        propagation: Arc<Propagation>,
        history_suffix: String,
        budget: CopyBudget,
    ) -> Self {
        Self {
            router,
            shares,
            propagation,
            history_suffix,
            budget,
        }
    }

    /// Copy or move one item, recursively for directories. Returns false
    /// when the source child does not exist (a no-op, not an error).
    #[allow(clippy::too_many_arguments)]
    pub async fn copy_or_move(
        &self,
        user: &str,
        from_type: StorageType,
        to_type: StorageType,
        from_path: &VirtualPath,
        to_path: &VirtualPath,
        name: &str,
        new_name: Option<&str>,
        is_move: bool,
        with_history: bool,
    ) -> Result<bool, FilesError> {
        // Reject self-targets before any mutation. VirtualPath is canonical,
        // so trailing-slash and case noise cannot sneak past these checks.
        let src_full = from_path.join(name);
        if to_type == from_type {
            if to_path.is_same_or_inside(&src_full) {
                return Err(FilesError::CannotCopyOrMoveItemToItself(src_full));
            }
            if is_move
                && to_path.same_location(from_path)
                && new_name.map_or(true, |n| n == name)
            {
                return Err(FilesError::CannotCopyOrMoveItemToItself(src_full));
            }
        }

        let new_name = match new_name {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => name.to_string(),
        };
        self.copy_node(
            user,
            from_type,
            to_type,
            from_path,
            to_path,
            name,
            &new_name,
            is_move,
            with_history,
            0,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn copy_node(
        &self,
        user: &str,
        from_type: StorageType,
        to_type: StorageType,
        from_path: &VirtualPath,
        to_path: &VirtualPath,
        name: &str,
        new_name: &str,
        is_move: bool,
        with_history: bool,
        depth: usize,
    ) -> Result<bool, FilesError> {
        if let Some(max) = self.budget.max_depth {
            if depth > max {
                return Err(FilesError::Default(anyhow::anyhow!(
                    "copy recursion exceeded the configured depth budget ({max})"
                )));
            }
        }

        let from_loc = self.router.locate(user, from_type, from_path);
        let to_loc = self.router.locate(user, to_type, to_path);
        if !from_loc.tree.dir_exists(&from_loc.path).await {
            return Err(FilesError::NotFound(from_path.clone()));
        }
        if !to_loc.tree.dir_exists(&to_loc.path).await {
            return Err(FilesError::NotFound(to_path.clone()));
        }

        // Missing source child is a no-op, not an error.
        let Some(node) = self.router.child(user, from_type, from_path, name).await? else {
            return Ok(false);
        };

        let dest_is_shared = to_loc.share.is_some();

        // Shared provenance must not cross into another share boundary or
        // into corporate storage.
        if is_move && node.is_shared() && !node.is_inherited() {
            if dest_is_shared {
                return Err(FilesError::NotPossibleToMoveSharedFileToSharedFolder);
            }
            if to_type == StorageType::Corporate {
                return Err(FilesError::NotPossibleToMoveSharedFileToCorporateStorage);
            }
        }

        // The physical slot of the source. A mount's physical basename can
        // differ from the display name the caller addressed it by.
        let mount = if from_type == StorageType::Shared {
            self.shares.find_mount(user, from_path, name)
        } else {
            None
        };
        let (src_tree, src_dir, src_name): (Tree, VirtualPath, String) = match &mount {
            Some(record) => {
                let owner_tree = self.router.tree(&record.owner, record.storage);
                let (parent, leaf) = record.path.split();
                let leaf = leaf
                    .ok_or_else(|| FilesError::NotFound(record.path.clone()))?
                    .to_string();
                (owner_tree, parent, leaf)
            }
            None => (from_loc.tree.clone(), from_loc.path.clone(), name.to_string()),
        };

        // Content protected for a specific recipient set cannot be relocated
        // into a shared context.
        let src_props = sidecar::get(&src_tree.physical(&src_dir), &src_name).await?;
        if src_props
            .extended_props
            .contains_key(keys::INITIALIZATION_VECTOR)
            && dest_is_shared
        {
            return Err(FilesError::NotPossibleToMoveSharedFileToSharedFolder);
        }

        // Moving a mounted share within the recipient's namespace only
        // relocates the record; the physical bytes are owned elsewhere.
        if is_move && node.is_inherited() {
            if let Some(record) = &mount {
                self.shares
                    .update_mount_location(
                        user,
                        name,
                        new_name,
                        from_path,
                        to_path,
                        record.group_id,
                    )
                    .await?;
                tracing::debug!(user, name, new_name, "relocated share mount record");
                return Ok(true);
            }
        }

        let src_full = from_path.join(name);
        let dst_dir_phys = to_loc.tree.physical(&to_loc.path);

        if node.is_file() {
            let bytes = src_tree.read(&src_dir, &src_name).await?;
            to_loc
                .tree
                .write_file(&to_loc.path, new_name, &bytes, WriteMode::Whole)
                .await?;
            sidecar::copy_entry(&src_tree.physical(&src_dir), &src_name, &dst_dir_phys, new_name)
                .await?;

            if is_move {
                self.propagation
                    .item_moved(
                        user, from_type, from_path, name, to_type, to_path, new_name, false,
                    )
                    .await?;
            } else {
                // a plain copy belongs to whoever made it
                sidecar::update(&dst_dir_phys, new_name, |props| {
                    props.owner = Some(user.to_string())
                })
                .await?;
            }

            if with_history {
                let hist = format!("{}{}", name, self.history_suffix);
                if let Some(hist_node) =
                    self.router.child(user, from_type, from_path, &hist).await?
                {
                    if hist_node.is_dir() {
                        let hist_new = format!("{}{}", new_name, self.history_suffix);
                        Box::pin(self.copy_node(
                            user, from_type, to_type, from_path, to_path, &hist, &hist_new,
                            false, false, depth,
                        ))
                        .await?;
                    }
                }
            }
        } else {
            match to_loc.tree.create_dir(&to_loc.path, new_name).await {
                Ok(()) | Err(FilesError::AlreadyExists(_)) => {}
                Err(err) => return Err(err),
            }
            sidecar::copy_entry(&src_tree.physical(&src_dir), &src_name, &dst_dir_phys, new_name)
                .await?;

            let dst_full = to_path.join(new_name);
            if is_move {
                self.propagation
                    .item_moved(
                        user, from_type, from_path, name, to_type, to_path, new_name, true,
                    )
                    .await?;
            } else {
                // copying a shared directory re-offers it to the same
                // recipients at the destination path
                for record in self.shares.shares_on_item(user, from_type, &src_full) {
                    let mount_name = if name != new_name {
                        self.router
                            .non_existent_name(
                                &record.principal,
                                StorageType::Shared,
                                &record.mount_path,
                                new_name,
                                true,
                            )
                            .await?
                    } else {
                        record.name.clone()
                    };
                    self.shares
                        .add(ShareRecord {
                            owner: user.to_string(),
                            storage: to_type.physical(),
                            path: dst_full.clone(),
                            principal: record.principal.clone(),
                            mount_path: record.mount_path.clone(),
                            name: mount_name,
                            access: record.access,
                            inherited: true,
                            group_id: record.group_id,
                            initiator: user.to_string(),
                        })
                        .await?;
                }
            }

            // Collisions are resolved per child at every level of depth;
            // a name resolved for one child must never be reused for another.
            let child_src = from_path.join(name);
            for child in self.router.children(user, from_type, &child_src).await? {
                let resolved = self
                    .router
                    .non_existent_name(user, to_type, &dst_full, &child.name, false)
                    .await?;
                Box::pin(self.copy_node(
                    user,
                    from_type,
                    to_type,
                    &child_src,
                    &dst_full,
                    &child.name,
                    &resolved,
                    is_move,
                    with_history,
                    depth + 1,
                ))
                .await?;
            }
        }

        // Only after every copy succeeded does a move drop the original.
        if is_move {
            src_tree.delete(&src_dir, &src_name).await?;
        }
        Ok(true)
    }
}
