use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use common::item::{shortcut_body, LINK_EXTENSION};
use common::prelude::{ExtendedProps, FileItem, FilesError, StorageType, VirtualPath};
use common::props;
use parking_lot::Mutex;

use crate::config::Config;
use crate::copy::{CopyBudget, CopyEngine};
use crate::favorites::FavoriteStore;
use crate::item::{ItemBuilder, Slot};
use crate::links::LinkRegistry;
use crate::node::{sidecar, WriteMode};
use crate::propagation::Propagation;
use crate::quota::{Quota, QuotaTracker};
use crate::router::Router;
use crate::shares::{Access, ShareStore};
use crate::thumbs::ThumbnailCache;
use crate::trash::TrashManager;
use crate::users::UserStore;

/// One item of a batch operation.
#[derive(Debug, Clone)]
pub struct ItemRef {
    pub path: VirtualPath,
    pub name: String,
}

/// Per-item result of a batch operation. Batches are processed
/// independently; one rejected item does not abort the rest.
#[derive(Debug)]
pub struct ItemOutcome {
    pub path: VirtualPath,
    pub name: String,
    pub outcome: Result<(), FilesError>,
}

/// Listing options.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListOptions<'a> {
    /// Non-empty pattern: case-insensitive substring search over the whole
    /// subtree instead of a plain directory listing.
    pub pattern: Option<&'a str>,
    /// Hash of the public link a listing is served under, if any.
    pub public_hash: Option<&'a str>,
    /// Restrict results to shared-variant entries.
    pub shared_only: bool,
}

/// The unified virtual file-storage layer: one hierarchical namespace per
/// user over the personal, corporate and shared backends, with trash
/// semantics, quota accounting, public links and consistency propagation
/// layered on top.
///
/// Every call is one synchronous unit of work; same-user mutations are
/// serialized through a per-user lock, which closes the collision-probe and
/// quota read-modify-write races of concurrent writers.
pub struct FileStore {
    config: Config,
    users: Arc<UserStore>,
    shares: Arc<ShareStore>,
    favorites: Arc<FavoriteStore>,
    links: Arc<LinkRegistry>,
    thumbs: Arc<ThumbnailCache>,
    router: Arc<Router>,
    propagation: Arc<Propagation>,
    quota: QuotaTracker,
    engine: CopyEngine,
    trash: TrashManager,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl FileStore {
    pub async fn open(config: Config) -> Result<Self, FilesError> {
        let system = config.system_dir();
        tokio::fs::create_dir_all(&system).await?;

        let users = Arc::new(UserStore::open(system.join("users.json")).await?);
        let shares = Arc::new(ShareStore::open(system.join("shares.json")).await?);
        let favorites = Arc::new(FavoriteStore::open(system.join("favorites.json")).await?);
        let links = Arc::new(LinkRegistry::open(system.join("public_links.json")).await?);
        let thumbs = Arc::new(ThumbnailCache::new(system.join("thumbnails")));

        let router = Arc::new(Router::new(&config, users.clone(), shares.clone()));
        let propagation = Arc::new(Propagation::new(
            links.clone(),
            favorites.clone(),
            shares.clone(),
        ));
        let quota = QuotaTracker::new(&config, users.clone(), router.clone());
        let engine = CopyEngine::new(
            router.clone(),
            shares.clone(),
            propagation.clone(),
            config.history_suffix.clone(),
            CopyBudget::default(),
        );
        let trash = TrashManager::new(
            router.clone(),
            shares.clone(),
            links.clone(),
            propagation.clone(),
            thumbs.clone(),
            config.trash_enabled,
        );

        Ok(Self {
            config,
            users,
            shares,
            favorites,
            links,
            thumbs,
            router,
            propagation,
            quota,
            engine,
            trash,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /* Component access for collaborators (permission layer, schedulers, tests) */

    pub fn config(&self) -> &Config {
        &self.config
    }
    pub fn users(&self) -> &UserStore {
        &self.users
    }
    pub fn shares(&self) -> &ShareStore {
        &self.shares
    }
    pub fn favorites(&self) -> &FavoriteStore {
        &self.favorites
    }
    pub fn links(&self) -> &LinkRegistry {
        &self.links
    }
    pub fn thumbnails(&self) -> &ThumbnailCache {
        &self.thumbs
    }
    pub fn router(&self) -> &Router {
        &self.router
    }
    pub fn engine(&self) -> &CopyEngine {
        &self.engine
    }

    fn user_lock(&self, user: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .entry(user.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// The physical slot backing a node addressed by logical coordinates.
    fn slot(&self, user: &str, storage: StorageType, path: &VirtualPath, name: &str) -> Slot {
        if storage == StorageType::Shared {
            if let Some(record) = self.shares.find_mount(user, path, name) {
                let (dir, leaf) = record.path.split();
                if let Some(leaf) = leaf {
                    return Slot {
                        tree: self.router.tree(&record.owner, record.storage),
                        dir,
                        name: leaf.to_string(),
                    };
                }
            }
        }
        let located = self.router.locate(user, storage, path);
        Slot {
            tree: located.tree,
            dir: located.path,
            name: name.to_string(),
        }
    }

    /// Recompute quota for whoever physically holds the bytes at a location.
    async fn settle_quota(
        &self,
        user: &str,
        storage: StorageType,
        path: &VirtualPath,
    ) -> Result<(), FilesError> {
        let located = self.router.locate(user, storage, path);
        match &located.share {
            Some(record) => {
                self.quota.update_used_space(&record.owner).await?;
            }
            None if located.storage.physical() == StorageType::Personal => {
                self.quota.update_used_space(user).await?;
            }
            None => {}
        }
        Ok(())
    }

    /// List a folder, sorted by name in byte-wise ascending order. A
    /// non-empty pattern switches to an unbounded-depth subtree search.
    pub async fn list(
        &self,
        user: &str,
        storage: StorageType,
        path: &VirtualPath,
        opts: ListOptions<'_>,
    ) -> Result<Vec<FileItem>, FilesError> {
        self.router.ensure_backend(user, storage).await?;

        let mut items = match (storage, opts.pattern.filter(|p| !p.is_empty())) {
            (StorageType::Favorites, _) => self.list_favorites(user, opts).await?,
            (_, Some(pattern)) => self.search(user, storage, path, pattern, opts).await?,
            _ => {
                let builder = self.builder(user, storage, opts);
                let mut items = Vec::new();
                for node in self.router.children(user, storage, path).await? {
                    let slot = self.slot(user, storage, path, &node.name);
                    items.push(builder.build(&slot, path, &node).await?);
                }
                items
            }
        };

        if opts.shared_only {
            items.retain(|item| item.shared);
        }
        items.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
        Ok(items)
    }

    fn builder<'a>(
        &'a self,
        user: &'a str,
        storage: StorageType,
        opts: ListOptions<'a>,
    ) -> ItemBuilder<'a> {
        ItemBuilder {
            user,
            storage,
            public_hash: opts.public_hash,
            links: &self.links,
            config: &self.config,
        }
    }

    async fn list_favorites(
        &self,
        user: &str,
        opts: ListOptions<'_>,
    ) -> Result<Vec<FileItem>, FilesError> {
        let mut items = Vec::new();
        for record in self.favorites.list_for(user) {
            let (parent, name) = record.full_path.split();
            let Some(name) = name else { continue };
            match self.router.child(user, record.storage, &parent, name).await? {
                Some(node) => {
                    let builder = self.builder(user, record.storage, opts);
                    let slot = self.slot(user, record.storage, &parent, name);
                    items.push(builder.build(&slot, &parent, &node).await?);
                }
                None => {
                    tracing::warn!(user, path = %record.full_path, "favorite points at a missing item");
                }
            }
        }
        Ok(items)
    }

    async fn search(
        &self,
        user: &str,
        storage: StorageType,
        path: &VirtualPath,
        pattern: &str,
        opts: ListOptions<'_>,
    ) -> Result<Vec<FileItem>, FilesError> {
        let located = self.router.locate(user, storage, path);
        if !located.tree.dir_exists(&located.path).await {
            return Err(FilesError::NotFound(path.clone()));
        }
        let builder = self.builder(user, storage, opts);
        let mut items = Vec::new();

        for (dir, node) in located.tree.search(&located.path, pattern).await? {
            let node = match &located.share {
                Some(record) => node.with_shared(Router::chained_shared_info(record)),
                None => node,
            };
            // map the tree-side directory back into caller coordinates
            let logical_dir = dir
                .rebase(&located.path, path)
                .unwrap_or_else(|| dir.clone());
            let slot = Slot {
                tree: located.tree.clone(),
                dir,
                name: node.name.clone(),
            };
            items.push(builder.build(&slot, &logical_dir, &node).await?);
        }

        // shortcuts in the listed folder also match on their display name
        let needle = pattern.to_lowercase();
        for node in located.tree.children(&located.path).await? {
            if !common::item::is_link_name(&node.name) {
                continue;
            }
            let node_props = sidecar::get(&located.tree.physical(&located.path), &node.name).await?;
            let display = node_props.name.unwrap_or_default();
            let already = items.iter().any(|item| {
                item.id == node.name && item.path.same_location(path)
            });
            if !already && display.to_lowercase().contains(&needle) {
                let slot = Slot {
                    tree: located.tree.clone(),
                    dir: located.path.clone(),
                    name: node.name.clone(),
                };
                items.push(builder.build(&slot, path, &node).await?);
            }
        }

        Ok(items)
    }

    /// Metadata of one item.
    pub async fn get_info(
        &self,
        user: &str,
        storage: StorageType,
        path: &VirtualPath,
        name: &str,
    ) -> Result<FileItem, FilesError> {
        let node = self
            .router
            .child(user, storage, path, name)
            .await?
            .ok_or_else(|| FilesError::NotFound(path.join(name)))?;
        let slot = self.slot(user, storage, path, name);
        self.builder(user, storage, ListOptions::default())
            .build(&slot, path, &node)
            .await
    }

    /// Open file content as a byte stream.
    pub async fn read(
        &self,
        user: &str,
        storage: StorageType,
        path: &VirtualPath,
        name: &str,
    ) -> Result<tokio::fs::File, FilesError> {
        let slot = self.slot(user, storage, path, name);
        slot.tree.open(&slot.dir, &slot.name).await
    }

    /// Store file content. With `overwrite` off, the name is
    /// collision-resolved first. Returns false when the target folder does
    /// not exist.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        user: &str,
        storage: StorageType,
        path: &VirtualPath,
        name: &str,
        data: &[u8],
        overwrite: bool,
        mode: WriteMode,
        ext_props: Option<ExtendedProps>,
    ) -> Result<bool, FilesError> {
        self.router.ensure_backend(user, storage).await?;
        let lock = self.user_lock(user);
        let _guard = lock.lock().await;

        let located = self.router.locate(user, storage, path);
        if !located.tree.dir_exists(&located.path).await {
            return Ok(false);
        }

        let name = if overwrite {
            name.to_string()
        } else {
            self.router
                .non_existent_name(user, storage, path, name, false)
                .await?
        };

        located
            .tree
            .write_file(&located.path, &name, data, mode)
            .await?;
        sidecar::update(&located.tree.physical(&located.path), &name, |node_props| {
            if node_props.owner.is_none() {
                node_props.owner = Some(user.to_string());
            }
            if let Some(update) = ext_props {
                props::merge(&mut node_props.extended_props, update);
            }
        })
        .await?;

        self.settle_quota(user, storage, path).await?;
        Ok(true)
    }

    /// Create a folder; `"a/b/c"` creates the whole chain. The final segment
    /// already existing is a name collision.
    pub async fn create_folder(
        &self,
        user: &str,
        storage: StorageType,
        path: &VirtualPath,
        folder_name: &str,
    ) -> Result<bool, FilesError> {
        self.router.ensure_backend(user, storage).await?;
        let lock = self.user_lock(user);
        let _guard = lock.lock().await;

        let located = self.router.locate(user, storage, path);
        if !located.tree.dir_exists(&located.path).await {
            return Ok(false);
        }

        let folder_path = VirtualPath::new(folder_name);
        let segments: Vec<&str> = folder_path.segments().collect();
        if segments.is_empty() {
            return Ok(false);
        }
        let mut current = located.path.clone();
        for (idx, segment) in segments.iter().enumerate() {
            let last = idx + 1 == segments.len();
            if located.tree.exists(&current, segment).await {
                if last {
                    return Err(FilesError::AlreadyExists(current.join(segment)));
                }
            } else {
                located.tree.create_dir(&current, segment).await?;
            }
            current = current.join(segment);
        }
        Ok(true)
    }

    /// Store a `.url` shortcut pointing at arbitrary online content.
    pub async fn create_link(
        &self,
        user: &str,
        storage: StorageType,
        path: &VirtualPath,
        url: &str,
        name: &str,
    ) -> Result<bool, FilesError> {
        self.router.ensure_backend(user, storage).await?;
        let lock = self.user_lock(user);
        let _guard = lock.lock().await;

        let located = self.router.locate(user, storage, path);
        if !located.tree.dir_exists(&located.path).await {
            return Ok(false);
        }

        let file_name = format!("{}.{}", name, LINK_EXTENSION);
        located
            .tree
            .write_file(
                &located.path,
                &file_name,
                shortcut_body(url).as_bytes(),
                WriteMode::Whole,
            )
            .await?;
        sidecar::update(&located.tree.physical(&located.path), &file_name, |props| {
            props.owner = Some(user.to_string());
        })
        .await?;

        self.settle_quota(user, storage, path).await?;
        Ok(true)
    }

    /// Delete a batch of items through the trash policy. Items are processed
    /// independently; the outcome list reports each one.
    pub async fn delete(
        &self,
        user: &str,
        storage: StorageType,
        items: &[ItemRef],
    ) -> Result<Vec<ItemOutcome>, FilesError> {
        self.router.ensure_backend(user, storage).await?;
        let lock = self.user_lock(user);
        let _guard = lock.lock().await;

        let mut outcomes = Vec::with_capacity(items.len());
        for item in items {
            let outcome = self.trash.delete(user, storage, &item.path, &item.name).await;
            if let Err(err) = &outcome {
                tracing::warn!(user, item = %item.path.join(&item.name), %err, "delete failed");
            }
            outcomes.push(ItemOutcome {
                path: item.path.clone(),
                name: item.name.clone(),
                outcome,
            });
        }

        self.quota.update_used_space(user).await?;
        Ok(outcomes)
    }

    /// Restore trash items to their recorded origins. Returns original name
    /// -> assigned name.
    pub async fn restore(
        &self,
        user: &str,
        trash_item_names: &[String],
    ) -> Result<BTreeMap<String, String>, FilesError> {
        self.router.ensure_backend(user, StorageType::Personal).await?;
        let lock = self.user_lock(user);
        let _guard = lock.lock().await;

        let restored = self.trash.restore(user, trash_item_names).await?;
        self.quota.update_used_space(user).await?;
        Ok(restored)
    }

    /// Rename an item in place. With `is_link`, only the shortcut's display
    /// name changes; the stored file keeps its name.
    pub async fn rename(
        &self,
        user: &str,
        storage: StorageType,
        path: &VirtualPath,
        name: &str,
        new_name: &str,
        is_link: bool,
    ) -> Result<bool, FilesError> {
        self.router.ensure_backend(user, storage).await?;
        let lock = self.user_lock(user);
        let _guard = lock.lock().await;

        let Some(node) = self.router.child(user, storage, path, name).await? else {
            return Ok(false);
        };

        if is_link {
            let slot = self.slot(user, storage, path, name);
            sidecar::update(&slot.tree.physical(&slot.dir), &slot.name, |props| {
                props.name = Some(new_name.to_string());
            })
            .await?;
            return Ok(true);
        }

        if node.name == new_name {
            return Ok(true);
        }
        if new_name.len() >= 200 {
            return Ok(false);
        }

        // a mount renames in the recipient's records, not on the owner's disk
        if storage == StorageType::Shared {
            if let Some(record) = self.shares.find_mount(user, path, name) {
                return self
                    .shares
                    .update_mount_location(user, name, new_name, path, path, record.group_id)
                    .await;
            }
        }

        if self
            .router
            .exists(user, storage, path, new_name, false)
            .await?
        {
            return Err(FilesError::AlreadyExists(path.join(new_name)));
        }

        self.propagation
            .item_moved(
                user,
                storage,
                path,
                name,
                storage,
                path,
                new_name,
                node.is_dir(),
            )
            .await?;

        let located = self.router.locate(user, storage, path);
        located.tree.rename(&located.path, name, new_name).await?;
        Ok(true)
    }

    /// Copy one item; directories copy recursively with per-child collision
    /// resolution. Without `new_name`, a free name is probed at the
    /// destination.
    #[allow(clippy::too_many_arguments)]
    pub async fn copy(
        &self,
        user: &str,
        from_type: StorageType,
        to_type: StorageType,
        from_path: &VirtualPath,
        to_path: &VirtualPath,
        name: &str,
        new_name: Option<&str>,
    ) -> Result<bool, FilesError> {
        self.router.ensure_backend(user, from_type).await?;
        self.router.ensure_backend(user, to_type).await?;
        let lock = self.user_lock(user);
        let _guard = lock.lock().await;

        let resolved = self
            .resolve_destination_name(user, to_type, to_path, name, new_name)
            .await?;
        let found = self
            .engine
            .copy_or_move(
                user,
                from_type,
                to_type,
                from_path,
                to_path,
                name,
                Some(&resolved),
                false,
                true,
            )
            .await?;

        self.settle_quota(user, to_type, to_path).await?;
        Ok(found)
    }

    /// Move = copy with delete-after-success plus migration of links,
    /// favorites and share records.
    #[allow(clippy::too_many_arguments)]
    pub async fn move_item(
        &self,
        user: &str,
        from_type: StorageType,
        to_type: StorageType,
        from_path: &VirtualPath,
        to_path: &VirtualPath,
        name: &str,
        new_name: Option<&str>,
    ) -> Result<bool, FilesError> {
        self.router.ensure_backend(user, from_type).await?;
        self.router.ensure_backend(user, to_type).await?;
        let lock = self.user_lock(user);
        let _guard = lock.lock().await;

        // The self-target guard runs before collision resolution; a probed
        // "name (1)" must never mask a move onto itself.
        let src_full = from_path.join(name);
        if to_type == from_type {
            let onto_itself = to_path.is_same_or_inside(&src_full)
                || (to_path.same_location(from_path)
                    && new_name.map_or(true, |n| n == name));
            if onto_itself {
                return Err(FilesError::CannotCopyOrMoveItemToItself(src_full));
            }
        }

        let resolved = self
            .resolve_destination_name(user, to_type, to_path, name, new_name)
            .await?;
        let found = self
            .engine
            .copy_or_move(
                user,
                from_type,
                to_type,
                from_path,
                to_path,
                name,
                Some(&resolved),
                true,
                true,
            )
            .await?;

        self.quota.update_used_space(user).await?;
        self.settle_quota(user, to_type, to_path).await?;
        Ok(found)
    }

    async fn resolve_destination_name(
        &self,
        user: &str,
        to_type: StorageType,
        to_path: &VirtualPath,
        name: &str,
        new_name: Option<&str>,
    ) -> Result<String, FilesError> {
        match new_name {
            Some(n) if !n.is_empty() => Ok(n.to_string()),
            _ => {
                self.router
                    .non_existent_name(user, to_type, to_path, name, false)
                    .await
            }
        }
    }

    /// Issue a public link. Idempotent for an unchanged location; rejected
    /// for items the user does not own.
    pub async fn create_public_link(
        &self,
        user: &str,
        storage: StorageType,
        path: &VirtualPath,
        name: &str,
        size: u64,
        is_folder: bool,
    ) -> Result<String, FilesError> {
        if let Some(node) = self.router.child(user, storage, path, name).await? {
            if node.is_shared() {
                return Err(FilesError::NotPermitted);
            }
        }
        let link = self
            .links
            .create(user, storage, path, name, size, is_folder)
            .await?;
        self.quota.update_used_space(user).await?;
        Ok(link)
    }

    /// Remove a public link; removing a non-existent link succeeds.
    pub async fn delete_public_link(
        &self,
        user: &str,
        storage: StorageType,
        path: &VirtualPath,
        name: &str,
    ) -> Result<bool, FilesError> {
        let removed = self.links.delete(user, storage, path, name).await?;
        self.quota.update_used_space(user).await?;
        Ok(removed)
    }

    pub fn get_quota(&self, user: &str, storage: StorageType) -> Quota {
        self.quota.get_quota(user, storage)
    }

    /// Whether `size` more bytes still fit under the user's limit. Turning a
    /// failed check into a rejection is the caller's responsibility.
    pub fn check_quota(&self, user: &str, storage: StorageType, size: u64) -> bool {
        self.quota.check_quota(user, storage, size)
    }

    /// Recompute and persist the used-space counter.
    pub async fn update_used_space(&self, user: &str) -> Result<u64, FilesError> {
        self.quota.update_used_space(user).await
    }

    /// Probe `stem (k).ext` names until a free one is found.
    pub async fn get_non_existent_name(
        &self,
        user: &str,
        storage: StorageType,
        path: &VirtualPath,
        name: &str,
        without_group: bool,
    ) -> Result<String, FilesError> {
        self.router
            .non_existent_name(user, storage, path, name, without_group)
            .await
    }

    /// Merge extended properties onto a file; a null value deletes its key.
    pub async fn update_extended_props(
        &self,
        user: &str,
        storage: StorageType,
        path: &VirtualPath,
        name: &str,
        update: ExtendedProps,
    ) -> Result<bool, FilesError> {
        let Some(node) = self.router.child(user, storage, path, name).await? else {
            return Ok(false);
        };
        if !node.is_file() {
            return Ok(false);
        }
        let slot = self.slot(user, storage, path, name);
        sidecar::update(&slot.tree.physical(&slot.dir), &slot.name, |node_props| {
            props::merge(&mut node_props.extended_props, update);
        })
        .await?;
        Ok(true)
    }

    pub async fn get_extended_props(
        &self,
        user: &str,
        storage: StorageType,
        path: &VirtualPath,
        name: &str,
    ) -> Result<ExtendedProps, FilesError> {
        let slot = self.slot(user, storage, path, name);
        Ok(sidecar::get(&slot.tree.physical(&slot.dir), &slot.name)
            .await?
            .extended_props)
    }

    /// Why can the user see this path: every ancestor segment that is a
    /// share mount contributes its access level, keyed by segment name.
    pub fn get_access_info_for_path(
        &self,
        user: &str,
        path: &VirtualPath,
    ) -> Result<BTreeMap<String, Access>, FilesError> {
        let mut access = BTreeMap::new();
        let mut consumed = VirtualPath::root();
        for segment in path.segments() {
            if let Some(record) = self.shares.find_mount(user, &consumed, segment) {
                access.insert(segment.to_string(), record.access);
            }
            consumed = consumed.join(segment);
        }
        Ok(access)
    }

    pub async fn is_file_exists(
        &self,
        user: &str,
        storage: StorageType,
        path: &VirtualPath,
        name: &str,
        without_group: bool,
    ) -> Result<bool, FilesError> {
        self.router
            .exists(user, storage, path, name, without_group)
            .await
    }

    /// Wipe a user's personal backend (account deletion).
    pub async fn clear_private_files(&self, user: &str) -> Result<(), FilesError> {
        let lock = self.user_lock(user);
        let _guard = lock.lock().await;
        match tokio::fs::remove_dir_all(self.router.personal_root(user)).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        self.quota.update_used_space(user).await?;
        Ok(())
    }
}
