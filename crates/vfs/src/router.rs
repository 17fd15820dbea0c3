use std::path::PathBuf;
use std::sync::Arc;

use common::path::split_name;
use common::prelude::{FilesError, StorageType, VirtualPath};

use crate::config::Config;
use crate::node::{Node, SharedInfo, Tree};
use crate::shares::{ShareRecord, ShareStore};
use crate::users::UserStore;

/// Resolution of a (user, storage type, logical path) triple: which physical
/// tree holds the bytes, the path inside it, and the share mount traversed
/// to get there, if any.
#[derive(Debug, Clone)]
pub struct Located {
    /// Effective backend. A shared-type request with no mount at the path
    /// degrades transparently to `Personal`.
    pub storage: StorageType,
    pub tree: Tree,
    pub path: VirtualPath,
    pub share: Option<ShareRecord>,
}

/// Resolves users and storage types to physical roots and nodes.
pub struct Router {
    data_dir: PathBuf,
    trash_folder: String,
    history_suffix: String,
    users: Arc<UserStore>,
    shares: Arc<ShareStore>,
}

impl Router {
    pub fn new(config: &Config, users: Arc<UserStore>, shares: Arc<ShareStore>) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            trash_folder: config.trash_folder.clone(),
            history_suffix: config.history_suffix.clone(),
            users,
            shares,
        }
    }

    pub fn personal_root(&self, user: &str) -> PathBuf {
        self.data_dir.join("personal").join(user)
    }

    pub fn corporate_root(&self, user: &str) -> PathBuf {
        self.data_dir
            .join("corporate")
            .join(self.users.tenant_of(user))
    }

    pub fn personal_tree(&self, user: &str) -> Tree {
        Tree::new(self.personal_root(user))
            .with_hidden_root(&self.trash_folder)
            .with_hidden_suffix(&self.history_suffix)
    }

    pub fn trash_tree(&self, user: &str) -> Tree {
        Tree::new(self.personal_root(user).join(&self.trash_folder))
            .with_hidden_suffix(&self.history_suffix)
    }

    pub fn corporate_tree(&self, user: &str) -> Tree {
        Tree::new(self.corporate_root(user)).with_hidden_suffix(&self.history_suffix)
    }

    /// The physical tree backing a storage type for this user. `Shared` and
    /// `Favorites` fall back to the personal tree (their own resolution goes
    /// through [`locate`](Router::locate)).
    pub fn tree(&self, user: &str, storage: StorageType) -> Tree {
        match storage {
            StorageType::Corporate => self.corporate_tree(user),
            StorageType::Trash => self.trash_tree(user),
            _ => self.personal_tree(user),
        }
    }

    /// Whether a personal-backend path reaches into the reserved trash
    /// folder.
    pub fn is_in_trash(&self, path: &VirtualPath) -> bool {
        path.segments()
            .next()
            .map(|first| first == self.trash_folder)
            .unwrap_or(false)
    }

    /// Create the physical root backing a storage type, if missing.
    pub async fn ensure_backend(&self, user: &str, storage: StorageType) -> Result<(), FilesError> {
        match storage {
            StorageType::Corporate => self.corporate_tree(user).ensure_root().await,
            StorageType::Trash => self.trash_tree(user).ensure_root().await,
            _ => self.personal_tree(user).ensure_root().await,
        }
    }

    /// Walk a shared-view path looking for a mount along the way. Returns
    /// the record and the owner-side path the remainder resolves to.
    fn resolve_mount(&self, user: &str, path: &VirtualPath) -> Option<(ShareRecord, VirtualPath)> {
        let mut consumed = VirtualPath::root();
        let segments: Vec<&str> = path.segments().collect();
        for (idx, seg) in segments.iter().copied().enumerate() {
            if let Some(record) = self.shares.find_mount(user, &consumed, seg) {
                let mut inner = record.path.clone();
                for rest in segments.iter().copied().skip(idx + 1) {
                    inner = inner.join(rest);
                }
                return Some((record, inner));
            }
            consumed = consumed.join(seg);
        }
        None
    }

    /// Resolve a directory path to its physical location.
    pub fn locate(&self, user: &str, storage: StorageType, path: &VirtualPath) -> Located {
        match storage {
            StorageType::Trash => Located {
                storage: StorageType::Trash,
                tree: self.trash_tree(user),
                path: path.clone(),
                share: None,
            },
            StorageType::Corporate => Located {
                storage: StorageType::Corporate,
                tree: self.corporate_tree(user),
                path: path.clone(),
                share: None,
            },
            StorageType::Shared => match self.resolve_mount(user, path) {
                Some((record, inner)) => Located {
                    storage: record.storage,
                    tree: self.personal_tree(&record.owner),
                    path: inner,
                    share: Some(record),
                },
                // no shared mapping at this path: degrade to the private tree
                None => Located {
                    storage: StorageType::Personal,
                    tree: self.personal_tree(user),
                    path: path.clone(),
                    share: None,
                },
            },
            _ => Located {
                storage: StorageType::Personal,
                tree: self.personal_tree(user),
                path: path.clone(),
                share: None,
            },
        }
    }

    fn mount_shared_info(record: &ShareRecord) -> SharedInfo {
        SharedInfo {
            group_id: record.group_id,
            initiator: record.initiator.clone(),
            inherited: record.inherited,
            access: record.access,
        }
    }

    /// Provenance of nodes below a mount: anything reached through a share
    /// chain counts as inherited.
    pub fn chained_shared_info(record: &ShareRecord) -> SharedInfo {
        SharedInfo {
            group_id: record.group_id,
            initiator: record.initiator.clone(),
            inherited: true,
            access: record.access,
        }
    }

    /// Look up the node for one mount record on the owner's side. The node
    /// carries the recipient-side display name.
    async fn mount_node(&self, record: &ShareRecord) -> Result<Option<Node>, FilesError> {
        let owner_tree = self.tree(&record.owner, record.storage);
        let (parent, name) = record.path.split();
        let Some(name) = name else { return Ok(None) };
        Ok(owner_tree.node(&parent, name).await?.map(|mut node| {
            node.name = record.name.clone();
            node.with_shared(Self::mount_shared_info(record))
        }))
    }

    /// Look up a child by name. `Ok(None)` when no node exists; shared
    /// variants carry their provenance.
    pub async fn child(
        &self,
        user: &str,
        storage: StorageType,
        path: &VirtualPath,
        name: &str,
    ) -> Result<Option<Node>, FilesError> {
        if storage == StorageType::Shared {
            if let Some(record) = self.shares.find_mount(user, path, name) {
                return self.mount_node(&record).await;
            }
        }
        let located = self.locate(user, storage, path);
        let node = located.tree.node(&located.path, name).await?;
        Ok(node.map(|node| match &located.share {
            Some(record) => node.with_shared(Self::chained_shared_info(record)),
            None => node,
        }))
    }

    /// List a directory's children, mounts included for the shared view,
    /// sorted by name byte-wise ascending.
    pub async fn children(
        &self,
        user: &str,
        storage: StorageType,
        path: &VirtualPath,
    ) -> Result<Vec<Node>, FilesError> {
        if storage == StorageType::Shared {
            let located = self.locate(user, storage, path);
            let mut nodes = match &located.share {
                Some(record) => located
                    .tree
                    .children(&located.path)
                    .await?
                    .into_iter()
                    .map(|node| node.with_shared(Self::chained_shared_info(record)))
                    .collect(),
                // the virtual shared root holds mounts only; any other
                // unmapped path degrades to the private tree
                None if path.is_root() => Vec::new(),
                None => located.tree.children(&located.path).await?,
            };
            for record in self.shares.mounts_in(user, path) {
                match self.mount_node(&record).await? {
                    Some(node) => nodes.push(node),
                    None => {
                        tracing::warn!(
                            owner = %record.owner,
                            path = %record.path,
                            "share record points at a missing node, skipping"
                        );
                    }
                }
            }
            nodes.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
            return Ok(nodes);
        }

        let located = self.locate(user, storage, path);
        located.tree.children(&located.path).await
    }

    /// Existence check. With `without_group`, shared mounts belonging to no
    /// group are ignored (used when probing names for share fan-out).
    pub async fn exists(
        &self,
        user: &str,
        storage: StorageType,
        path: &VirtualPath,
        name: &str,
        without_group: bool,
    ) -> Result<bool, FilesError> {
        match self.child(user, storage, path, name).await? {
            Some(node) => {
                let groupless_mount = node
                    .shared
                    .as_ref()
                    .map(|shared| shared.group_id == 0)
                    .unwrap_or(false);
                Ok(!(without_group && groupless_mount))
            }
            None => Ok(false),
        }
    }

    /// Resolve a free name at the destination by probing `stem (k).ext` for
    /// the smallest free `k`. Must be re-applied per item during batched
    /// operations; a resolved name is only free until something takes it.
    pub async fn non_existent_name(
        &self,
        user: &str,
        storage: StorageType,
        path: &VirtualPath,
        name: &str,
        without_group: bool,
    ) -> Result<String, FilesError> {
        let (stem, ext) = split_name(name);
        let mut candidate = name.to_string();
        let mut index = 1u32;
        while self
            .exists(user, storage, path, &candidate, without_group)
            .await?
        {
            candidate = format!("{} ({}){}", stem, index, ext);
            index += 1;
        }
        Ok(candidate)
    }
}
