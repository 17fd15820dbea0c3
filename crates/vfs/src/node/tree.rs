use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use common::prelude::{FilesError, VirtualPath};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

use super::sidecar::{self, SIDECAR_FILE};
use super::{Node, NodeKind};

/// How file content is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace the whole body.
    Whole,
    /// Write at the given byte offset, leaving the rest of the file intact.
    Patch { offset: u64 },
}

/// One physical backend root and the operations over its directory tree.
///
/// All paths are [`VirtualPath`]s relative to the tree root; nothing here
/// knows about users, storage types or share mounts.
#[derive(Debug, Clone)]
pub struct Tree {
    root: PathBuf,
    /// A root-level entry name hidden from listings (the trash folder on
    /// personal trees).
    hidden_root_entry: Option<String>,
    /// Entries with this suffix (history companion folders) are hidden from
    /// listings at every depth; they are still reachable by name.
    hidden_suffix: Option<String>,
}

impl Tree {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            hidden_root_entry: None,
            hidden_suffix: None,
        }
    }

    pub fn with_hidden_root(mut self, name: &str) -> Self {
        self.hidden_root_entry = Some(name.to_string());
        self
    }

    pub fn with_hidden_suffix(mut self, suffix: &str) -> Self {
        self.hidden_suffix = Some(suffix.to_string());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn physical(&self, path: &VirtualPath) -> PathBuf {
        let mut out = self.root.clone();
        for seg in path.segments() {
            out.push(seg);
        }
        out
    }

    pub fn physical_child(&self, path: &VirtualPath, name: &str) -> PathBuf {
        self.physical(path).join(name)
    }

    pub async fn ensure_root(&self) -> Result<(), FilesError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    fn is_hidden(&self, path: &VirtualPath, name: &str) -> bool {
        if name == SIDECAR_FILE {
            return true;
        }
        if let Some(suffix) = &self.hidden_suffix {
            if name.ends_with(suffix.as_str()) {
                return true;
            }
        }
        path.is_root()
            && self
                .hidden_root_entry
                .as_deref()
                .map(|hidden| hidden == name)
                .unwrap_or(false)
    }

    pub async fn dir_exists(&self, path: &VirtualPath) -> bool {
        tokio::fs::metadata(self.physical(path))
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false)
    }

    /// Raw existence check, hidden entries included, so collision probing
    /// can never hand out a bookkeeping name.
    pub async fn exists(&self, path: &VirtualPath, name: &str) -> bool {
        tokio::fs::metadata(self.physical_child(path, name))
            .await
            .is_ok()
    }

    /// Look up one child. `Ok(None)` when nothing exists at the path.
    pub async fn node(&self, path: &VirtualPath, name: &str) -> Result<Option<Node>, FilesError> {
        match tokio::fs::metadata(self.physical_child(path, name)).await {
            Ok(meta) => Ok(Some(node_from_meta(name.to_string(), &meta))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// List a directory's children, internal entries hidden, sorted by name
    /// in byte-wise ascending order (stable).
    pub async fn children(&self, path: &VirtualPath) -> Result<Vec<Node>, FilesError> {
        let mut read_dir = match tokio::fs::read_dir(self.physical(path)).await {
            Ok(rd) => rd,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(FilesError::NotFound(path.clone()))
            }
            Err(err) => return Err(err.into()),
        };

        let mut nodes = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if self.is_hidden(path, &name) {
                continue;
            }
            let meta = entry.metadata().await?;
            nodes.push(node_from_meta(name, &meta));
        }
        nodes.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
        Ok(nodes)
    }

    /// Depth-first, unbounded pattern search below `path`: case-insensitive
    /// substring match on node names. Returns (containing dir, node) pairs.
    ///
    /// O(subtree size); callers bound it externally for very large trees.
    pub async fn search(
        &self,
        path: &VirtualPath,
        pattern: &str,
    ) -> Result<Vec<(VirtualPath, Node)>, FilesError> {
        let needle = pattern.to_lowercase();
        let mut matches = Vec::new();
        let mut stack = vec![path.clone()];
        while let Some(dir) = stack.pop() {
            for node in self.children(&dir).await? {
                if node.is_dir() {
                    stack.push(dir.join(&node.name));
                }
                if node.name.to_lowercase().contains(&needle) {
                    matches.push((dir.clone(), node));
                }
            }
        }
        Ok(matches)
    }

    /// Open a file's content as a byte stream.
    pub async fn open(&self, path: &VirtualPath, name: &str) -> Result<tokio::fs::File, FilesError> {
        let physical = self.physical_child(path, name);
        match tokio::fs::metadata(&physical).await {
            Ok(meta) if meta.is_file() => Ok(tokio::fs::File::open(&physical).await?),
            Ok(_) => Err(FilesError::NotFound(path.join(name))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(FilesError::NotFound(path.join(name)))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn read(&self, path: &VirtualPath, name: &str) -> Result<Vec<u8>, FilesError> {
        match tokio::fs::read(self.physical_child(path, name)).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(FilesError::NotFound(path.join(name)))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn write_file(
        &self,
        path: &VirtualPath,
        name: &str,
        data: &[u8],
        mode: WriteMode,
    ) -> Result<(), FilesError> {
        let physical = self.physical_child(path, name);
        match mode {
            WriteMode::Whole => tokio::fs::write(&physical, data).await?,
            WriteMode::Patch { offset } => {
                let mut file = tokio::fs::OpenOptions::new()
                    .write(true)
                    .create(true)
                    .open(&physical)
                    .await?;
                file.seek(std::io::SeekFrom::Start(offset)).await?;
                file.write_all(data).await?;
                file.flush().await?;
            }
        }
        Ok(())
    }

    /// Create one directory; the parent must exist.
    pub async fn create_dir(&self, path: &VirtualPath, name: &str) -> Result<(), FilesError> {
        match tokio::fs::create_dir(self.physical_child(path, name)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(FilesError::AlreadyExists(path.join(name)))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn create_dir_all(&self, path: &VirtualPath) -> Result<(), FilesError> {
        tokio::fs::create_dir_all(self.physical(path)).await?;
        Ok(())
    }

    pub async fn rename(
        &self,
        path: &VirtualPath,
        name: &str,
        new_name: &str,
    ) -> Result<(), FilesError> {
        let from = self.physical_child(path, name);
        let to = self.physical_child(path, new_name);
        match tokio::fs::rename(&from, &to).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(FilesError::NotFound(path.join(name)))
            }
            Err(err) => return Err(err.into()),
        }
        sidecar::rename_entry(&self.physical(path), name, new_name).await
    }

    /// Remove a node, recursively for directories, and its sidecar entry.
    pub async fn delete(&self, path: &VirtualPath, name: &str) -> Result<(), FilesError> {
        let physical = self.physical_child(path, name);
        let meta = match tokio::fs::metadata(&physical).await {
            Ok(meta) => meta,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(FilesError::NotFound(path.join(name)))
            }
            Err(err) => return Err(err.into()),
        };
        if meta.is_dir() {
            tokio::fs::remove_dir_all(&physical).await?;
        } else {
            tokio::fs::remove_file(&physical).await?;
        }
        sidecar::remove_entry(&self.physical(path), name).await
    }

    /// Plain physical copy of one node (recursively for directories),
    /// carrying sidecar properties along. No propagation, no collision
    /// handling; callers resolve the destination name first.
    pub async fn copy_recursive(
        &self,
        from_dir: &VirtualPath,
        name: &str,
        to_tree: &Tree,
        to_dir: &VirtualPath,
        new_name: &str,
    ) -> Result<(), FilesError> {
        sidecar::copy_entry(
            &self.physical(from_dir),
            name,
            &to_tree.physical(to_dir),
            new_name,
        )
        .await?;

        let src = self.physical_child(from_dir, name);
        let dst = to_tree.physical_child(to_dir, new_name);
        let meta = match tokio::fs::metadata(&src).await {
            Ok(meta) => meta,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(FilesError::NotFound(from_dir.join(name)))
            }
            Err(err) => return Err(err.into()),
        };

        if meta.is_file() {
            tokio::fs::copy(&src, &dst).await?;
            return Ok(());
        }

        // Directory: walk with an explicit stack. Inner names do not change,
        // so inner sidecar files copy over verbatim.
        tokio::fs::create_dir_all(&dst).await?;
        let mut stack = vec![(src, dst)];
        while let Some((src_dir, dst_dir)) = stack.pop() {
            let mut read_dir = tokio::fs::read_dir(&src_dir).await?;
            while let Some(entry) = read_dir.next_entry().await? {
                let entry_meta = entry.metadata().await?;
                let target = dst_dir.join(entry.file_name());
                if entry_meta.is_dir() {
                    tokio::fs::create_dir_all(&target).await?;
                    stack.push((entry.path(), target));
                } else {
                    tokio::fs::copy(entry.path(), &target).await?;
                }
            }
        }
        Ok(())
    }

    /// Sum of all file sizes under the root, sidecar files excluded, hidden
    /// root entries (the trash folder) included.
    pub async fn total_size(&self) -> Result<u64, FilesError> {
        let mut total = 0u64;
        let mut stack = vec![self.root.clone()];
        while let Some(dir) = stack.pop() {
            let mut read_dir = match tokio::fs::read_dir(&dir).await {
                Ok(rd) => rd,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };
            while let Some(entry) = read_dir.next_entry().await? {
                if entry.file_name().to_string_lossy() == SIDECAR_FILE {
                    continue;
                }
                let meta = entry.metadata().await?;
                if meta.is_dir() {
                    stack.push(entry.path());
                } else {
                    total += meta.len();
                }
            }
        }
        Ok(total)
    }
}

fn node_from_meta(name: String, meta: &std::fs::Metadata) -> Node {
    let kind = if meta.is_dir() {
        NodeKind::Directory
    } else {
        NodeKind::File { size: meta.len() }
    };
    Node {
        name,
        kind,
        modified: meta.modified().ok().map(DateTime::<Utc>::from),
        shared: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn tree() -> (tempfile::TempDir, Tree) {
        let tmp = tempfile::tempdir().unwrap();
        let tree = Tree::new(tmp.path().join("root"));
        tree.ensure_root().await.unwrap();
        (tmp, tree)
    }

    #[tokio::test]
    async fn test_write_and_read_back() {
        let (_tmp, tree) = tree().await;
        let root = VirtualPath::root();
        tree.write_file(&root, "a.txt", b"hello", WriteMode::Whole)
            .await
            .unwrap();
        assert_eq!(tree.read(&root, "a.txt").await.unwrap(), b"hello");

        let node = tree.node(&root, "a.txt").await.unwrap().unwrap();
        assert!(node.is_file());
        assert_eq!(node.size(), 5);
    }

    #[tokio::test]
    async fn test_patch_write_at_offset() {
        let (_tmp, tree) = tree().await;
        let root = VirtualPath::root();
        tree.write_file(&root, "a.bin", b"0123456789", WriteMode::Whole)
            .await
            .unwrap();
        tree.write_file(&root, "a.bin", b"AB", WriteMode::Patch { offset: 3 })
            .await
            .unwrap();
        assert_eq!(tree.read(&root, "a.bin").await.unwrap(), b"012AB56789");
    }

    #[tokio::test]
    async fn test_children_sorted_bytewise_and_sidecar_hidden() {
        let (_tmp, tree) = tree().await;
        let root = VirtualPath::root();
        for name in ["b.txt", "A.txt", "a.txt", "Z"] {
            tree.write_file(&root, name, b"", WriteMode::Whole)
                .await
                .unwrap();
        }
        sidecar::update(tree.root(), "a.txt", |p| p.owner = Some("alice".into()))
            .await
            .unwrap();

        let names: Vec<String> = tree
            .children(&root)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.name)
            .collect();
        // uppercase sorts before lowercase in byte order
        assert_eq!(names, vec!["A.txt", "Z", "a.txt", "b.txt"]);
    }

    #[tokio::test]
    async fn test_hidden_root_entry_not_listed_but_exists() {
        let (_tmp, tree) = tree().await;
        let tree = tree.with_hidden_root(".trash");
        let root = VirtualPath::root();
        tree.create_dir(&root, ".trash").await.unwrap();
        tree.create_dir(&root, "docs").await.unwrap();

        let names: Vec<String> = tree
            .children(&root)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.name)
            .collect();
        assert_eq!(names, vec!["docs"]);
        assert!(tree.exists(&root, ".trash").await);
    }

    #[tokio::test]
    async fn test_search_recurses_case_insensitive() {
        let (_tmp, tree) = tree().await;
        let root = VirtualPath::root();
        tree.create_dir(&root, "docs").await.unwrap();
        tree.create_dir(&VirtualPath::new("/docs"), "deep")
            .await
            .unwrap();
        tree.write_file(&VirtualPath::new("/docs/deep"), "Report.txt", b"x", WriteMode::Whole)
            .await
            .unwrap();
        tree.write_file(&root, "other.md", b"x", WriteMode::Whole)
            .await
            .unwrap();

        let hits = tree.search(&root, "report").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.as_str(), "/docs/deep");
        assert_eq!(hits[0].1.name, "Report.txt");
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let (_tmp, tree) = tree().await;
        let err = tree.delete(&VirtualPath::root(), "ghost").await.unwrap_err();
        assert!(matches!(err, FilesError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_copy_recursive_carries_props_and_content() {
        let (_tmp, tree) = tree().await;
        let root = VirtualPath::root();
        tree.create_dir(&root, "src").await.unwrap();
        let src = VirtualPath::new("/src");
        tree.write_file(&src, "a.txt", b"data", WriteMode::Whole)
            .await
            .unwrap();
        sidecar::update(&tree.physical(&src), "a.txt", |p| {
            p.owner = Some("alice".into())
        })
        .await
        .unwrap();

        tree.copy_recursive(&root, "src", &tree.clone(), &root, "dst")
            .await
            .unwrap();

        let dst = VirtualPath::new("/dst");
        assert_eq!(tree.read(&dst, "a.txt").await.unwrap(), b"data");
        let props = sidecar::get(&tree.physical(&dst), "a.txt").await.unwrap();
        assert_eq!(props.owner.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_total_size_skips_sidecars() {
        let (_tmp, tree) = tree().await;
        let root = VirtualPath::root();
        tree.write_file(&root, "a.txt", b"12345", WriteMode::Whole)
            .await
            .unwrap();
        tree.create_dir(&root, "d").await.unwrap();
        tree.write_file(&VirtualPath::new("/d"), "b.txt", b"123", WriteMode::Whole)
            .await
            .unwrap();
        sidecar::update(tree.root(), "a.txt", |p| p.owner = Some("x".into()))
            .await
            .unwrap();

        assert_eq!(tree.total_size().await.unwrap(), 8);
    }
}
