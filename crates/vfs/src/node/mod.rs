//! The node tree: directories and files of one physical backend, plus the
//! per-directory sidecar carrying node properties.
//!
//! A [`Node`] is a tagged variant with explicit capability queries
//! (`is_dir`, `is_shared`, `is_inherited`); callers branch on capability,
//! never on a concrete runtime type.

pub mod sidecar;
mod tree;

pub use sidecar::{NodeProps, SIDECAR_FILE};
pub use tree::{Tree, WriteMode};

use chrono::{DateTime, Utc};

use crate::shares::Access;

/// Share provenance attached to nodes surfaced through a share mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedInfo {
    pub group_id: i64,
    pub initiator: String,
    /// True when the node is reachable via a share chain rather than being
    /// a genuinely foreign-owned direct share.
    pub inherited: bool,
    pub access: Access,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    File { size: u64 },
    Directory,
}

/// One entry of the hierarchical namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    pub modified: Option<DateTime<Utc>>,
    pub shared: Option<SharedInfo>,
}

impl Node {
    pub fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory)
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, NodeKind::File { .. })
    }

    pub fn is_shared(&self) -> bool {
        self.shared.is_some()
    }

    pub fn is_inherited(&self) -> bool {
        self.shared.as_ref().map(|s| s.inherited).unwrap_or(false)
    }

    pub fn size(&self) -> u64 {
        match self.kind {
            NodeKind::File { size } => size,
            NodeKind::Directory => 0,
        }
    }

    /// Mark this node as surfaced through a share.
    pub fn with_shared(mut self, info: SharedInfo) -> Self {
        self.shared = Some(info);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_queries() {
        let file = Node {
            name: "a.txt".into(),
            kind: NodeKind::File { size: 10 },
            modified: None,
            shared: None,
        };
        assert!(file.is_file());
        assert!(!file.is_dir());
        assert!(!file.is_shared());
        assert!(!file.is_inherited());
        assert_eq!(file.size(), 10);

        let dir = Node {
            name: "docs".into(),
            kind: NodeKind::Directory,
            modified: None,
            shared: None,
        }
        .with_shared(SharedInfo {
            group_id: 0,
            initiator: "bob".into(),
            inherited: true,
            access: Access::Write,
        });
        assert!(dir.is_dir());
        assert!(dir.is_shared());
        assert!(dir.is_inherited());
        assert_eq!(dir.size(), 0);
    }
}
