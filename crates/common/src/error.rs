use crate::path::VirtualPath;

/// The failure taxonomy of the storage core.
///
/// Structural errors (`NotFound`, `AlreadyExists`, `Io`) and policy
/// rejections (`NotPermitted`, the shared-provenance variants) are distinct
/// so callers can tell "nothing happened" from "operation rejected".
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    #[error("not found: {0}")]
    NotFound(VirtualPath),
    #[error("already exists: {0}")]
    AlreadyExists(VirtualPath),
    #[error("not permitted")]
    NotPermitted,
    #[error("cannot delete a shared item")]
    CantDeleteSharedItem,
    #[error("cannot copy or move an item to itself: {0}")]
    CannotCopyOrMoveItemToItself(VirtualPath),
    #[error("cannot move a shared file into a shared folder")]
    NotPossibleToMoveSharedFileToSharedFolder,
    #[error("cannot move a shared file into corporate storage")]
    NotPossibleToMoveSharedFileToCorporateStorage,
    #[error("quota exceeded")]
    QuotaExceeded,
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed record store: {0}")]
    Records(#[from] serde_json::Error),
    #[error("{0}")]
    Default(#[from] anyhow::Error),
}

impl FilesError {
    /// Whether this failure is a policy rejection rather than a structural
    /// miss or an environment error.
    pub fn is_policy(&self) -> bool {
        matches!(
            self,
            FilesError::NotPermitted
                | FilesError::CantDeleteSharedItem
                | FilesError::CannotCopyOrMoveItemToItself(_)
                | FilesError::NotPossibleToMoveSharedFileToSharedFolder
                | FilesError::NotPossibleToMoveSharedFileToCorporateStorage
                | FilesError::QuotaExceeded
        )
    }
}
