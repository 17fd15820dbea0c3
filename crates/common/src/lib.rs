/**
 * Failure taxonomy shared by every component.
 */
pub mod error;
/**
 * Deterministic identity hashing for public links
 *  and thumbnail cache keys.
 */
pub mod hash;
/**
 * The FileItem DTO handed to callers, item actions,
 *  and the internet-shortcut file format.
 */
pub mod item;
/**
 * Canonical virtual path value type.
 */
pub mod path;
/**
 * Extended key/value properties attached to nodes.
 */
pub mod props;
/**
 * Storage backend types and the virtual views over them.
 */
pub mod storage;

pub mod prelude {
    pub use crate::error::FilesError;
    pub use crate::hash::hash_id;
    pub use crate::item::{FileItem, ItemAction};
    pub use crate::path::VirtualPath;
    pub use crate::props::ExtendedProps;
    pub use crate::storage::StorageType;
}
