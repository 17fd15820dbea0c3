use std::collections::BTreeMap;

use serde_json::Value;

/// Well-known extended-property keys.
pub mod keys {
    /// Pre-delete location of a soft-deleted item, `parent path + / + name`.
    /// Present iff the node currently sits in the trash; consumed on restore.
    pub const TRASH_ORIGINAL_PATH: &str = "TrashOriginalPath";
    /// Marks content encrypted for a specific recipient set; such items must
    /// not be relocated into a shared context.
    pub const INITIALIZATION_VECTOR: &str = "InitializationVector";
    /// Access level injected into items listed through a share mount.
    pub const SHARED_WITH_ME_ACCESS: &str = "SharedWithMeAccess";
}

/// Generic key/value metadata attached to a node.
pub type ExtendedProps = BTreeMap<String, Value>;

/// Apply an update map onto existing props: a `null` value deletes the key,
/// anything else inserts or replaces it.
pub fn merge(current: &mut ExtendedProps, update: ExtendedProps) {
    for (key, value) in update {
        if value.is_null() {
            current.remove(&key);
        } else {
            current.insert(key, value);
        }
    }
}
