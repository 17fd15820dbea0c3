use sha2::{Digest, Sha256};

use crate::path::VirtualPath;
use crate::storage::StorageType;

/// Number of hex characters in an identity hash. Short enough to embed in a
/// link, long enough that accidental collisions are not a practical concern
/// for per-deployment link counts.
const HASH_LEN: usize = 16;

/// Deterministic identity hash of an item location.
///
/// Public links and cached thumbnails are keyed by this hash; it is a pure
/// function of (owner, storage type, path, name) at the time of computation,
/// so any operation that changes an item's path or name must migrate the
/// records keyed by the old hash.
pub fn hash_id(owner: &str, storage: StorageType, path: &VirtualPath, name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(owner.as_bytes());
    hasher.update(b"\n");
    hasher.update(storage.as_str().as_bytes());
    hasher.update(b"\n");
    hasher.update(path.as_str().as_bytes());
    hasher.update(b"\n");
    hasher.update(name.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)[..HASH_LEN].to_string()
}
