use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The storage backends a user's namespace is assembled from.
///
/// `Personal` and `Corporate` are physical roots. `Shared` is the aggregated
/// "shared with me" view resolved through share records. `Trash` and
/// `Favorites` are presentation-level views over the personal backend, not
/// separate physical roots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    Personal,
    Corporate,
    Shared,
    Trash,
    Favorites,
}

impl StorageType {
    /// The backend that physically holds the bytes for this view.
    pub fn physical(self) -> StorageType {
        match self {
            StorageType::Trash | StorageType::Favorites => StorageType::Personal,
            other => other,
        }
    }

    /// Whether this is a presentation-level view rather than a physical root.
    pub fn is_virtual(self) -> bool {
        matches!(self, StorageType::Trash | StorageType::Favorites)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StorageType::Personal => "personal",
            StorageType::Corporate => "corporate",
            StorageType::Shared => "shared",
            StorageType::Trash => "trash",
            StorageType::Favorites => "favorites",
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageType {
    type Err = UnknownStorageType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "personal" => Ok(StorageType::Personal),
            "corporate" => Ok(StorageType::Corporate),
            "shared" => Ok(StorageType::Shared),
            "trash" => Ok(StorageType::Trash),
            "favorites" => Ok(StorageType::Favorites),
            other => Err(UnknownStorageType(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown storage type: {0}")]
pub struct UnknownStorageType(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_views_map_to_personal() {
        assert_eq!(StorageType::Trash.physical(), StorageType::Personal);
        assert_eq!(StorageType::Favorites.physical(), StorageType::Personal);
        assert_eq!(StorageType::Corporate.physical(), StorageType::Corporate);
        assert!(StorageType::Trash.is_virtual());
        assert!(!StorageType::Shared.is_virtual());
    }

    #[test]
    fn test_round_trip_str() {
        for t in [
            StorageType::Personal,
            StorageType::Corporate,
            StorageType::Shared,
            StorageType::Trash,
            StorageType::Favorites,
        ] {
            assert_eq!(t.as_str().parse::<StorageType>().unwrap(), t);
        }
        assert!("cloud".parse::<StorageType>().is_err());
    }
}
