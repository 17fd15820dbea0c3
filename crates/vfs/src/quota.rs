use std::sync::Arc;

use common::prelude::{FilesError, StorageType};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::router::Router;
use crate::users::UserStore;

/// Used/limit byte counters for one user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    pub used: u64,
    /// 0 means unlimited.
    pub limit: u64,
}

/// Per-user quota accounting over the personal backend.
///
/// `used` is a cached counter persisted on the user record, not recomputed
/// on read; [`update_used_space`](QuotaTracker::update_used_space) is the
/// recompute entry point and runs after every operation that can change
/// personal-backend byte usage.
pub struct QuotaTracker {
    users: Arc<UserStore>,
    router: Arc<Router>,
    default_limit_mb: u64,
}

impl QuotaTracker {
    pub fn new(config: &Config, users: Arc<UserStore>, router: Arc<Router>) -> Self {
        Self {
            users,
            router,
            default_limit_mb: config.user_space_limit_mb,
        }
    }

    fn limit_bytes(&self, user: &str) -> u64 {
        let record = self.users.record(user);
        record.space_limit_mb.unwrap_or(self.default_limit_mb) * 1024 * 1024
    }

    /// Read the cached counters. Only the personal backend is metered;
    /// other storage types report zero usage and no limit.
    pub fn get_quota(&self, user: &str, storage: StorageType) -> Quota {
        if storage.physical() != StorageType::Personal {
            return Quota::default();
        }
        Quota {
            used: self.users.record(user).used_bytes,
            limit: self.limit_bytes(user),
        }
    }

    /// Whether `size` more bytes would still fit.
    pub fn check_quota(&self, user: &str, storage: StorageType, size: u64) -> bool {
        let quota = self.get_quota(user, storage);
        quota.limit == 0 || quota.used + size <= quota.limit
    }

    /// Recompute `used` from the personal backend (trash included, sidecars
    /// excluded) and persist it to the user record.
    pub async fn update_used_space(&self, user: &str) -> Result<u64, FilesError> {
        let used = self.router.personal_tree(user).total_size().await?;
        self.users.set_used_bytes(user, used).await?;
        tracing::debug!(user, used, "recomputed used space");
        Ok(used)
    }
}
