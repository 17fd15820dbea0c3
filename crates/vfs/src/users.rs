use std::collections::BTreeMap;
use std::path::PathBuf;

use common::prelude::FilesError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Per-user bookkeeping persisted alongside the storage tree.
///
/// `used_bytes` is the incrementally maintained quota cache; it is *written*
/// by the quota tracker's recompute entry point, never derived on read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub used_bytes: u64,
    /// Overrides the configured default space limit when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_limit_mb: Option<u64>,
}

/// JSON-file-backed user records.
pub struct UserStore {
    path: PathBuf,
    inner: RwLock<BTreeMap<String, UserRecord>>,
}

impl UserStore {
    pub async fn open(path: PathBuf) -> Result<Self, FilesError> {
        let inner = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            path,
            inner: RwLock::new(inner),
        })
    }

    pub fn record(&self, user: &str) -> UserRecord {
        self.inner.read().get(user).cloned().unwrap_or_default()
    }

    /// Tenant the user's corporate backend resolves through.
    pub fn tenant_of(&self, user: &str) -> String {
        let record = self.record(user);
        if record.tenant_id.is_empty() {
            "default".to_string()
        } else {
            record.tenant_id
        }
    }

    pub async fn set_tenant(&self, user: &str, tenant: &str) -> Result<(), FilesError> {
        self.update(user, |record| record.tenant_id = tenant.to_string())
            .await
    }

    pub async fn set_used_bytes(&self, user: &str, used: u64) -> Result<(), FilesError> {
        self.update(user, |record| record.used_bytes = used).await
    }

    pub async fn set_space_limit_mb(
        &self,
        user: &str,
        limit: Option<u64>,
    ) -> Result<(), FilesError> {
        self.update(user, |record| record.space_limit_mb = limit)
            .await
    }

    async fn update(
        &self,
        user: &str,
        apply: impl FnOnce(&mut UserRecord),
    ) -> Result<(), FilesError> {
        let bytes = {
            let mut inner = self.inner.write();
            apply(inner.entry(user.to_string()).or_default());
            serde_json::to_vec_pretty(&*inner)?
        };
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}
