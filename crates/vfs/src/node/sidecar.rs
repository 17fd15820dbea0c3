//! Per-directory sidecar property files.
//!
//! Each physical directory owns one hidden JSON file mapping child name to
//! that child's properties (owner, published flag, display name, extended
//! props). The sidecar is invisible to listings and excluded from quota
//! accounting.

use std::collections::BTreeMap;
use std::path::Path;

use common::prelude::{ExtendedProps, FilesError};
use serde::{Deserialize, Serialize};

pub const SIDECAR_FILE: &str = ".properties.json";

/// Properties of one node, stored in its parent directory's sidecar.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NodeProps {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
    /// Display name; only shortcuts ever set it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extended_props: ExtendedProps,
}

type DirProps = BTreeMap<String, NodeProps>;

async fn load(dir: &Path) -> Result<DirProps, FilesError> {
    match tokio::fs::read(dir.join(SIDECAR_FILE)).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(DirProps::new()),
        Err(err) => Err(err.into()),
    }
}

async fn save(dir: &Path, props: &DirProps) -> Result<(), FilesError> {
    let path = dir.join(SIDECAR_FILE);
    if props.is_empty() {
        // last entry gone, drop the sidecar itself
        let _ = tokio::fs::remove_file(&path).await;
        return Ok(());
    }
    tokio::fs::write(&path, serde_json::to_vec_pretty(props)?).await?;
    Ok(())
}

/// Properties of one child, defaulting when never set.
pub async fn get(dir: &Path, name: &str) -> Result<NodeProps, FilesError> {
    Ok(load(dir).await?.get(name).cloned().unwrap_or_default())
}

/// Read-modify-write one child's properties.
pub async fn update(
    dir: &Path,
    name: &str,
    apply: impl FnOnce(&mut NodeProps),
) -> Result<(), FilesError> {
    let mut props = load(dir).await?;
    apply(props.entry(name.to_string()).or_default());
    save(dir, &props).await
}

pub async fn remove_entry(dir: &Path, name: &str) -> Result<(), FilesError> {
    let mut props = load(dir).await?;
    if props.remove(name).is_some() {
        save(dir, &props).await?;
    }
    Ok(())
}

pub async fn rename_entry(dir: &Path, name: &str, new_name: &str) -> Result<(), FilesError> {
    let mut props = load(dir).await?;
    if let Some(entry) = props.remove(name) {
        props.insert(new_name.to_string(), entry);
        save(dir, &props).await?;
    }
    Ok(())
}

/// Carry a node's properties to its copy in another directory.
pub async fn copy_entry(
    from_dir: &Path,
    name: &str,
    to_dir: &Path,
    new_name: &str,
) -> Result<(), FilesError> {
    let entry = get(from_dir, name).await?;
    if entry == NodeProps::default() {
        return Ok(());
    }
    let mut props = load(to_dir).await?;
    props.insert(new_name.to_string(), entry);
    save(to_dir, &props).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_update_get_remove() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();

        update(dir, "a.txt", |p| {
            p.owner = Some("alice".into());
            p.extended_props.insert("Color".into(), json!("red"));
        })
        .await
        .unwrap();

        let props = get(dir, "a.txt").await.unwrap();
        assert_eq!(props.owner.as_deref(), Some("alice"));
        assert_eq!(props.extended_props.get("Color"), Some(&json!("red")));

        // unknown children default
        assert_eq!(get(dir, "b.txt").await.unwrap(), NodeProps::default());

        remove_entry(dir, "a.txt").await.unwrap();
        assert_eq!(get(dir, "a.txt").await.unwrap(), NodeProps::default());
    }

    #[tokio::test]
    async fn test_rename_and_copy_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let from = tmp.path().join("from");
        let to = tmp.path().join("to");
        tokio::fs::create_dir_all(&from).await.unwrap();
        tokio::fs::create_dir_all(&to).await.unwrap();

        update(&from, "old", |p| p.owner = Some("alice".into()))
            .await
            .unwrap();

        rename_entry(&from, "old", "new").await.unwrap();
        assert_eq!(get(&from, "old").await.unwrap(), NodeProps::default());
        assert_eq!(
            get(&from, "new").await.unwrap().owner.as_deref(),
            Some("alice")
        );

        copy_entry(&from, "new", &to, "copied").await.unwrap();
        assert_eq!(
            get(&to, "copied").await.unwrap().owner.as_deref(),
            Some("alice")
        );
    }
}
