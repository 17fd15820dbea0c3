//! Shared helpers for the storage-engine integration tests.
#![allow(dead_code)]

use tempfile::TempDir;
use vfs::prelude::*;

pub const ALICE: &str = "alice";
pub const BOB: &str = "bob";

pub fn vp(raw: &str) -> VirtualPath {
    VirtualPath::new(raw)
}

pub async fn setup() -> (FileStore, TempDir) {
    setup_with(|_| {}).await
}

/// Opt-in tracing for debugging a failing test: run with RUST_LOG=debug.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

pub async fn setup_with(tweak: impl FnOnce(&mut Config)) -> (FileStore, TempDir) {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let mut config = Config {
        data_dir: tmp.path().join("data"),
        ..Config::default()
    };
    tweak(&mut config);
    let store = FileStore::open(config).await.unwrap();
    (store, tmp)
}

/// Create a file with `overwrite = true` under the personal backend.
pub async fn put_file(store: &FileStore, user: &str, dir: &str, name: &str, data: &[u8]) {
    let created = store
        .create(
            user,
            StorageType::Personal,
            &vp(dir),
            name,
            data,
            true,
            WriteMode::Whole,
            None,
        )
        .await
        .unwrap();
    assert!(created, "failed to create {dir}/{name}");
}

/// Identity hash of an item location, as the engine computes it.
pub fn item_hash(user: &str, storage: StorageType, dir: &str, name: &str) -> String {
    hash_id(user, storage, &vp(dir), name)
}

/// Names of a listing, in returned order.
pub async fn names(store: &FileStore, user: &str, storage: StorageType, dir: &str) -> Vec<String> {
    store
        .list(user, storage, &vp(dir), ListOptions::default())
        .await
        .unwrap()
        .into_iter()
        .map(|item| item.id)
        .collect()
}
