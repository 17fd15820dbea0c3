//! Integration tests for the public-link registry.

mod common;

use common::{put_file, setup, vp, ALICE};
use vfs::prelude::*;

#[tokio::test]
async fn test_create_public_link_is_idempotent() {
    let (store, _tmp) = setup().await;
    put_file(&store, ALICE, "", "a.txt", b"payload").await;

    let first = store
        .create_public_link(ALICE, StorageType::Personal, &vp(""), "a.txt", 7, false)
        .await
        .unwrap();
    let second = store
        .create_public_link(ALICE, StorageType::Personal, &vp(""), "a.txt", 7, false)
        .await
        .unwrap();
    assert_eq!(first, second);
    assert!(first.starts_with("?/files-pub/"));
}

#[tokio::test]
async fn test_link_hash_resolves_to_payload() {
    let (store, _tmp) = setup().await;
    store
        .create_folder(ALICE, StorageType::Personal, &vp(""), "Docs")
        .await
        .unwrap();

    store
        .create_public_link(ALICE, StorageType::Personal, &vp("/Docs"), "report.pdf", 1234, false)
        .await
        .unwrap();

    let hash = common::item_hash(ALICE, StorageType::Personal, "/Docs", "report.pdf");
    let record = store.links().record_for_hash(&hash).expect("record missing");
    assert_eq!(record.owner, ALICE);
    assert_eq!(record.path, vp("/Docs"));
    assert_eq!(record.name, "report.pdf");
    assert_eq!(record.size, 1234);
    assert!(!record.is_folder);
}

#[tokio::test]
async fn test_delete_public_link_missing_is_noop_success() {
    let (store, _tmp) = setup().await;
    assert!(store
        .delete_public_link(ALICE, StorageType::Personal, &vp(""), "never-linked.txt")
        .await
        .unwrap());
}

#[tokio::test]
async fn test_delete_public_link_unpublishes() {
    let (store, _tmp) = setup().await;
    put_file(&store, ALICE, "", "a.txt", b"x").await;
    store
        .create_public_link(ALICE, StorageType::Personal, &vp(""), "a.txt", 1, false)
        .await
        .unwrap();

    let info = store
        .get_info(ALICE, StorageType::Personal, &vp(""), "a.txt")
        .await
        .unwrap();
    assert!(info.published);

    store
        .delete_public_link(ALICE, StorageType::Personal, &vp(""), "a.txt")
        .await
        .unwrap();
    let info = store
        .get_info(ALICE, StorageType::Personal, &vp(""), "a.txt")
        .await
        .unwrap();
    assert!(!info.published);
}

#[tokio::test]
async fn test_rename_migrates_public_link() {
    let (store, _tmp) = setup().await;
    put_file(&store, ALICE, "", "old.txt", b"x").await;
    store
        .create_public_link(ALICE, StorageType::Personal, &vp(""), "old.txt", 1, false)
        .await
        .unwrap();

    store
        .rename(ALICE, StorageType::Personal, &vp(""), "old.txt", "new.txt", false)
        .await
        .unwrap();

    assert!(!store
        .links()
        .is_published(ALICE, StorageType::Personal, &vp(""), "old.txt"));
    assert!(store
        .links()
        .is_published(ALICE, StorageType::Personal, &vp(""), "new.txt"));
}

#[tokio::test]
async fn test_rename_directory_migrates_links_underneath() {
    let (store, _tmp) = setup().await;
    store
        .create_folder(ALICE, StorageType::Personal, &vp(""), "Docs")
        .await
        .unwrap();
    put_file(&store, ALICE, "/Docs", "deep.txt", b"x").await;
    store
        .create_public_link(ALICE, StorageType::Personal, &vp("/Docs"), "deep.txt", 1, false)
        .await
        .unwrap();

    store
        .rename(ALICE, StorageType::Personal, &vp(""), "Docs", "Papers", false)
        .await
        .unwrap();

    assert!(store
        .links()
        .is_published(ALICE, StorageType::Personal, &vp("/Papers"), "deep.txt"));
}

#[tokio::test]
async fn test_hard_delete_directory_removes_links_underneath() {
    let (store, _tmp) = setup().await;
    store
        .create_folder(ALICE, StorageType::Personal, &vp(""), "Docs")
        .await
        .unwrap();
    put_file(&store, ALICE, "/Docs", "deep.txt", b"x").await;
    store
        .create_public_link(ALICE, StorageType::Personal, &vp("/Docs"), "deep.txt", 1, false)
        .await
        .unwrap();

    // soft delete drops the links under the folder already
    store
        .delete(
            ALICE,
            StorageType::Personal,
            &[vfs::store::ItemRef {
                path: vp(""),
                name: "Docs".to_string(),
            }],
        )
        .await
        .unwrap();

    let hash = common::item_hash(ALICE, StorageType::Personal, "/Docs", "deep.txt");
    assert!(store.links().record_for_hash(&hash).is_none());
}
