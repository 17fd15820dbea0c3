//! Integration tests for the copy/move engine: collision resolution,
//! self-target rejection and auxiliary-record migration.

mod common;

use common::{names, put_file, setup, vp, ALICE};
use tokio::io::AsyncReadExt;
use vfs::prelude::*;

#[tokio::test]
async fn test_copy_directory_with_rename() {
    let (store, _tmp) = setup().await;
    store
        .create_folder(ALICE, StorageType::Personal, &vp(""), "Docs")
        .await
        .unwrap();
    put_file(&store, ALICE, "/Docs", "a.txt", b"content").await;
    store
        .create_folder(ALICE, StorageType::Personal, &vp(""), "Archive")
        .await
        .unwrap();

    let found = store
        .copy(
            ALICE,
            StorageType::Personal,
            StorageType::Personal,
            &vp(""),
            &vp("/Archive"),
            "Docs",
            Some("Docs2"),
        )
        .await
        .unwrap();
    assert!(found);

    assert_eq!(
        names(&store, ALICE, StorageType::Personal, "/Archive/Docs2").await,
        vec!["a.txt"]
    );
    // source untouched
    assert_eq!(
        names(&store, ALICE, StorageType::Personal, "/Docs").await,
        vec!["a.txt"]
    );
}

#[tokio::test]
async fn test_nested_copy_resolves_collisions_independently() {
    let (store, _tmp) = setup().await;
    store
        .create_folder(ALICE, StorageType::Personal, &vp(""), "Docs")
        .await
        .unwrap();
    put_file(&store, ALICE, "/Docs", "a.txt", b"from docs").await;
    store
        .create_folder(ALICE, StorageType::Personal, &vp(""), "Archive/Docs2")
        .await
        .unwrap();
    put_file(&store, ALICE, "/Archive/Docs2", "a.txt", b"already here").await;

    // the top-level naming decision is the caller's; the nested collision is
    // resolved per child without affecting it
    store
        .copy(
            ALICE,
            StorageType::Personal,
            StorageType::Personal,
            &vp(""),
            &vp("/Archive"),
            "Docs",
            Some("Docs2"),
        )
        .await
        .unwrap();

    assert_eq!(
        names(&store, ALICE, StorageType::Personal, "/Archive/Docs2").await,
        vec!["a (1).txt", "a.txt"]
    );

    let mut buf = Vec::new();
    store
        .read(ALICE, StorageType::Personal, &vp("/Archive/Docs2"), "a (1).txt")
        .await
        .unwrap()
        .read_to_end(&mut buf)
        .await
        .unwrap();
    assert_eq!(buf, b"from docs");
}

#[tokio::test]
async fn test_copy_missing_source_is_noop_false() {
    let (store, _tmp) = setup().await;
    store
        .create_folder(ALICE, StorageType::Personal, &vp(""), "Archive")
        .await
        .unwrap();

    let found = store
        .copy(
            ALICE,
            StorageType::Personal,
            StorageType::Personal,
            &vp(""),
            &vp("/Archive"),
            "ghost.txt",
            None,
        )
        .await
        .unwrap();
    assert!(!found);
}

#[tokio::test]
async fn test_copy_into_missing_destination_is_not_found() {
    let (store, _tmp) = setup().await;
    put_file(&store, ALICE, "", "a.txt", b"x").await;

    let err = store
        .copy(
            ALICE,
            StorageType::Personal,
            StorageType::Personal,
            &vp(""),
            &vp("/nope"),
            "a.txt",
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FilesError::NotFound(_)));
}

#[tokio::test]
async fn test_self_move_rejected_with_slash_and_case_noise() {
    let (store, _tmp) = setup().await;
    store
        .create_folder(ALICE, StorageType::Personal, &vp(""), "Docs")
        .await
        .unwrap();
    put_file(&store, ALICE, "/Docs", "a.txt", b"x").await;

    for variant in ["/Docs", "/Docs/", "/docs", "/DOCS/"] {
        let err = store
            .move_item(
                ALICE,
                StorageType::Personal,
                StorageType::Personal,
                &vp("/Docs"),
                &vp(variant),
                "a.txt",
                None,
            )
            .await
            .unwrap_err();
        assert!(
            matches!(err, FilesError::CannotCopyOrMoveItemToItself(_)),
            "variant {variant} should be rejected"
        );
    }
    // nothing moved
    assert!(store
        .is_file_exists(ALICE, StorageType::Personal, &vp("/Docs"), "a.txt", false)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_move_directory_into_descendant_rejected() {
    let (store, _tmp) = setup().await;
    store
        .create_folder(ALICE, StorageType::Personal, &vp(""), "Docs/inner")
        .await
        .unwrap();

    let err = store
        .move_item(
            ALICE,
            StorageType::Personal,
            StorageType::Personal,
            &vp(""),
            &vp("/Docs/inner"),
            "Docs",
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FilesError::CannotCopyOrMoveItemToItself(_)));

    // moving into the directory itself is just as impossible
    let err = store
        .move_item(
            ALICE,
            StorageType::Personal,
            StorageType::Personal,
            &vp(""),
            &vp("/Docs"),
            "Docs",
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FilesError::CannotCopyOrMoveItemToItself(_)));
}

#[tokio::test]
async fn test_move_deletes_source_and_keeps_content() {
    let (store, _tmp) = setup().await;
    store
        .create_folder(ALICE, StorageType::Personal, &vp(""), "Docs")
        .await
        .unwrap();
    store
        .create_folder(ALICE, StorageType::Personal, &vp(""), "Archive")
        .await
        .unwrap();
    put_file(&store, ALICE, "/Docs", "a.txt", b"payload").await;

    store
        .move_item(
            ALICE,
            StorageType::Personal,
            StorageType::Personal,
            &vp("/Docs"),
            &vp("/Archive"),
            "a.txt",
            None,
        )
        .await
        .unwrap();

    assert!(names(&store, ALICE, StorageType::Personal, "/Docs")
        .await
        .is_empty());
    let mut buf = Vec::new();
    store
        .read(ALICE, StorageType::Personal, &vp("/Archive"), "a.txt")
        .await
        .unwrap()
        .read_to_end(&mut buf)
        .await
        .unwrap();
    assert_eq!(buf, b"payload");
}

#[tokio::test]
async fn test_move_migrates_public_link_and_favorites() {
    let (store, _tmp) = setup().await;
    store
        .create_folder(ALICE, StorageType::Personal, &vp(""), "Docs")
        .await
        .unwrap();
    store
        .create_folder(ALICE, StorageType::Personal, &vp(""), "Archive")
        .await
        .unwrap();
    put_file(&store, ALICE, "/Docs", "a.txt", b"payload").await;

    store
        .create_public_link(ALICE, StorageType::Personal, &vp("/Docs"), "a.txt", 7, false)
        .await
        .unwrap();
    store
        .favorites()
        .add(ALICE, StorageType::Personal, vp("/Docs/a.txt"))
        .await
        .unwrap();

    store
        .move_item(
            ALICE,
            StorageType::Personal,
            StorageType::Personal,
            &vp("/Docs"),
            &vp("/Archive"),
            "a.txt",
            None,
        )
        .await
        .unwrap();

    // the registry entry was re-keyed, not orphaned
    assert!(!store
        .links()
        .is_published(ALICE, StorageType::Personal, &vp("/Docs"), "a.txt"));
    assert!(store
        .links()
        .is_published(ALICE, StorageType::Personal, &vp("/Archive"), "a.txt"));

    let favorites = store.favorites().list_for(ALICE);
    assert_eq!(favorites.len(), 1);
    assert_eq!(favorites[0].full_path, vp("/Archive/a.txt"));
}

#[tokio::test]
async fn test_copy_does_not_migrate_links_but_restamps_owner() {
    let (store, _tmp) = setup().await;
    store
        .create_folder(ALICE, StorageType::Personal, &vp(""), "Docs")
        .await
        .unwrap();
    put_file(&store, ALICE, "/Docs", "a.txt", b"payload").await;
    store
        .create_public_link(ALICE, StorageType::Personal, &vp("/Docs"), "a.txt", 7, false)
        .await
        .unwrap();

    store
        .copy(
            ALICE,
            StorageType::Personal,
            StorageType::Personal,
            &vp("/Docs"),
            &vp(""),
            "a.txt",
            Some("b.txt"),
        )
        .await
        .unwrap();

    // the original stays published, the copy is not
    assert!(store
        .links()
        .is_published(ALICE, StorageType::Personal, &vp("/Docs"), "a.txt"));
    assert!(!store
        .links()
        .is_published(ALICE, StorageType::Personal, &vp(""), "b.txt"));

    let info = store
        .get_info(ALICE, StorageType::Personal, &vp(""), "b.txt")
        .await
        .unwrap();
    assert_eq!(info.owner, ALICE);
}

#[tokio::test]
async fn test_move_directory_migrates_nested_links() {
    let (store, _tmp) = setup().await;
    store
        .create_folder(ALICE, StorageType::Personal, &vp(""), "Docs/sub")
        .await
        .unwrap();
    put_file(&store, ALICE, "/Docs/sub", "deep.txt", b"x").await;
    store
        .create_public_link(
            ALICE,
            StorageType::Personal,
            &vp("/Docs/sub"),
            "deep.txt",
            1,
            false,
        )
        .await
        .unwrap();
    store
        .create_folder(ALICE, StorageType::Personal, &vp(""), "Elsewhere")
        .await
        .unwrap();

    store
        .move_item(
            ALICE,
            StorageType::Personal,
            StorageType::Personal,
            &vp(""),
            &vp("/Elsewhere"),
            "Docs",
            None,
        )
        .await
        .unwrap();

    assert!(store.links().is_published(
        ALICE,
        StorageType::Personal,
        &vp("/Elsewhere/Docs/sub"),
        "deep.txt"
    ));
}

#[tokio::test]
async fn test_history_sibling_copied_alongside() {
    let (store, _tmp) = setup().await;
    store
        .create_folder(ALICE, StorageType::Personal, &vp(""), "Docs")
        .await
        .unwrap();
    store
        .create_folder(ALICE, StorageType::Personal, &vp(""), "Archive")
        .await
        .unwrap();
    put_file(&store, ALICE, "/Docs", "report.txt", b"v3").await;
    store
        .create_folder(ALICE, StorageType::Personal, &vp("/Docs"), "report.txt.hist")
        .await
        .unwrap();
    put_file(&store, ALICE, "/Docs/report.txt.hist", "v1", b"old").await;

    store
        .copy(
            ALICE,
            StorageType::Personal,
            StorageType::Personal,
            &vp("/Docs"),
            &vp("/Archive"),
            "report.txt",
            None,
        )
        .await
        .unwrap();

    // the companion is hidden from listings but travelled along
    assert_eq!(
        names(&store, ALICE, StorageType::Personal, "/Archive").await,
        vec!["report.txt"]
    );
    assert!(store
        .is_file_exists(
            ALICE,
            StorageType::Personal,
            &vp("/Archive"),
            "report.txt.hist",
            false
        )
        .await
        .unwrap());
    assert_eq!(
        names(&store, ALICE, StorageType::Personal, "/Archive/report.txt.hist").await,
        vec!["v1"]
    );
}

#[tokio::test]
async fn test_move_between_personal_and_corporate() {
    let (store, _tmp) = setup().await;
    put_file(&store, ALICE, "", "a.txt", b"0123456789").await;
    assert_eq!(store.get_quota(ALICE, StorageType::Personal).used, 10);

    store
        .move_item(
            ALICE,
            StorageType::Personal,
            StorageType::Corporate,
            &vp(""),
            &vp(""),
            "a.txt",
            None,
        )
        .await
        .unwrap();

    assert!(!store
        .is_file_exists(ALICE, StorageType::Personal, &vp(""), "a.txt", false)
        .await
        .unwrap());
    assert!(store
        .is_file_exists(ALICE, StorageType::Corporate, &vp(""), "a.txt", false)
        .await
        .unwrap());
    // bytes left the metered backend
    assert_eq!(store.get_quota(ALICE, StorageType::Personal).used, 0);
}
