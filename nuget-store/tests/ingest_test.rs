//! Ingestion: round-trips, overwrite policy, rejection paths and races

mod common;

use common::{create_test_setup, create_test_setup_with, nupkg, read_archive, temp_files_under, NupkgBuilder};
use nuget_store::{ErrorCode, RepositoryError};
use std::sync::Arc;

#[tokio::test]
async fn test_round_trip_bytes() {
    let setup = create_test_setup().await.unwrap();
    let bytes = NupkgBuilder::new("Contoso.Utils", "1.2.3")
        .description("helpers")
        .build();

    let metadata = setup.repo.ingest(&bytes, false).await.unwrap();
    assert_eq!(metadata.id, "Contoso.Utils");
    assert_eq!(metadata.version, "1.2.3");
    assert_eq!(metadata.description.as_deref(), Some("helpers"));
    assert_eq!(metadata.authors.as_deref(), Some("Test Author"));
    assert_eq!(metadata.download_count, 0);

    let stored = read_archive(&setup.repo, "contoso.utils", "1.2.3").await.unwrap();
    assert_eq!(stored, bytes);

    let expected_path = setup
        .root()
        .join("contoso.utils/1.2.3/Contoso.Utils.1.2.3.nupkg");
    assert!(expected_path.is_file());
    assert!(temp_files_under(setup.root()).is_empty());
}

#[tokio::test]
async fn test_duplicate_rejected_without_overwrite() {
    let setup = create_test_setup().await.unwrap();
    let first = NupkgBuilder::new("Foo", "1.0.0").payload("first").build();
    let second = NupkgBuilder::new("Foo", "1.0.0").payload("second").build();

    setup.repo.ingest(&first, false).await.unwrap();
    let err = setup.repo.ingest(&second, false).await.unwrap_err();

    assert_eq!(err.code(), ErrorCode::AlreadyExists);
    assert_eq!(read_archive(&setup.repo, "Foo", "1.0.0").await.unwrap(), first);
}

#[tokio::test]
async fn test_overwrite_replaces_archive_and_metadata() {
    let setup = create_test_setup().await.unwrap();
    let first = NupkgBuilder::new("Foo", "1.0.0").description("old").build();
    let second = NupkgBuilder::new("Foo", "1.0.0").description("new").build();

    setup.repo.ingest(&first, false).await.unwrap();
    setup.repo.ingest(&second, true).await.unwrap();

    assert_eq!(read_archive(&setup.repo, "Foo", "1.0.0").await.unwrap(), second);
    let metadata = setup.repo.get_metadata("Foo", "1.0.0").await.unwrap().unwrap();
    assert_eq!(metadata.description.as_deref(), Some("new"));
}

#[tokio::test]
async fn test_duplicate_detection_ignores_id_case() {
    let setup = create_test_setup().await.unwrap();
    setup.repo.ingest(&nupkg("Foo", "1.0.0"), false).await.unwrap();

    let err = setup.repo.ingest(&nupkg("FOO", "1.0.0"), false).await.unwrap_err();
    assert!(matches!(err, RepositoryError::AlreadyExists { .. }));
}

#[tokio::test]
async fn test_overwrite_with_other_casing_keeps_one_archive() {
    let setup = create_test_setup().await.unwrap();
    setup.repo.ingest(&nupkg("Foo", "1.0.0"), false).await.unwrap();
    let replacement = nupkg("FOO", "1.0.0");
    setup.repo.ingest(&replacement, true).await.unwrap();

    let files = setup
        .repo
        .layout()
        .archive_files(&setup.root().join("foo"))
        .await
        .unwrap();
    assert_eq!(files, vec![setup.root().join("foo/1.0.0/FOO.1.0.0.nupkg")]);
    assert_eq!(read_archive(&setup.repo, "foo", "1.0.0").await.unwrap(), replacement);
    assert_eq!(
        setup.repo.get_metadata("Foo", "1.0.0").await.unwrap().unwrap().id,
        "FOO"
    );
}

#[tokio::test]
async fn test_garbage_is_invalid_package() {
    let setup = create_test_setup().await.unwrap();

    let err = setup.repo.ingest(b"not an archive", false).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidPackage);

    let no_nuspec = common::build_zip(&[("readme.txt".to_string(), "hello".to_string())]);
    let err = setup.repo.ingest(&no_nuspec, false).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidPackage);

    assert!(setup.repo.layout().package_dirs().await.unwrap().is_empty());
    assert_eq!(setup.repo.cached_entries(), 0);
}

#[tokio::test]
async fn test_empty_identity_is_invalid_identity() {
    let setup = create_test_setup().await.unwrap();

    let err = setup.repo.ingest(&nupkg("", "1.0.0"), false).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidIdentity);

    let err = setup.repo.ingest(&nupkg("Foo", ""), false).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidIdentity);

    assert!(setup.repo.layout().package_dirs().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_path_like_ids_never_leave_the_root() {
    let setup = create_test_setup().await.unwrap();

    for id in ["../escape", "a/b", "..", "/abs"] {
        let err = setup.repo.ingest(&nupkg(id, "1.0.0"), false).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidIdentity, "id {id:?}");
    }

    assert!(!setup.root().parent().unwrap().join("escape").exists());
    assert!(setup.repo.layout().package_dirs().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_size_limit() {
    let setup = create_test_setup_with(|c| c.with_max_package_size_mb(0))
        .await
        .unwrap();

    let err = setup.repo.ingest(&nupkg("Foo", "1.0.0"), false).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::TooLarge);

    let bytes = nupkg("Foo", "1.0.0");
    let err = setup.repo.ingest_reader(&bytes[..], false).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::TooLarge);
}

#[tokio::test]
async fn test_ingest_from_file_stream() {
    let setup = create_test_setup().await.unwrap();
    let bytes = nupkg("Streamed", "3.0.0");
    let upload = setup.root().join("upload.bin");
    std::fs::write(&upload, &bytes).unwrap();

    let file = tokio::fs::File::open(&upload).await.unwrap();
    let metadata = setup.repo.ingest_reader(file, false).await.unwrap();

    assert_eq!(metadata.id, "Streamed");
    assert_eq!(read_archive(&setup.repo, "Streamed", "3.0.0").await.unwrap(), bytes);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_ingest_has_one_winner() {
    let setup = create_test_setup().await.unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let repo = Arc::clone(&setup.repo);
            let bytes = NupkgBuilder::new("Race", "1.0.0")
                .payload(&format!("writer {i}"))
                .build();
            tokio::spawn(async move { (bytes.clone(), repo.ingest(&bytes, false).await) })
        })
        .collect();

    let mut winners = Vec::new();
    for handle in handles {
        let (bytes, result) = handle.await.unwrap();
        match result {
            Ok(_) => winners.push(bytes),
            Err(e) => assert_eq!(e.code(), ErrorCode::AlreadyExists),
        }
    }

    assert_eq!(winners.len(), 1);
    assert_eq!(read_archive(&setup.repo, "Race", "1.0.0").await.unwrap(), winners[0]);
    assert!(temp_files_under(setup.root()).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_distinct_ingests_all_succeed() {
    let setup = create_test_setup().await.unwrap();

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let repo = Arc::clone(&setup.repo);
            tokio::spawn(async move {
                repo.ingest(&nupkg("Parallel", &format!("1.0.{i}")), false)
                    .await
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let versions = setup.repo.list_versions("parallel").await.unwrap();
    assert_eq!(versions.len(), 16);
    assert_eq!(versions[0].version, "1.0.15");
}
