//! Integration tests for the media registry cache.

mod common;

use canclip_core::{MediaId, MediaKind};
use canclip_transfer::{MediaRegistry, RegistryError, UploadPipeline};

async fn upload_three(pipeline: &UploadPipeline) -> Vec<MediaId> {
    let mut ids = Vec::new();
    for name in ["first", "second", "third"] {
        let report = pipeline
            .upload(name, MediaKind::Video, &common::fixture_payload(10))
            .await
            .expect("upload should succeed");
        ids.push(report.media_id);
    }
    ids
}

#[tokio::test]
async fn media_registry_tests_refresh_keeps_backend_order() {
    let backend = common::fixture_backend();
    let pipeline = UploadPipeline::new(backend.clone(), 4).expect("valid chunk size");
    let ids = upload_three(&pipeline).await;
    let registry = MediaRegistry::new(backend);

    assert_eq!(registry.refresh().await.expect("refresh should succeed"), 3);
    let listed: Vec<MediaId> = registry.snapshot().iter().map(|d| d.id.clone()).collect();
    assert_eq!(listed, ids);
}

#[tokio::test]
async fn media_registry_tests_delete_refreshes_cache() {
    let backend = common::fixture_backend();
    let pipeline = UploadPipeline::new(backend.clone(), 4).expect("valid chunk size");
    let ids = upload_three(&pipeline).await;
    let registry = MediaRegistry::new(backend.clone());
    registry.refresh().await.expect("refresh should succeed");

    registry.delete(&ids[1]).await.expect("delete should succeed");

    assert_eq!(registry.len(), 2);
    assert!(registry.find(&ids[1]).is_none());
    assert_eq!(backend.media_count(), 2);
}

#[tokio::test]
async fn media_registry_tests_failed_delete_leaves_cache_untouched() {
    let backend = common::fixture_backend();
    let pipeline = UploadPipeline::new(backend.clone(), 4).expect("valid chunk size");
    let ids = upload_three(&pipeline).await;
    let registry = MediaRegistry::new(backend.clone());
    registry.refresh().await.expect("refresh should succeed");
    let before = registry.snapshot();

    backend.reject_delete("not owner");
    let error = registry
        .delete(&ids[0])
        .await
        .expect_err("rejected delete should fail");

    match error {
        RegistryError::Delete { media_id, reason } => {
            assert_eq!(media_id, ids[0]);
            assert_eq!(reason, "not owner");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(*registry.snapshot(), *before);
    assert_eq!(backend.media_count(), 3);
}

#[tokio::test]
async fn media_registry_tests_failed_listing_keeps_previous_list() {
    let backend = common::fixture_backend();
    let pipeline = UploadPipeline::new(backend.clone(), 4).expect("valid chunk size");
    upload_three(&pipeline).await;
    let registry = MediaRegistry::new(backend.clone());
    registry.refresh().await.expect("refresh should succeed");

    backend.reject_listing("timeout");
    let error = registry.refresh().await.expect_err("listing should fail");

    assert!(matches!(error, RegistryError::Refresh { ref reason } if reason == "timeout"));
    assert_eq!(registry.len(), 3);
}
