//! CDN uploader against a local mock server (no network).

use httpmock::prelude::*;
use kadai_storage::{CdnObjectStore, ObjectKey, ObjectStore, StorageError};
use serde_json::json;

#[tokio::test]
async fn successful_upload_returns_secure_url() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1_1/demo/image/upload")
                .body_contains("name=\"upload_preset\"")
                .body_contains("kadai-unsigned")
                .body_contains("payment_screenshots/u-9");
            then.status(200).json_body(json!({
                "secure_url": "https://cdn.example/kadai/u-9/receipt.jpg"
            }));
        })
        .await;

    let store = CdnObjectStore::new(&server.url("/v1_1/demo/image/upload"), "kadai-unsigned", "");
    let key = ObjectKey::payment_screenshot("u-9", 11, "receipt.jpg");
    let url = store.put(&key, vec![0xff, 0xd8], "image/jpeg").await.unwrap();

    mock.assert_async().await;
    assert_eq!(url, "https://cdn.example/kadai/u-9/receipt.jpg");
}

#[tokio::test]
async fn refusal_surfaces_error_message() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/upload");
            then.status(400)
                .json_body(json!({"error": {"message": "Upload preset not found"}}));
        })
        .await;

    let store = CdnObjectStore::new(&server.url("/upload"), "missing", "");
    let err = store
        .put(&ObjectKey::product(1, "a.png"), vec![1], "image/png")
        .await
        .unwrap_err();
    match err {
        StorageError::Rejected(msg) => assert_eq!(msg, "Upload preset not found"),
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn non_json_failure_uses_fallback_message() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/upload");
            then.status(502).body("bad gateway");
        })
        .await;

    let store = CdnObjectStore::new(&server.url("/upload"), "p", "");
    let err = store
        .put(&ObjectKey::product(1, "a.png"), vec![1], "image/png")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Image upload failed.");
}
