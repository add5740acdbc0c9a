//! Thumbnail endpoint tests.
//!
//! Tests verify:
//! - JPEG thumbnails are bounded and cached (memory, then disk)
//! - Undecodable sources and missing decoders degrade to the GIF placeholder
//! - Replacing or deleting a source invalidates its thumbnail

use axum::http::{header, StatusCode};

use album_streamer::thumb::{DecoderTable, PLACEHOLDER_GIF};

use super::test_utils::{
    body_bytes, create_rotated_jpeg, create_test_jpeg, create_test_png, is_gif, is_valid_jpeg,
    TestApp,
};

const CACHE_HIT: &str = "x-thumbnail-cache-hit";

#[tokio::test]
async fn test_thumbnail_is_bounded_jpeg() {
    let app = TestApp::new();
    app.add_file("trip", "wide.jpg", &create_test_jpeg(128, 64));

    let response = app.get("/albums/trip/thumb/wide.jpg").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/jpeg"
    );
    assert_eq!(response.headers().get(CACHE_HIT).unwrap(), "false");
    assert!(response
        .headers()
        .get(header::CACHE_CONTROL)
        .unwrap()
        .to_str()
        .unwrap()
        .contains("max-age=3600"));

    let body = body_bytes(response).await;
    assert!(is_valid_jpeg(&body));

    let thumb = image::load_from_memory(&body).unwrap();
    assert_eq!((thumb.width(), thumb.height()), (32, 16));
}

#[tokio::test]
async fn test_thumbnail_follows_exif_orientation() {
    let app = TestApp::new();
    app.add_file("trip", "portrait.jpg", &create_rotated_jpeg(64, 32));

    let body = body_bytes(app.get("/albums/trip/thumb/portrait.jpg").await).await;
    let thumb = image::load_from_memory(&body).unwrap();
    assert_eq!((thumb.width(), thumb.height()), (16, 32));
}

#[tokio::test]
async fn test_png_thumbnail() {
    let app = TestApp::new();
    app.add_file("trip", "shot.png", &create_test_png(20, 40));

    let response = app.get("/albums/trip/thumb/shot.png").await;
    let body = body_bytes(response).await;
    assert!(is_valid_jpeg(&body));

    let thumb = image::load_from_memory(&body).unwrap();
    assert_eq!((thumb.width(), thumb.height()), (16, 32));
}

#[tokio::test]
async fn test_second_request_is_cache_hit() {
    let app = TestApp::new();
    app.add_file("trip", "a.jpg", &create_test_jpeg(64, 64));

    let first = app.get("/albums/trip/thumb/a.jpg").await;
    assert_eq!(first.headers().get(CACHE_HIT).unwrap(), "false");
    let first = body_bytes(first).await;

    let second = app.get("/albums/trip/thumb/a.jpg").await;
    assert_eq!(second.headers().get(CACHE_HIT).unwrap(), "true");
    let second = body_bytes(second).await;

    assert_eq!(first, second);
    assert_eq!(app.thumbs.stats().generated, 1);
}

#[tokio::test]
async fn test_thumbnail_persisted_on_disk() {
    let app = TestApp::new();
    app.add_file("trip", "a.jpg", &create_test_jpeg(64, 64));

    let body = body_bytes(app.get("/albums/trip/thumb/a.jpg").await).await;

    let cached = app.root().join("trip").join(".thumbs").join("a.jpg.jpg");
    assert_eq!(std::fs::read(&cached).unwrap(), body.to_vec());

    // Thumbnail cache never shows up as an asset
    let listing = super::test_utils::body_json(app.get("/albums/trip").await).await;
    assert_eq!(listing["assets"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_undecodable_image_gets_placeholder() {
    let app = TestApp::new();
    app.add_file("trip", "a.jpg", b"abc");

    let response = app.get("/albums/trip/thumb/a.jpg").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/gif"
    );
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-cache"
    );
    assert_eq!(response.headers().get(CACHE_HIT).unwrap(), "false");

    let body = body_bytes(response).await;
    assert!(is_gif(&body));
    assert_eq!(&body[..], PLACEHOLDER_GIF);
}

#[tokio::test]
async fn test_video_without_decoder_gets_placeholder() {
    let app = TestApp::with_table(DecoderTable::builtin(true));
    app.add_file("trip", "b.mp4", b"0123456789");

    let response = app.get("/albums/trip/thumb/b.mp4").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(is_gif(&body_bytes(response).await));
}

#[tokio::test]
async fn test_empty_table_gets_placeholder_for_images() {
    let app = TestApp::with_table(DecoderTable::empty());
    app.add_file("trip", "a.jpg", &create_test_jpeg(16, 16));

    let body = body_bytes(app.get("/albums/trip/thumb/a.jpg").await).await;
    assert!(is_gif(&body));
}

#[tokio::test]
async fn test_missing_source_is_404() {
    let app = TestApp::new();
    app.add_file("trip", "a.jpg", &create_test_jpeg(16, 16));

    let response = app.get("/albums/trip/thumb/missing.jpg").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_replaced_source_regenerates() {
    let app = TestApp::new();
    let path = app.add_file("trip", "a.jpg", &create_test_jpeg(64, 64));

    let first = body_bytes(app.get("/albums/trip/thumb/a.jpg").await).await;
    let first = image::load_from_memory(&first).unwrap();
    assert_eq!((first.width(), first.height()), (32, 32));

    // Different size and a later mtime
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    std::fs::write(&path, create_test_jpeg(64, 32)).unwrap();

    let response = app.get("/albums/trip/thumb/a.jpg").await;
    assert_eq!(response.headers().get(CACHE_HIT).unwrap(), "false");
    let second = image::load_from_memory(&body_bytes(response).await).unwrap();
    assert_eq!((second.width(), second.height()), (32, 16));
    assert_eq!(app.thumbs.stats().generated, 2);
}

#[tokio::test]
async fn test_delete_removes_cached_thumbnail() {
    let app = TestApp::new();
    app.add_file("trip", "a.jpg", &create_test_jpeg(32, 32));
    body_bytes(app.get("/albums/trip/thumb/a.jpg").await).await;

    let cached = app.root().join("trip").join(".thumbs").join("a.jpg.jpg");
    assert!(cached.exists());

    app.post_json("/albums/trip/delete", serde_json::json!({"file": "a.jpg"}))
        .await;
    assert!(!cached.exists());

    // Re-uploading the same name must not serve the old thumbnail
    app.add_file("trip", "a.jpg", &create_test_jpeg(32, 16));
    let response = app.get("/albums/trip/thumb/a.jpg").await;
    assert_eq!(response.headers().get(CACHE_HIT).unwrap(), "false");
    let thumb = image::load_from_memory(&body_bytes(response).await).unwrap();
    assert_eq!((thumb.width(), thumb.height()), (32, 16));
}

#[tokio::test]
async fn test_concurrent_requests_generate_once() {
    let app = TestApp::new();
    app.add_file("trip", "a.jpg", &create_test_jpeg(256, 256));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let router = app.router.clone();
        handles.push(tokio::spawn(async move {
            use tower::ServiceExt;
            let request = axum::http::Request::builder()
                .uri("/albums/trip/thumb/a.jpg")
                .body(axum::body::Body::empty())
                .unwrap();
            let response = router.oneshot(request).await.unwrap();
            body_bytes(response).await
        }));
    }

    let mut bodies = Vec::new();
    for handle in handles {
        bodies.push(handle.await.unwrap());
    }
    assert!(bodies.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(app.thumbs.stats().generated, 1);
}
