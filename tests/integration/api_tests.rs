//! API integration tests for listing, streaming and deletion.
//!
//! Tests verify:
//! - Album and asset listings
//! - Range streaming (200, 206, 416) and its headers
//! - Error mapping (400, 404, 415) with JSON bodies
//! - Single and bulk deletion

use axum::http::{header, StatusCode};

use super::test_utils::{body_bytes, body_json, create_test_jpeg, TestApp};

// =============================================================================
// Health and Listings
// =============================================================================

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let response = app.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_list_albums_sorted_and_hidden_skipped() {
    let app = TestApp::new();
    app.add_file("zoo", "a.jpg", b"abc");
    app.add_file("beach", "b.jpg", b"abc");
    std::fs::create_dir_all(app.root().join(".hidden")).unwrap();

    let json = body_json(app.get("/albums").await).await;
    assert_eq!(json["albums"], serde_json::json!(["beach", "zoo"]));
}

#[tokio::test]
async fn test_list_albums_empty_root() {
    let app = TestApp::new();
    let json = body_json(app.get("/albums").await).await;
    assert_eq!(json["albums"], serde_json::json!([]));
}

#[tokio::test]
async fn test_album_listing() {
    let app = TestApp::new();
    app.add_file("trip", "a.jpg", b"abc");
    app.add_file("trip", "b.mp4", b"0123456789");
    app.add_file("trip", "notes.txt", b"skip me");
    app.add_file("trip", ".hidden.jpg", b"skip me");

    let response = app.get("/albums/trip").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["album"], "trip");

    let assets = json["assets"].as_array().unwrap();
    assert_eq!(assets.len(), 2);

    let mut names: Vec<&str> = assets.iter().map(|a| a["name"].as_str().unwrap()).collect();
    names.sort();
    assert_eq!(names, vec!["a.jpg", "b.mp4"]);

    let video = assets.iter().find(|a| a["name"] == "b.mp4").unwrap();
    assert_eq!(video["kind"], "video");
    assert_eq!(video["size"], 10);
}

#[tokio::test]
async fn test_album_listing_newest_first() {
    let app = TestApp::new();
    let old = app.add_file("trip", "old.jpg", b"abc");
    app.add_file("trip", "new.jpg", b"abc");

    let past = std::time::SystemTime::now() - std::time::Duration::from_secs(3600);
    std::fs::File::options()
        .write(true)
        .open(&old)
        .unwrap()
        .set_modified(past)
        .unwrap();

    let json = body_json(app.get("/albums/trip").await).await;
    let assets = json["assets"].as_array().unwrap();
    assert_eq!(assets[0]["name"], "new.jpg");
    assert_eq!(assets[1]["name"], "old.jpg");
}

#[tokio::test]
async fn test_album_listing_missing_album() {
    let app = TestApp::new();
    let response = app.get("/albums/nowhere").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(json["error"], "not_found");
    assert_eq!(json["status"], 404);
}

#[tokio::test]
async fn test_invalid_album_name() {
    let app = TestApp::new();
    let response = app.get("/albums/..%20..").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error"], "invalid_album");
}

// =============================================================================
// Streaming
// =============================================================================

#[tokio::test]
async fn test_stream_full_file() {
    let app = TestApp::new();
    app.add_file("trip", "b.mp4", b"0123456789");

    let response = app.get("/albums/trip/stream/b.mp4").await;
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();
    assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "video/mp4");
    assert_eq!(headers.get(header::ACCEPT_RANGES).unwrap(), "bytes");
    assert_eq!(headers.get(header::CONTENT_LENGTH).unwrap(), "10");
    assert!(headers.get(header::CONTENT_RANGE).is_none());

    assert_eq!(&body_bytes(response).await[..], b"0123456789");
}

#[tokio::test]
async fn test_stream_partial_range() {
    let app = TestApp::new();
    app.add_file("trip", "a.jpg", b"abc");
    app.add_file("trip", "b.mp4", b"0123456789");

    let response = app.get_range("/albums/trip/stream/b.mp4", "bytes=0-1").await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        response.headers().get(header::CONTENT_RANGE).unwrap(),
        "bytes 0-1/10"
    );
    assert_eq!(response.headers().get(header::CONTENT_LENGTH).unwrap(), "2");
    assert_eq!(&body_bytes(response).await[..], b"01");
}

#[tokio::test]
async fn test_stream_every_range_matches_source() {
    let app = TestApp::new();
    let data = b"0123456789";
    app.add_file("trip", "b.mp4", data);

    for start in 0..data.len() {
        for end in start..data.len() {
            let response = app
                .get_range(
                    "/albums/trip/stream/b.mp4",
                    &format!("bytes={}-{}", start, end),
                )
                .await;
            assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
            assert_eq!(&body_bytes(response).await[..], &data[start..=end]);
        }
    }
}

#[tokio::test]
async fn test_stream_open_ended_and_clamped_ranges() {
    let app = TestApp::new();
    app.add_file("trip", "b.mp4", b"0123456789");

    let response = app.get_range("/albums/trip/stream/b.mp4", "bytes=7-").await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        response.headers().get(header::CONTENT_RANGE).unwrap(),
        "bytes 7-9/10"
    );
    assert_eq!(&body_bytes(response).await[..], b"789");

    let response = app.get_range("/albums/trip/stream/b.mp4", "bytes=8-100").await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        response.headers().get(header::CONTENT_RANGE).unwrap(),
        "bytes 8-9/10"
    );
    assert_eq!(&body_bytes(response).await[..], b"89");
}

#[tokio::test]
async fn test_stream_unsatisfiable_range() {
    let app = TestApp::new();
    app.add_file("trip", "b.mp4", b"0123456789");

    for range in ["bytes=10-", "bytes=20-30", "bytes=5-2"] {
        let response = app.get_range("/albums/trip/stream/b.mp4", range).await;
        assert_eq!(
            response.status(),
            StatusCode::RANGE_NOT_SATISFIABLE,
            "range {}",
            range
        );
        assert_eq!(
            response.headers().get(header::CONTENT_RANGE).unwrap(),
            "bytes */10"
        );

        let json = body_json(response).await;
        assert_eq!(json["error"], "range_not_satisfiable");
    }
}

#[tokio::test]
async fn test_stream_malformed_range() {
    let app = TestApp::new();
    app.add_file("trip", "b.mp4", b"0123456789");

    let response = app.get_range("/albums/trip/stream/b.mp4", "items=0-1").await;
    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
}

#[tokio::test]
async fn test_stream_non_ascii_range() {
    let app = TestApp::new();
    app.add_file("trip", "b.mp4", b"0123456789");

    let request = axum::http::Request::builder()
        .uri("/albums/trip/stream/b.mp4")
        .header(
            header::RANGE,
            header::HeaderValue::from_bytes(b"bytes=0-\xff").unwrap(),
        )
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(
        response.headers().get(header::CONTENT_RANGE).unwrap(),
        "bytes */10"
    );
}

#[tokio::test]
async fn test_stream_missing_file() {
    let app = TestApp::new();
    app.add_file("trip", "a.jpg", b"abc");

    let response = app.get("/albums/trip/stream/missing.jpg").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stream_unsupported_type() {
    let app = TestApp::new();
    app.add_file("trip", "notes.txt", b"hello");

    let response = app.get("/albums/trip/stream/notes.txt").await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let json = body_json(response).await;
    assert_eq!(json["error"], "unsupported_type");
}

#[tokio::test]
async fn test_stream_hidden_name_rejected() {
    let app = TestApp::new();
    app.add_file("trip", ".secret.jpg", b"abc");

    let response = app.get("/albums/trip/stream/.secret.jpg").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error"], "invalid_filename");
}

#[tokio::test]
async fn test_stream_traversal_rejected() {
    let app = TestApp::new();
    std::fs::write(app.root().join("outside.jpg"), b"abc").unwrap();
    app.add_file("trip", "a.jpg", b"abc");

    let response = app.get("/albums/trip/stream/..%2Foutside.jpg").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Downloads and Previews
// =============================================================================

#[tokio::test]
async fn test_download_attachment_header() {
    let app = TestApp::new();
    app.add_file("trip", "照片.jpg", b"abc");

    let response = app.get("/albums/trip/download/%E7%85%A7%E7%89%87.jpg").await;
    assert_eq!(response.status(), StatusCode::OK);

    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment;"));
    assert!(disposition.contains("filename*=UTF-8''%E7%85%A7%E7%89%87.jpg"));

    assert_eq!(&body_bytes(response).await[..], b"abc");
}

#[tokio::test]
async fn test_preview_non_raw_serves_original() {
    let app = TestApp::new();
    app.add_file("trip", "b.mp4", b"0123456789");

    let response = app.get("/albums/trip/preview/b.mp4").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "video/mp4"
    );
    assert_eq!(&body_bytes(response).await[..], b"0123456789");
}

#[tokio::test]
async fn test_preview_broken_raw_falls_back_to_original() {
    let app = TestApp::new();
    app.add_file("trip", "shot.cr2", b"not a raw file");

    let response = app.get("/albums/trip/preview/shot.cr2").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(&body_bytes(response).await[..], b"not a raw file");
}

// =============================================================================
// Deletion
// =============================================================================

#[tokio::test]
async fn test_delete_single_file() {
    let app = TestApp::new();
    let path = app.add_file("trip", "a.jpg", b"abc");
    app.add_file("trip", "b.mp4", b"0123456789");

    let response = app
        .post_json("/albums/trip/delete", serde_json::json!({"file": "a.jpg"}))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!({"ok": true}));
    assert!(!path.exists());

    let json = body_json(app.get("/albums/trip").await).await;
    assert_eq!(json["assets"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let app = TestApp::new();
    app.add_file("trip", "a.jpg", b"abc");

    for _ in 0..2 {
        let response = app
            .post_json("/albums/trip/delete", serde_json::json!({"file": "a.jpg"}))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_delete_rejects_traversal() {
    let app = TestApp::new();
    let outside = app.root().join("keep.jpg");
    std::fs::write(&outside, b"abc").unwrap();
    app.add_file("trip", "a.jpg", b"abc");

    let response = app
        .post_json(
            "/albums/trip/delete",
            serde_json::json!({"file": "../keep.jpg"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(outside.exists());
}

#[tokio::test]
async fn test_delete_all_leaves_empty_album() {
    let app = TestApp::new();
    app.add_file("trip", "a.jpg", &create_test_jpeg(16, 16));
    app.add_file("trip", "b.mp4", b"0123456789");
    body_bytes(app.get("/albums/trip/thumb/a.jpg").await).await;
    assert!(app.root().join("trip").join(".thumbs").exists());

    let response = app.post_empty("/albums/trip/delete_all").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!({"ok": true}));

    let response = app.get("/albums/trip").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["assets"], serde_json::json!([]));
    assert!(!app.root().join("trip").join(".thumbs").exists());
}
