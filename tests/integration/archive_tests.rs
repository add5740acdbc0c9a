//! Archive endpoint tests.
//!
//! Tests verify:
//! - `pack` streams progress fractions then `done`
//! - `download_all` serves the zip exactly once
//! - Missing albums, concurrent builds and failed builds are reported

use axum::http::{header, StatusCode};

use super::test_utils::{body_bytes, body_json, sse_data, zip_entries, TestApp};

#[tokio::test]
async fn test_pack_then_download_all() {
    let app = TestApp::new();
    app.add_file("trip", "a.jpg", b"abc");
    app.add_file("trip", "b.mp4", b"0123456789");

    let response = app.get("/albums/trip/pack").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let events = sse_data(&body_bytes(response).await);
    assert_eq!(events, vec!["0.5000", "1.0000", "done"]);

    let response = app.get("/albums/trip/download_all").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/zip"
    );
    assert!(response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .contains("trip.zip"));

    let body = body_bytes(response).await;
    assert_eq!(
        zip_entries(&body),
        vec![
            ("a.jpg".to_string(), b"abc".to_vec()),
            ("b.mp4".to_string(), b"0123456789".to_vec()),
        ]
    );

    // One-shot: the archive is gone once delivered
    assert!(!app.root().join("trip").join("trip.zip").exists());
    let response = app.get("/albums/trip/download_all").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_pack_fractions_strictly_increase() {
    let app = TestApp::new();
    for i in 0..7 {
        app.add_file("big", &format!("{}.jpg", i), &vec![i as u8; 100]);
    }

    let events = sse_data(&body_bytes(app.get("/albums/big/pack").await).await);
    assert_eq!(events.len(), 8);
    assert_eq!(events.last().unwrap(), "done");

    let fractions: Vec<f64> = events[..7].iter().map(|e| e.parse().unwrap()).collect();
    assert!(fractions.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(fractions[6], 1.0);
}

#[tokio::test]
async fn test_pack_empty_album() {
    let app = TestApp::new();
    std::fs::create_dir_all(app.root().join("empty")).unwrap();

    let events = sse_data(&body_bytes(app.get("/albums/empty/pack").await).await);
    assert_eq!(events, vec!["done"]);

    let body = body_bytes(app.get("/albums/empty/download_all").await).await;
    assert!(zip_entries(&body).is_empty());
}

#[tokio::test]
async fn test_pack_missing_album() {
    let app = TestApp::new();
    let response = app.get("/albums/nowhere/pack").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "not_found");
}

#[tokio::test]
async fn test_download_all_without_pack() {
    let app = TestApp::new();
    app.add_file("trip", "a.jpg", b"abc");

    let response = app.get("/albums/trip/download_all").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_concurrent_pack_is_busy() {
    let app = TestApp::new();
    // More entries than the progress buffer, so the writer blocks
    for i in 0..16 {
        app.add_file("trip", &format!("{}.jpg", i), b"abc");
    }

    // Hold a build open by not consuming its events
    let album = app.album("trip");
    let build = app.archives.build(&album).await.unwrap();

    let response = app.get("/albums/trip/pack").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["error"], "busy");

    let events = build.collect().await;
    assert!(events.last().unwrap().is_terminal());
}

#[tokio::test]
async fn test_previous_archive_not_packed() {
    let app = TestApp::new();
    app.add_file("trip", "a.jpg", b"abc");

    body_bytes(app.get("/albums/trip/pack").await).await;
    // Build again while the first archive is still waiting for download
    let events = sse_data(&body_bytes(app.get("/albums/trip/pack").await).await);
    assert_eq!(events, vec!["1.0000", "done"]);

    let body = body_bytes(app.get("/albums/trip/download_all").await).await;
    let names: Vec<String> = zip_entries(&body).into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, vec!["a.jpg"]);
}

#[tokio::test]
async fn test_delete_all_removes_pending_archive() {
    let app = TestApp::new();
    app.add_file("trip", "a.jpg", b"abc");
    body_bytes(app.get("/albums/trip/pack").await).await;
    assert!(app.root().join("trip").join("trip.zip").exists());

    app.post_empty("/albums/trip/delete_all").await;

    let response = app.get("/albums/trip/download_all").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_failed_build_sends_error_event() {
    let app = TestApp::new();
    app.add_file("trip", "a.jpg", b"abc");
    // Occupy the partial archive path so the writer cannot create it
    std::fs::create_dir(app.root().join("trip").join(".trip.zip.partial")).unwrap();

    let response = app.get("/albums/trip/pack").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_bytes(response).await;
    let text = String::from_utf8_lossy(&body);
    assert!(text
        .lines()
        .any(|line| line.strip_prefix("event:").map(str::trim) == Some("error")));

    let events = sse_data(&body);
    assert_eq!(events.len(), 1);
    assert_ne!(events[0], "done");

    assert!(!app.root().join("trip").join("trip.zip").exists());
    let response = app.get("/albums/trip/download_all").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
