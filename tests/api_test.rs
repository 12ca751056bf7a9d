mod helpers;

use axum::http::StatusCode;
use helpers::{
    ffmpeg_available, make_clip, multipart_request, setup_test_app, setup_test_app_with_fetcher,
    InterruptedFetcher, ScanVerdict,
};
use std::sync::Arc;
use serde_json::json;

#[tokio::test]
async fn test_home_and_health() {
    let app = setup_test_app(ScanVerdict::Clean, false);

    let (status, body) = app.get("/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "MP4 to GIF Converter API");

    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_upload_stores_under_fresh_key() {
    let app = setup_test_app(ScanVerdict::Clean, false);

    let (status, body) = app
        .send(multipart_request("/upload", "video", "My Holiday.MP4", b"fake mp4 bytes"))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "success");

    let key = body["filename"].as_str().unwrap();
    assert!(key.starts_with("My_Holiday_"));
    assert!(key.ends_with(".mp4"));
    assert_eq!(app.storage.keys(), vec![key.to_string()]);
}

#[tokio::test]
async fn test_upload_without_video_field() {
    let app = setup_test_app(ScanVerdict::Clean, false);

    let (status, body) = app.send(multipart_request("/upload", "file", "a.mp4", b"x")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "No file uploaded");
}

#[tokio::test]
async fn test_upload_with_empty_filename() {
    let app = setup_test_app(ScanVerdict::Clean, false);

    let (status, body) = app.send(multipart_request("/upload", "video", "", b"x")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No file selected");
}

#[tokio::test]
async fn test_upload_rejects_extension() {
    let app = setup_test_app(ScanVerdict::Clean, false);

    let (status, body) = app.send(multipart_request("/upload", "video", "notes.txt", b"x")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().starts_with("Invalid file type"));
    assert!(app.storage.keys().is_empty());
}

#[tokio::test]
async fn test_infected_upload_never_reaches_storage() {
    let app = setup_test_app(ScanVerdict::Infected, true);

    let (status, body) = app.send(multipart_request("/upload", "video", "a.mp4", b"x")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "File is infected");
    assert!(app.storage.keys().is_empty());
}

#[tokio::test]
async fn test_scanner_unavailable_policy() {
    let strict = setup_test_app(ScanVerdict::Unavailable, false);
    let (status, body) = strict.send(multipart_request("/upload", "video", "a.mp4", b"x")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Server error");
    assert!(strict.storage.keys().is_empty());

    let lenient = setup_test_app(ScanVerdict::Unavailable, true);
    let (status, _) = lenient.send(multipart_request("/upload", "video", "a.mp4", b"x")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(lenient.storage.keys().len(), 1);
}

#[tokio::test]
async fn test_process_url() {
    let app = setup_test_app(ScanVerdict::Clean, false);

    let (status, body) = app
        .post_json("/process-url", json!({ "url": "https://cdn.example.com/clip.mp4" }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let key = body["filename"].as_str().unwrap();
    assert!(key.starts_with("Remote_Clip_"));
    assert!(key.ends_with(".mp4"));

    let (status, body) = app.post_json("/process-url", json!({ "url": "ftp://example.com/a.mp4" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");

    let (status, body) = app.post_json("/process-url", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "URL required");
}

#[tokio::test]
async fn test_process_url_leaves_workspace_empty() {
    let app = setup_test_app(ScanVerdict::Clean, false);
    let (status, _) = app
        .post_json("/process-url", json!({ "url": "https://cdn.example.com/clip.mp4" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.workspace_entries().is_empty(), "{:?}", app.workspace_entries());

    let infected = setup_test_app(ScanVerdict::Infected, false);
    let (status, _) = infected
        .post_json("/process-url", json!({ "url": "https://cdn.example.com/clip.mp4" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(infected.workspace_entries().is_empty());
}

#[tokio::test]
async fn test_failed_fetch_removes_fragments() {
    let app = setup_test_app_with_fetcher(ScanVerdict::Clean, false, Arc::new(InterruptedFetcher));

    let (status, body) = app
        .post_json("/process-url", json!({ "url": "https://www.youtube.com/watch?v=abc" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Could not download video from URL");
    assert!(app.workspace_entries().is_empty(), "{:?}", app.workspace_entries());
    assert!(app.storage.keys().is_empty());
}

#[tokio::test]
async fn test_analyze_returns_scenes_and_preview() {
    if !ffmpeg_available() {
        eprintln!("ffmpeg not installed, skipping");
        return;
    }
    let app = setup_test_app(ScanVerdict::Clean, false);
    let clip_dir = tempfile::tempdir().unwrap();
    let clip = clip_dir.path().join("cut.mp4");
    make_clip(
        &clip,
        &[
            "color=c=black:size=160x120:rate=10:duration=2",
            "color=c=white:size=160x120:rate=10:duration=2",
        ],
        &["-filter_complex", "[0:v][1:v]concat=n=2:v=1:a=0[v]", "-map", "[v]"],
    );
    app.storage.insert("cut_1.mp4", std::fs::read(&clip).unwrap());

    let (status, body) = app.post_json("/analyze", json!({ "filename": "cut_1.mp4" })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "success");

    let scenes: Vec<f64> = serde_json::from_value(body["scenes"].clone()).unwrap();
    assert_eq!(scenes.len(), 2, "{:?}", scenes);
    assert_eq!(scenes[0], 0.0);
    assert!((scenes[1] - 2.0).abs() < 0.15);
    assert!((body["duration"].as_f64().unwrap() - 4.0).abs() < 0.2);
    assert!(body["preview_url"].as_str().unwrap().starts_with("https://signed.test/cut_1.mp4"));
    assert!(app.workspace_entries().is_empty());
}

#[tokio::test]
async fn test_convert_uploads_rendered_output() {
    if !ffmpeg_available() {
        return;
    }
    let app = setup_test_app(ScanVerdict::Clean, false);
    let clip_dir = tempfile::tempdir().unwrap();
    let clip = clip_dir.path().join("src.mp4");
    make_clip(&clip, &["testsrc=size=320x240:rate=10:duration=3"], &[]);
    app.storage.insert("holiday_1.mp4", std::fs::read(&clip).unwrap());

    let (status, body) = app
        .post_json(
            "/convert",
            json!({ "filename": "holiday_1.mp4", "fps": 10, "width": 160, "start_time": 0.5, "end_time": 2 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "success");
    let gif_key = body["filename"].as_str().unwrap().to_string();
    assert!(gif_key.starts_with("holiday_1_"));
    assert!(gif_key.ends_with(".gif"));
    assert_eq!(body["url"].as_str().unwrap(), format!("https://signed.test/{}?expires=3600", gif_key));
    assert!(app.storage.keys().contains(&gif_key));

    let (status, body) = app
        .post_json(
            "/convert",
            json!({ "filename": "holiday_1.mp4", "output_format": "mp4", "crop_x": 0, "crop_y": 0, "crop_w": 161, "crop_h": 121 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let mp4_key = body["filename"].as_str().unwrap().to_string();
    assert!(mp4_key.ends_with(".mp4"));
    assert_ne!(mp4_key, "holiday_1.mp4");
    assert_eq!(app.storage.keys().len(), 3);
    assert!(app.workspace_entries().is_empty());
}

#[tokio::test]
async fn test_analyze_and_convert_require_filename() {
    let app = setup_test_app(ScanVerdict::Clean, false);

    let (status, body) = app.post_json("/analyze", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Filename required");

    let (status, body) = app.post_json("/convert", json!({ "fps": 10 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Filename required");
}

#[tokio::test]
async fn test_unknown_key_is_client_error() {
    let app = setup_test_app(ScanVerdict::Clean, false);

    let (status, body) = app.post_json("/analyze", json!({ "filename": "missing_1.mp4" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "File not found");

    let (status, body) = app.post_json("/convert", json!({ "filename": "missing_1.mp4" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "File not found");
}

#[tokio::test]
async fn test_path_like_keys_are_rejected() {
    let app = setup_test_app(ScanVerdict::Clean, false);

    let (status, body) = app.post_json("/convert", json!({ "filename": "../etc/passwd" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid filename");
}

#[tokio::test]
async fn test_malformed_json_uses_error_shape() {
    let app = setup_test_app(ScanVerdict::Clean, false);

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/convert")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_unsupported_output_format() {
    let app = setup_test_app(ScanVerdict::Clean, false);
    app.storage.insert("a_1.mp4", b"x".to_vec());

    let (status, body) = app
        .post_json("/convert", json!({ "filename": "a_1.mp4", "output_format": "avi" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Unsupported output format: avi");
}

#[tokio::test]
async fn test_contact_form() {
    let app = setup_test_app(ScanVerdict::Clean, false);

    let (status, body) = app
        .post_json(
            "/api/contact",
            json!({ "name": "Ada", "email": "ada@example.com", "message": "Nice tool" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(app.notifier.sent.lock().unwrap().len(), 1);

    let (status, body) = app
        .post_json("/api/contact", json!({ "name": "Ada", "email": "nope", "message": "Hi" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid email address");

    let (status, body) = app
        .post_json("/api/contact", json!({ "name": "Ada", "email": "<a>@b.co", "message": "Hi" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid email address");

    let (status, _) = app.post_json("/api/contact", json!({ "name": "Ada" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.notifier.sent.lock().unwrap().len(), 1);
}
