#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use clip2gif::config::Config;
use clip2gif::fetch::{parse_remote_url, FetchError, FetchedVideo, VideoFetcher};
use clip2gif::mailer::{ContactMessage, ContactNotifier, MailError};
use clip2gif::scanner::{MalwareScanner, ScanError};
use clip2gif::state::AppState;
use clip2gif::storage::{ObjectStorage, StorageError};
use clip2gif::workspace::Workspace;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

/// Bucket kept in memory.
#[derive(Default)]
pub struct MemoryStorage {
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn insert(&self, key: &str, data: Vec<u8>) {
        self.objects.lock().unwrap().insert(key.to_string(), data);
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn upload(&self, local: &Path, key: &str, _content_type: &str) -> Result<(), StorageError> {
        let data = tokio::fs::read(local).await?;
        self.insert(key, data);
        Ok(())
    }

    async fn download(&self, key: &str, local: &Path) -> Result<(), StorageError> {
        let data = self
            .objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        tokio::fs::write(local, data).await?;
        Ok(())
    }

    async fn presigned_url(&self, key: &str, expires_in: Duration) -> Result<String, StorageError> {
        Ok(format!("https://signed.test/{}?expires={}", key, expires_in.as_secs()))
    }
}

#[derive(Clone, Copy)]
pub enum ScanVerdict {
    Clean,
    Infected,
    Unavailable,
}

pub struct StubScanner(pub ScanVerdict);

#[async_trait]
impl MalwareScanner for StubScanner {
    async fn scan(&self, _path: &Path) -> Result<(), ScanError> {
        match self.0 {
            ScanVerdict::Clean => Ok(()),
            ScanVerdict::Infected => Err(ScanError::Infected("Eicar-Test-Signature".to_string())),
            ScanVerdict::Unavailable => Err(ScanError::Unavailable("clamscan not installed".to_string())),
        }
    }
}

/// Writes a few bytes instead of downloading anything.
pub struct StubFetcher;

#[async_trait]
impl VideoFetcher for StubFetcher {
    async fn fetch(&self, url: &str, dest_dir: &Path, file_stem: &str) -> Result<FetchedVideo, FetchError> {
        parse_remote_url(url)?;
        let path = dest_dir.join(format!("{}.mp4", file_stem));
        tokio::fs::write(&path, b"remote video bytes").await?;
        Ok(FetchedVideo {
            path,
            extension: "mp4".to_string(),
            title: Some("Remote Clip".to_string()),
        })
    }
}

/// Leaves fragments behind the way an interrupted yt-dlp run does, then fails.
pub struct InterruptedFetcher;

#[async_trait]
impl VideoFetcher for InterruptedFetcher {
    async fn fetch(&self, url: &str, dest_dir: &Path, file_stem: &str) -> Result<FetchedVideo, FetchError> {
        parse_remote_url(url)?;
        tokio::fs::write(dest_dir.join(format!("{}.f137.mp4.part", file_stem)), b"partial").await?;
        tokio::fs::write(dest_dir.join(format!("{}.f140.m4a", file_stem)), b"audio").await?;
        Err(FetchError::Remote("connection reset".to_string()))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<ContactMessage>>,
}

#[async_trait]
impl ContactNotifier for RecordingNotifier {
    async fn send_contact(&self, contact: &ContactMessage) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(contact.clone());
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub storage: Arc<MemoryStorage>,
    pub notifier: Arc<RecordingNotifier>,
    pub work_dir: PathBuf,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    pub async fn post_json(&self, path: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn get(&self, path: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder().uri(path).body(Body::empty()).unwrap();
        self.send(request).await
    }

    /// Entries still present in the workspace directory.
    pub fn workspace_entries(&self) -> Vec<PathBuf> {
        std::fs::read_dir(&self.work_dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }
}

pub fn setup_test_app(verdict: ScanVerdict, allow_unscanned: bool) -> TestApp {
    setup_test_app_with_fetcher(verdict, allow_unscanned, Arc::new(StubFetcher))
}

pub fn setup_test_app_with_fetcher(
    verdict: ScanVerdict,
    allow_unscanned: bool,
    fetcher: Arc<dyn VideoFetcher>,
) -> TestApp {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = Config {
        s3_bucket: "test-bucket".to_string(),
        allow_unscanned_uploads: allow_unscanned,
        ..Config::default()
    };

    let storage = Arc::new(MemoryStorage::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let work_dir = temp_dir.path().join("work");
    let workspace = Workspace::new(work_dir.clone()).unwrap();

    let state = Arc::new(AppState::new(
        &config,
        storage.clone(),
        Arc::new(StubScanner(verdict)),
        fetcher,
        notifier.clone(),
        workspace,
    ));

    TestApp {
        router: clip2gif::handlers::router(state),
        storage,
        notifier,
        work_dir,
        _temp_dir: temp_dir,
    }
}

pub const BOUNDARY: &str = "clip2gif-test-boundary";

/// A multipart/form-data request body holding one file field.
pub fn multipart_request(path: &str, field: &str, filename: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}

pub fn ffmpeg_available() -> bool {
    let ok = |bin: &str| {
        Command::new(bin)
            .arg("-version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    };
    ok("ffmpeg") && ok("ffprobe")
}

/// Render a synthetic clip with ffmpeg's lavfi sources.
pub fn make_clip(path: &Path, lavfi_inputs: &[&str], extra: &[&str]) {
    let mut command = Command::new("ffmpeg");
    command.args(["-hide_banner", "-loglevel", "error", "-y"]);
    for input in lavfi_inputs {
        command.args(["-f", "lavfi", "-i", input]);
    }
    command.args(extra);
    command.args(["-pix_fmt", "yuv420p"]);
    command.arg(path);
    let status = command.status().unwrap();
    assert!(status.success(), "failed to generate {}", path.display());
}
