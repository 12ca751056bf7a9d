// fetch.rs - Remote video download: yt-dlp for sharing sites, plain HTTP otherwise
//
// Calls the yt-dlp executable directly rather than linking an extractor.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Url;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::utils::{get_file_extension, ALLOWED_VIDEO_EXTENSIONS};

/// Hosts handed to yt-dlp instead of being downloaded directly.
const SHARING_DOMAINS: &[&str] = &[
    "youtube.com",
    "youtu.be",
    "vimeo.com",
    "dailymotion.com",
    "dai.ly",
    "twitter.com",
    "x.com",
    "tiktok.com",
    "instagram.com",
    "facebook.com",
    "fb.watch",
    "reddit.com",
    "v.redd.it",
    "twitch.tv",
    "streamable.com",
];

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("{0}")]
    InvalidUrl(String),

    #[error("{0}")]
    Unsupported(String),

    /// Limit in bytes that the remote file exceeded.
    #[error("Remote file exceeds {0} bytes")]
    TooLarge(u64),

    #[error("Remote download failed: {0}")]
    Remote(String),

    #[error("Downloader unavailable: {0}")]
    Tool(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A file downloaded into the caller's directory.
#[derive(Debug)]
pub struct FetchedVideo {
    pub path: PathBuf,
    /// Lower-cased extension without the dot.
    pub extension: String,
    pub title: Option<String>,
}

#[async_trait]
pub trait VideoFetcher: Send + Sync {
    /// Download `url` into `dest_dir`, naming the file after `file_stem`.
    ///
    /// `dest_dir` belongs to this one fetch; the caller removes it with any
    /// partial files once the request is done.
    async fn fetch(&self, url: &str, dest_dir: &Path, file_stem: &str) -> Result<FetchedVideo, FetchError>;
}

pub fn parse_remote_url(raw: &str) -> Result<Url, FetchError> {
    let url = Url::parse(raw.trim()).map_err(|_| FetchError::InvalidUrl("Invalid URL".to_string()))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        _ => Err(FetchError::InvalidUrl("Only http and https URLs are supported".to_string())),
    }
}

pub fn is_sharing_site(url: &Url) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    SHARING_DOMAINS
        .iter()
        .any(|domain| host == *domain || host.ends_with(&format!(".{}", domain)))
}

fn extension_from_content_type(content_type: &str) -> Option<&'static str> {
    let mime = content_type.split(';').next()?.trim().to_ascii_lowercase();
    match mime.as_str() {
        "video/mp4" => Some("mp4"),
        "video/webm" => Some("webm"),
        "video/quicktime" => Some("mov"),
        "video/x-msvideo" | "video/avi" => Some("avi"),
        "video/x-matroska" => Some("mkv"),
        _ => None,
    }
}

fn extension_from_url(url: &Url) -> Option<String> {
    get_file_extension(url.path()).filter(|ext| ALLOWED_VIDEO_EXTENSIONS.contains(&ext.as_str()))
}

pub struct UrlFetcher {
    http: reqwest::Client,
    ytdlp_path: String,
    max_bytes: u64,
    timeout: Duration,
}

impl UrlFetcher {
    pub fn new(ytdlp_path: impl Into<String>, max_bytes: u64, timeout: Duration) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("clip2gif/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Tool(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            http,
            ytdlp_path: ytdlp_path.into(),
            max_bytes,
            timeout,
        })
    }

    async fn download_direct(&self, url: &Url, dest_dir: &Path, file_stem: &str) -> Result<FetchedVideo, FetchError> {
        tracing::info!(url = %url, "Downloading video over HTTP");

        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::Remote(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::Remote(format!("server responded {}", response.status())));
        }
        if response.content_length().map(|len| len > self.max_bytes).unwrap_or(false) {
            return Err(FetchError::TooLarge(self.max_bytes));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(extension_from_content_type);
        let extension = extension_from_url(url)
            .or_else(|| content_type.map(str::to_string))
            .ok_or_else(|| FetchError::Unsupported("URL does not point to a supported video file".to_string()))?;

        let path = dest_dir.join(format!("{}.{}", file_stem, extension));
        let mut file = tokio::fs::File::create(&path).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FetchError::Remote(e.to_string()))?;
            written += chunk.len() as u64;
            if written > self.max_bytes {
                return Err(FetchError::TooLarge(self.max_bytes));
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        tracing::info!(url = %url, size_bytes = written, path = %path.display(), "HTTP download complete");
        Ok(FetchedVideo { path, extension, title: None })
    }

    async fn download_with_ytdlp(&self, url: &Url, dest_dir: &Path, file_stem: &str) -> Result<FetchedVideo, FetchError> {
        tracing::info!(url = %url, "Downloading video with yt-dlp");

        let template = dest_dir.join(format!("{}.%(ext)s", file_stem));
        let child = Command::new(&self.ytdlp_path)
            .arg("--format")
            .arg("bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best")
            .arg("--merge-output-format")
            .arg("mp4")
            .arg("--no-playlist")
            .arg("--max-filesize")
            .arg(self.max_bytes.to_string())
            .arg("--output")
            .arg(&template)
            .arg("--print")
            .arg("after_move:filepath")
            .arg("--print")
            .arg("title")
            .arg("--no-simulate")
            .arg(url.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(FetchError::Tool(format!(
                    "failed to execute {}: {}. Make sure yt-dlp is installed.",
                    self.ytdlp_path, e
                )))
            }
            Err(_) => return Err(FetchError::Remote("yt-dlp timed out".to_string())),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!(url = %url, stderr = %stderr.trim(), "yt-dlp download failed");
            return Err(FetchError::Remote(format!("yt-dlp exited with {}", output.status)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let (path, title) = parse_ytdlp_output(&stdout, dest_dir)
            .ok_or_else(|| FetchError::Remote("yt-dlp did not report a downloaded file".to_string()))?;

        let extension = get_file_extension(&path.to_string_lossy()).unwrap_or_default();
        if !ALLOWED_VIDEO_EXTENSIONS.contains(&extension.as_str()) {
            return Err(FetchError::Unsupported(format!("Downloaded format .{} is not supported", extension)));
        }

        let size = tokio::fs::metadata(&path).await?.len();
        if size > self.max_bytes {
            return Err(FetchError::TooLarge(self.max_bytes));
        }

        tracing::info!(url = %url, size_bytes = size, path = %path.display(), "yt-dlp download complete");
        Ok(FetchedVideo { path, extension, title })
    }
}

/// yt-dlp prints the title before the final path; the path is the last line
/// that lives inside `dest_dir`.
fn parse_ytdlp_output(stdout: &str, dest_dir: &Path) -> Option<(PathBuf, Option<String>)> {
    let lines: Vec<&str> = stdout.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let path_idx = lines.iter().rposition(|line| Path::new(line).starts_with(dest_dir))?;
    let title = lines
        .iter()
        .enumerate()
        .find(|(i, _)| *i != path_idx)
        .map(|(_, line)| line.to_string());
    Some((PathBuf::from(lines[path_idx]), title))
}

#[async_trait]
impl VideoFetcher for UrlFetcher {
    async fn fetch(&self, url: &str, dest_dir: &Path, file_stem: &str) -> Result<FetchedVideo, FetchError> {
        let url = parse_remote_url(url)?;
        if is_sharing_site(&url) {
            self.download_with_ytdlp(&url, dest_dir, file_stem).await
        } else {
            self.download_direct(&url, dest_dir, file_stem).await
        }
    }
}
