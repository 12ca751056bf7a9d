// utils.rs - FFmpeg process helpers and small path utilities
use std::path::Path;
use std::process::Command;

use crate::error::ProcessingError;

/// Extensions accepted for uploaded and fetched source videos.
pub const ALLOWED_VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "webm", "mkv"];

/// Execute FFmpeg command, returning stdout or the captured stderr as the error
pub fn execute_ffmpeg_command(mut command: Command) -> Result<String, ProcessingError> {
    tracing::debug!("Executing FFmpeg: {:?}", command);

    let output = command
        .output()
        .map_err(|e| ProcessingError::Processing(format!("Failed to execute FFmpeg: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::error!(status = %output.status, stderr = %stderr.trim(), "FFmpeg exited with an error");
        return Err(ProcessingError::Processing(format!(
            "FFmpeg exited with {}",
            output.status
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Execute FFprobe for media analysis
pub fn execute_ffprobe_command(args: &[&str]) -> Result<String, ProcessingError> {
    let output = Command::new("ffprobe")
        .args(args)
        .output()
        .map_err(|e| ProcessingError::CannotOpen(format!("Failed to execute FFprobe: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ProcessingError::CannotOpen(format!("FFprobe error: {}", stderr.trim())));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Check if FFmpeg and FFprobe are available
pub fn check_ffmpeg_available() -> Result<(), String> {
    Command::new("ffmpeg")
        .arg("-version")
        .output()
        .map_err(|_| "FFmpeg not found. Please install FFmpeg.")?;

    Command::new("ffprobe")
        .arg("-version")
        .output()
        .map_err(|_| "FFprobe not found. Please install FFmpeg with FFprobe.")?;

    Ok(())
}

/// Get file extension from path, lower-cased
pub fn get_file_extension(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Check if file has one of the accepted source video extensions
pub fn is_supported_video_format(path: &str) -> bool {
    match get_file_extension(path) {
        Some(ext) => ALLOWED_VIDEO_EXTENSIONS.contains(&ext.as_str()),
        None => false,
    }
}

/// Reduce a client-supplied file stem to something safe to use in a storage key
pub fn sanitize_stem(name: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("");

    let cleaned: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(64)
        .collect();
    let cleaned = cleaned.trim_matches('_');

    if cleaned.is_empty() {
        "video".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Build the storage key for a new asset: `<stem>_<uuid>.<ext>`
pub fn unique_storage_key(original_name: &str, extension: &str) -> String {
    format!(
        "{}_{}.{}",
        sanitize_stem(original_name),
        uuid::Uuid::new_v4().simple(),
        extension.to_lowercase()
    )
}

/// Escape a value embedded in an FFmpeg filter graph option
pub fn escape_filter_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | ':' | '\'' | ',' | ';' | '[' | ']' | '=') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Build FFmpeg crop filter
pub fn build_crop_filter(x: i64, y: i64, width: i64, height: i64) -> String {
    format!("crop={}:{}:{}:{}", width, height, x, y)
}

/// Build FFmpeg resize filter; `None` sides keep the aspect ratio.
///
/// `-2` rounds the derived side to an even number, which H.264 requires.
pub fn build_resize_filter(width: Option<u32>, height: Option<u32>, even_dimensions: bool) -> Option<String> {
    let auto = if even_dimensions { "-2" } else { "-1" };
    match (width, height) {
        (Some(w), Some(h)) => Some(format!("scale={}:{}", w, h)),
        (Some(w), None) => Some(format!("scale={}:{}", w, auto)),
        (None, Some(h)) => Some(format!("scale={}:{}", auto, h)),
        (None, None) => None,
    }
}

/// Split a speed factor into `atempo` stages; each stage accepts 0.5..=2.0
pub fn build_atempo_chain(speed_factor: f64) -> Vec<String> {
    let mut stages = Vec::new();
    let mut remaining = speed_factor;

    while remaining >= 2.0 {
        stages.push("atempo=2.0".to_string());
        remaining /= 2.0;
    }
    while remaining <= 0.5 {
        stages.push("atempo=0.5".to_string());
        remaining /= 0.5;
    }
    if (remaining - 1.0).abs() > f64::EPSILON {
        stages.push(format!("atempo={:.6}", remaining));
    }

    stages
}
