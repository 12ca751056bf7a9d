// src/core.rs

use crate::error::ProcessingError;
use crate::types::VideoMetadata;
use crate::utils::execute_ffprobe_command;
use serde_json::Value;
use std::path::Path;

/// Probe a media file with ffprobe.
///
/// Errors are `CannotOpen` when the file is unreadable or carries no video
/// stream.
pub fn analyze_video(path: &Path) -> Result<VideoMetadata, ProcessingError> {
    if !path.exists() {
        return Err(ProcessingError::NotFound(path.to_path_buf()));
    }

    let file_path = path.to_string_lossy().to_string();
    let args = &[
        "-v",
        "quiet",
        "-print_format",
        "json",
        "-show_format",
        "-show_streams",
        file_path.as_str(),
    ];
    let ffprobe_output = execute_ffprobe_command(args)?;
    let json: Value = serde_json::from_str(&ffprobe_output)
        .map_err(|e| ProcessingError::CannotOpen(format!("Failed to parse ffprobe output: {}", e)))?;

    let metadata = metadata_from_probe(&file_path, &json);
    if !metadata.has_video {
        return Err(ProcessingError::CannotOpen(format!("No video stream in {}", file_path)));
    }

    tracing::debug!(
        path = %file_path,
        duration = metadata.duration_seconds,
        width = metadata.width,
        height = metadata.height,
        fps = metadata.fps,
        frames = metadata.frame_count,
        has_audio = metadata.has_audio,
        "probed video"
    );

    Ok(metadata)
}

/// Build metadata from `ffprobe -show_format -show_streams` JSON.
pub fn metadata_from_probe(file_path: &str, json: &Value) -> VideoMetadata {
    let format = &json["format"];
    let duration_seconds = parse_number(&format["duration"]).unwrap_or(0.0);
    let file_size_mb = parse_number(&format["size"]).unwrap_or(0.0) / (1024.0 * 1024.0);

    let mut metadata = VideoMetadata {
        file_path: file_path.to_string(),
        duration_seconds,
        width: 0,
        height: 0,
        fps: 0.0,
        frame_count: 0,
        has_audio: false,
        has_video: false,
        format: format["format_name"].as_str().unwrap_or("unknown").to_string(),
        file_size_mb,
    };

    let mut reported_frames = None;
    if let Some(streams) = json["streams"].as_array() {
        for stream in streams {
            if stream["codec_type"] == "video" && !metadata.has_video {
                metadata.has_video = true;
                metadata.width = stream["width"].as_u64().unwrap_or(0) as u32;
                metadata.height = stream["height"].as_u64().unwrap_or(0) as u32;

                // avg_frame_rate is 0/0 for some streams; r_frame_rate is the fallback
                metadata.fps = parse_rate(stream["avg_frame_rate"].as_str())
                    .filter(|fps| *fps > 0.0)
                    .or_else(|| parse_rate(stream["r_frame_rate"].as_str()))
                    .unwrap_or(0.0);

                reported_frames = parse_number(&stream["nb_frames"])
                    .filter(|n| *n > 0.0)
                    .map(|n| n as u64);

                if metadata.duration_seconds <= 0.0 {
                    metadata.duration_seconds = parse_number(&stream["duration"]).unwrap_or(0.0);
                }
            } else if stream["codec_type"] == "audio" {
                metadata.has_audio = true;
            }
        }
    }

    metadata.frame_count = reported_frames.unwrap_or_else(|| {
        if metadata.fps > 0.0 && metadata.duration_seconds > 0.0 {
            (metadata.duration_seconds * metadata.fps).round() as u64
        } else {
            0
        }
    });

    metadata
}

fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Parse an ffprobe rational such as `30000/1001`.
fn parse_rate(rate: Option<&str>) -> Option<f64> {
    let rate = rate?;
    let (num, den) = match rate.split_once('/') {
        Some((num, den)) => (num.parse::<f64>().ok()?, den.parse::<f64>().ok()?),
        None => (rate.parse::<f64>().ok()?, 1.0),
    };
    if den == 0.0 {
        return None;
    }
    Some(num / den)
}
