// src/scenes.rs
//
// Scene-change detection by mean absolute grayscale difference between
// consecutive frames.

use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};

use crate::core::analyze_video;
use crate::error::ProcessingError;
use crate::types::SceneReport;

/// Score above which two consecutive frames count as a cut (0-255 scale).
pub const DEFAULT_SCENE_THRESHOLD: f64 = 30.0;

/// Mean absolute difference of two equally sized grayscale frames.
pub fn mean_abs_diff(previous: &[u8], current: &[u8]) -> f64 {
    let len = previous.len().min(current.len());
    if len == 0 {
        return 0.0;
    }

    let total: u64 = previous[..len]
        .iter()
        .zip(&current[..len])
        .map(|(a, b)| u64::from(a.abs_diff(*b)))
        .sum();

    total as f64 / len as f64
}

/// Collects cut timestamps from a stream of grayscale frames.
///
/// Holds at most one previous frame.
#[derive(Debug)]
pub struct SceneDetector {
    threshold: f64,
    fps: f64,
    previous: Option<Vec<u8>>,
    frame_index: u64,
    scenes: Vec<f64>,
}

impl SceneDetector {
    pub fn new(threshold: f64, fps: f64) -> Self {
        Self {
            threshold,
            fps,
            previous: None,
            frame_index: 0,
            scenes: vec![0.0],
        }
    }

    pub fn push_frame(&mut self, frame: &[u8]) {
        if let Some(previous) = self.previous.as_mut() {
            let score = mean_abs_diff(previous, frame);
            if score > self.threshold && self.fps > 0.0 {
                let timestamp = self.frame_index as f64 / self.fps;
                tracing::debug!(frame = self.frame_index, score, timestamp, "scene change");
                self.scenes.push(timestamp);
            }
            previous.clear();
            previous.extend_from_slice(frame);
        } else {
            self.previous = Some(frame.to_vec());
        }
        self.frame_index += 1;
    }

    pub fn frames_seen(&self) -> u64 {
        self.frame_index
    }

    pub fn finish(self) -> Vec<f64> {
        self.scenes
    }
}

/// Reads fixed-size raw frames from a byte stream.
pub struct GrayFrameReader<R: Read> {
    inner: R,
    buffer: Vec<u8>,
}

impl<R: Read> GrayFrameReader<R> {
    pub fn new(inner: R, frame_size: usize) -> Self {
        Self {
            inner,
            buffer: vec![0; frame_size],
        }
    }

    /// Next full frame, or `None` at end of stream. A trailing partial frame
    /// is discarded.
    pub fn next_frame(&mut self) -> io::Result<Option<&[u8]>> {
        let mut filled = 0;
        while filled < self.buffer.len() {
            match self.inner.read(&mut self.buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        if filled == self.buffer.len() && filled > 0 {
            Ok(Some(&self.buffer))
        } else {
            Ok(None)
        }
    }
}

/// Duration from frame count and rate; 0 when the rate is not reported.
pub fn scene_duration(frame_count: u64, fps: f64) -> f64 {
    if fps.is_finite() && fps > 0.0 {
        frame_count as f64 / fps
    } else {
        0.0
    }
}

/// Drain the child's stderr on its own thread while stdout carries frames.
fn spawn_stderr_reader(child: &mut Child) -> Option<JoinHandle<String>> {
    let mut stderr = child.stderr.take()?;
    Some(thread::spawn(move || {
        let mut text = String::new();
        let _ = stderr.read_to_string(&mut text);
        text
    }))
}

fn join_stderr(reader: Option<JoinHandle<String>>) -> String {
    reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

/// Detect scene changes in the video at `path`.
pub fn detect_scenes(path: &Path, threshold: f64) -> Result<SceneReport, ProcessingError> {
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(ProcessingError::InvalidInput(
            "Threshold must be a non-negative number".to_string(),
        ));
    }

    let metadata = analyze_video(path)?;
    let frame_size = metadata.width as usize * metadata.height as usize;
    if frame_size == 0 {
        return Err(ProcessingError::CannotOpen(format!(
            "Video stream in {} reports no dimensions",
            path.display()
        )));
    }

    let mut child = Command::new("ffmpeg")
        .args(["-hide_banner", "-loglevel", "error", "-i"])
        .arg(path)
        .args(["-map", "0:v:0", "-f", "rawvideo", "-pix_fmt", "gray", "-"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ProcessingError::Processing(format!("Failed to execute FFmpeg: {}", e)))?;
    let stderr_reader = spawn_stderr_reader(&mut child);

    let mut detector = SceneDetector::new(threshold, metadata.fps);
    let read_result = match child.stdout.take() {
        Some(stdout) => {
            let mut reader = GrayFrameReader::new(stdout, frame_size);
            loop {
                match reader.next_frame() {
                    Ok(Some(frame)) => detector.push_frame(frame),
                    Ok(None) => break Ok(()),
                    Err(e) => break Err(e),
                }
            }
        }
        None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "FFmpeg stdout not captured")),
    };

    // always reap the child, even when reading failed
    let status = child.wait()?;
    let stderr = join_stderr(stderr_reader);
    read_result?;

    if !status.success() {
        tracing::error!(
            path = %path.display(),
            status = %status,
            stderr = %stderr.trim(),
            "FFmpeg frame decode failed"
        );
        return Err(ProcessingError::Processing(format!("FFmpeg exited with {}", status)));
    }

    let decoded = detector.frames_seen();
    let scenes = detector.finish();
    let duration = scene_duration(metadata.frame_count, metadata.fps);

    tracing::info!(
        path = %path.display(),
        threshold,
        frames = decoded,
        scenes = scenes.len(),
        duration,
        "scene detection finished"
    );

    Ok(SceneReport { scenes, duration })
}
