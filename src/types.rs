// types.rs - Common data structures shared by the processing modules
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Output frame rate used for GIFs when the caller does not pick one.
pub const DEFAULT_GIF_FPS: f64 = 10.0;

// Video metadata structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub file_path: String,
    pub duration_seconds: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Frame count reported by the container, or estimated from duration x fps.
    pub frame_count: u64,
    pub has_audio: bool,
    pub has_video: bool,
    pub format: String,
    pub file_size_mb: f64,
}

impl VideoMetadata {
    /// Duration if the probe reported one.
    pub fn known_duration(&self) -> Option<f64> {
        (self.duration_seconds.is_finite() && self.duration_seconds > 0.0)
            .then_some(self.duration_seconds)
    }
}

/// Container written by the pipeline, selected from the output extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Gif,
    Mp4,
}

impl OutputFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "gif" => Some(Self::Gif),
            "mp4" => Some(Self::Mp4),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Gif => "gif",
            Self::Mp4 => "mp4",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Gif => "image/gif",
            Self::Mp4 => "video/mp4",
        }
    }
}

// Trim window in seconds; either side may be left open
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrimWindow {
    pub start: Option<f64>,
    pub end: Option<f64>,
}

impl TrimWindow {
    pub fn is_set(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }
}

/// Crop rectangle with a top-left origin, in pixels of the source frame.
///
/// Signed so that out-of-range client values survive deserialization and
/// can be reported instead of rejected by the JSON layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl CropRect {
    pub fn fits_within(&self, frame_width: u32, frame_height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.x >= 0
            && self.y >= 0
            && self.x.checked_add(self.width).is_some_and(|right| right <= i64::from(frame_width))
            && self.y.checked_add(self.height).is_some_and(|bottom| bottom <= i64::from(frame_height))
    }
}

// Target dimensions; a missing side keeps the aspect ratio
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resize {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Alignment of the overlay along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    Start,
    Center,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AxisPosition {
    Align(Align),
    Pixels(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPosition {
    pub x: AxisPosition,
    pub y: AxisPosition,
}

impl Default for TextPosition {
    fn default() -> Self {
        Self {
            x: AxisPosition::Align(Align::Center),
            y: AxisPosition::Align(Align::Center),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextOverlay {
    pub text: String,
    pub font_size: u32,
    pub color: String,
    /// Font family name or path to a font file.
    pub font: String,
    pub bg_color: Option<String>,
    pub position: TextPosition,
}

impl TextOverlay {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font_size: 20,
            color: "white".to_string(),
            font: "Arial".to_string(),
            bg_color: None,
            position: TextPosition::default(),
        }
    }
}

/// Everything one conversion needs besides the input and output paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertOptions {
    /// Output frame rate for GIFs, and for MP4s when the source rate is unknown.
    pub fps: f64,
    pub trim: TrimWindow,
    pub crop: Option<CropRect>,
    pub resize: Resize,
    pub speed_factor: f64,
    pub reverse: bool,
    pub text: Option<TextOverlay>,
    pub include_audio: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            fps: DEFAULT_GIF_FPS,
            trim: TrimWindow::default(),
            crop: None,
            resize: Resize::default(),
            speed_factor: 1.0,
            reverse: false,
            text: None,
            include_audio: false,
        }
    }
}

/// Scene-change timestamps in seconds plus the total duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneReport {
    pub scenes: Vec<f64>,
    pub duration: f64,
}
