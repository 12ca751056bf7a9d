// src/models/api.rs
//
// Request and response bodies for the HTTP surface.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::mailer::ContactMessage;
use crate::types::{
    AxisPosition, ConvertOptions, CropRect, OutputFormat, Resize, TextOverlay, TextPosition, TrimWindow,
    DEFAULT_GIF_FPS,
};
use crate::visual::{parse_named_position, parse_x_keyword, parse_y_keyword};

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid");
}

const MAX_CONTACT_NAME: usize = 200;
const MAX_CONTACT_MESSAGE: usize = 5000;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub status: &'static str,
    pub filename: String,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub status: &'static str,
    pub scenes: Vec<f64>,
    pub duration: f64,
    pub preview_url: String,
}

#[derive(Debug, Serialize)]
pub struct ConvertResponse {
    pub status: &'static str,
    pub filename: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct ProcessUrlRequest {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub filename: Option<String>,
    pub threshold: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub message: Option<String>,
}

impl ContactRequest {
    pub fn validate(self) -> Result<ContactMessage, ApiError> {
        let field = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let (Some(name), Some(email), Some(message)) = (field(self.name), field(self.email), field(self.message)) else {
            return Err(ApiError::bad_request("Name, email and message are required"));
        };

        if !EMAIL_RE.is_match(&email) || email.parse::<lettre::Address>().is_err() {
            return Err(ApiError::bad_request("Invalid email address"));
        }
        if name.chars().count() > MAX_CONTACT_NAME || message.chars().count() > MAX_CONTACT_MESSAGE {
            return Err(ApiError::bad_request("Contact message is too long"));
        }

        Ok(ContactMessage { name, email, message })
    }
}

/// One axis of a `[x, y]` position: a pixel offset or a keyword.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AxisInput {
    Pixels(f64),
    Keyword(String),
}

/// `"bottom-center"` or `["center", 60]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PositionInput {
    Named(String),
    Pair(AxisInput, AxisInput),
}

impl PositionInput {
    pub fn resolve(&self) -> TextPosition {
        match self {
            Self::Named(name) => parse_named_position(name).unwrap_or_else(|| {
                tracing::warn!(position = %name, "Unknown text position, using center");
                TextPosition::default()
            }),
            Self::Pair(x, y) => TextPosition {
                x: resolve_axis(x, parse_x_keyword),
                y: resolve_axis(y, parse_y_keyword),
            },
        }
    }
}

fn resolve_axis(input: &AxisInput, keyword: fn(&str) -> Option<crate::types::Align>) -> AxisPosition {
    match input {
        AxisInput::Pixels(px) if px.is_finite() => AxisPosition::Pixels(px.round() as i64),
        AxisInput::Keyword(word) => match keyword(word) {
            Some(align) => AxisPosition::Align(align),
            None => {
                tracing::warn!(position = %word, "Unknown text position keyword, using center");
                AxisPosition::Align(crate::types::Align::Center)
            }
        },
        AxisInput::Pixels(_) => AxisPosition::Align(crate::types::Align::Center),
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct NestedCrop {
    pub x1: f64,
    pub y1: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConvertRequest {
    pub filename: Option<String>,
    pub fps: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    #[serde(alias = "start")]
    pub start_time: Option<f64>,
    #[serde(alias = "end")]
    pub end_time: Option<f64>,
    pub text: Option<String>,
    pub font_size: Option<f64>,
    pub text_position: Option<PositionInput>,
    pub text_color: Option<String>,
    pub text_bg_color: Option<String>,
    pub font_style: Option<String>,
    pub speed_factor: Option<f64>,
    #[serde(default)]
    pub reverse: bool,
    #[serde(default)]
    pub include_audio: bool,
    pub output_format: Option<String>,
    pub crop_x: Option<f64>,
    pub crop_y: Option<f64>,
    pub crop_w: Option<f64>,
    pub crop_h: Option<f64>,
    pub crop: Option<NestedCrop>,
}

/// A convert request after shape validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertJob {
    pub filename: String,
    pub format: OutputFormat,
    pub options: ConvertOptions,
}

fn positive_dimension(value: Option<f64>) -> Option<u32> {
    value
        .filter(|v| v.is_finite() && *v >= 1.0)
        .map(|v| v.round().min(f64::from(u32::MAX)) as u32)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl ConvertRequest {
    pub fn into_job(self) -> Result<ConvertJob, ApiError> {
        let filename = non_empty(self.filename).ok_or_else(|| ApiError::bad_request("Filename required"))?;

        let format = match non_empty(self.output_format).map(|f| f.to_ascii_lowercase()) {
            Some(f) if f == "gif" => OutputFormat::Gif,
            Some(f) if f == "mp4" => OutputFormat::Mp4,
            Some(other) => return Err(ApiError::bad_request(format!("Unsupported output format: {}", other))),
            None if self.include_audio => OutputFormat::Mp4,
            None => OutputFormat::Gif,
        };

        let crop = match (self.crop_x, self.crop_y, self.crop_w, self.crop_h, self.crop) {
            (Some(x), Some(y), Some(w), Some(h), _) => Some((x, y, w, h)),
            (_, _, _, _, Some(c)) => Some((c.x1, c.y1, c.width, c.height)),
            _ => None,
        }
        .filter(|(x, y, w, h)| [x, y, w, h].iter().all(|v| v.is_finite()))
        .map(|(x, y, w, h)| CropRect {
            x: x.round() as i64,
            y: y.round() as i64,
            width: w.round() as i64,
            height: h.round() as i64,
        });

        let text = non_empty(self.text).map(|content| {
            let mut overlay = TextOverlay::new(content);
            if let Some(size) = positive_dimension(self.font_size) {
                overlay.font_size = size;
            }
            if let Some(color) = non_empty(self.text_color) {
                overlay.color = color;
            }
            if let Some(font) = non_empty(self.font_style) {
                overlay.font = font;
            }
            overlay.bg_color = non_empty(self.text_bg_color);
            overlay.position = self.text_position.as_ref().map(PositionInput::resolve).unwrap_or_default();
            overlay
        });

        let options = ConvertOptions {
            fps: self.fps.unwrap_or(DEFAULT_GIF_FPS),
            trim: TrimWindow {
                start: self.start_time,
                end: self.end_time,
            },
            crop,
            resize: Resize {
                width: positive_dimension(self.width),
                height: positive_dimension(self.height),
            },
            speed_factor: self.speed_factor.unwrap_or(1.0),
            reverse: self.reverse,
            text,
            include_audio: self.include_audio,
        };

        Ok(ConvertJob { filename, format, options })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Align;
    use serde_json::json;

    fn request(value: serde_json::Value) -> ConvertRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_frontend_payload() {
        let job = request(json!({
            "filename": "cat_1.mp4",
            "fps": 10,
            "width": 320,
            "start_time": 2,
            "end_time": 5.5,
            "text": "Hello",
            "font_size": 32,
            "text_position": "bottom-center",
            "text_color": "#FFFFFF",
            "text_bg_color": null,
            "font_style": "DejaVu Sans",
            "speed_factor": 1.0,
            "reverse": false,
            "include_audio": false,
            "output_format": "gif",
            "crop_x": 10, "crop_y": 0, "crop_w": 300.4, "crop_h": 200
        }))
        .into_job()
        .unwrap();

        assert_eq!(job.filename, "cat_1.mp4");
        assert_eq!(job.format, OutputFormat::Gif);
        assert_eq!(job.options.trim, TrimWindow { start: Some(2.0), end: Some(5.5) });
        assert_eq!(job.options.resize.width, Some(320));
        assert_eq!(job.options.crop, Some(CropRect { x: 10, y: 0, width: 300, height: 200 }));

        let text = job.options.text.unwrap();
        assert_eq!(text.font_size, 32);
        assert_eq!(text.font, "DejaVu Sans");
        assert_eq!(text.position.y, AxisPosition::Align(Align::End));
    }

    #[test]
    fn test_aliases_and_nested_crop() {
        let job = request(json!({
            "filename": "a.mp4",
            "start": 1, "end": 3,
            "crop": { "x1": 5, "y1": 6, "width": 100, "height": 50 }
        }))
        .into_job()
        .unwrap();

        assert_eq!(job.options.trim, TrimWindow { start: Some(1.0), end: Some(3.0) });
        assert_eq!(job.options.crop, Some(CropRect { x: 5, y: 6, width: 100, height: 50 }));
        assert_eq!(job.options.fps, DEFAULT_GIF_FPS);
        assert!(job.options.text.is_none());
    }

    #[test]
    fn test_output_format_fallback() {
        let job = request(json!({ "filename": "a.mp4", "include_audio": true })).into_job().unwrap();
        assert_eq!(job.format, OutputFormat::Mp4);

        let job = request(json!({ "filename": "a.mp4" })).into_job().unwrap();
        assert_eq!(job.format, OutputFormat::Gif);

        let err = request(json!({ "filename": "a.mp4", "output_format": "webm" })).into_job().unwrap_err();
        assert_eq!(err.to_string(), "Unsupported output format: webm");
    }

    #[test]
    fn test_out_of_range_crop_saturates() {
        let job = request(json!({
            "filename": "a.mp4",
            "crop_x": 1e19, "crop_y": -1e19, "crop_w": 10, "crop_h": 10
        }))
        .into_job()
        .unwrap();

        let crop = job.options.crop.unwrap();
        assert_eq!((crop.x, crop.y), (i64::MAX, i64::MIN));
        assert!(!crop.fits_within(640, 480));
    }

    #[test]
    fn test_missing_filename() {
        let err = request(json!({ "fps": 10 })).into_job().unwrap_err();
        assert_eq!(err.to_string(), "Filename required");
    }

    #[test]
    fn test_mixed_position_pair() {
        let pos: PositionInput = serde_json::from_value(json!(["center", 60])).unwrap();
        let pos = pos.resolve();
        assert_eq!(pos.x, AxisPosition::Align(Align::Center));
        assert_eq!(pos.y, AxisPosition::Pixels(60));

        let pos: PositionInput = serde_json::from_value(json!("somewhere")).unwrap();
        assert_eq!(pos.resolve(), TextPosition::default());
    }

    #[test]
    fn test_contact_validation() {
        let ok = ContactRequest {
            name: Some(" Ada ".into()),
            email: Some("ada@example.com".into()),
            message: Some("Hi".into()),
        }
        .validate()
        .unwrap();
        assert_eq!(ok.name, "Ada");

        let missing = ContactRequest { name: None, email: Some("a@b.co".into()), message: Some("x".into()) };
        assert!(missing.validate().is_err());

        let bad_email = ContactRequest {
            name: Some("Ada".into()),
            email: Some("ada.example.com".into()),
            message: Some("Hi".into()),
        };
        assert_eq!(bad_email.validate().unwrap_err().to_string(), "Invalid email address");

        let undeliverable = ContactRequest {
            name: Some("Ada".into()),
            email: Some("<a>@b.co".into()),
            message: Some("Hi".into()),
        };
        let err = undeliverable.validate().unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Invalid email address");
    }
}
