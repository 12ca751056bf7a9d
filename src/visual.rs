// src/visual.rs
//
// Text overlay: anchor parsing, font lookup and the drawtext filter.

use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::types::{Align, AxisPosition, TextOverlay, TextPosition};
use crate::utils::escape_filter_value;

lazy_static! {
    static ref COLOR_RE: Regex = Regex::new(
        r"^(#[0-9A-Fa-f]{6}([0-9A-Fa-f]{2})?|0x[0-9A-Fa-f]{6}([0-9A-Fa-f]{2})?|[A-Za-z]{3,32})(@(0(\.[0-9]+)?|1(\.0+)?))?$"
    )
    .expect("color pattern is valid");
}

const DEFAULT_TEXT_COLOR: &str = "white";
const BOX_BORDER_WIDTH: u32 = 6;

/// Parse one of the nine named anchors (`top-left`, `bottom center`, ...).
pub fn parse_named_position(name: &str) -> Option<TextPosition> {
    let key: String = name
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == '_' { '-' } else { c.to_ascii_lowercase() })
        .collect();

    let (x, y) = match key.as_str() {
        "center" | "centre" | "center-center" => (Align::Center, Align::Center),
        "top-left" => (Align::Start, Align::Start),
        "top-center" => (Align::Center, Align::Start),
        "top-right" => (Align::End, Align::Start),
        "center-left" => (Align::Start, Align::Center),
        "center-right" => (Align::End, Align::Center),
        "bottom-left" => (Align::Start, Align::End),
        "bottom-center" => (Align::Center, Align::End),
        "bottom-right" => (Align::End, Align::End),
        _ => return None,
    };

    Some(TextPosition {
        x: AxisPosition::Align(x),
        y: AxisPosition::Align(y),
    })
}

/// Horizontal keyword: `left`, `center`, `right`.
pub fn parse_x_keyword(word: &str) -> Option<Align> {
    match word.trim().to_ascii_lowercase().as_str() {
        "left" => Some(Align::Start),
        "center" | "centre" => Some(Align::Center),
        "right" => Some(Align::End),
        _ => None,
    }
}

/// Vertical keyword: `top`, `center`, `bottom`.
pub fn parse_y_keyword(word: &str) -> Option<Align> {
    match word.trim().to_ascii_lowercase().as_str() {
        "top" => Some(Align::Start),
        "center" | "centre" => Some(Align::Center),
        "bottom" => Some(Align::End),
        _ => None,
    }
}

/// drawtext `x`/`y` expressions for a position.
pub fn position_expressions(position: &TextPosition) -> (String, String) {
    let axis = |pos: &AxisPosition, frame: &str, text: &str| match pos {
        AxisPosition::Pixels(px) => px.to_string(),
        AxisPosition::Align(Align::Start) => "0".to_string(),
        AxisPosition::Align(Align::Center) => format!("({}-{})/2", frame, text),
        AxisPosition::Align(Align::End) => format!("{}-{}", frame, text),
    };

    (
        axis(&position.x, "w", "text_w"),
        axis(&position.y, "h", "text_h"),
    )
}

pub fn is_safe_color(color: &str) -> bool {
    COLOR_RE.is_match(color.trim())
}

/// Resolve a font name or path to a font file on disk.
///
/// Returns `None` when nothing usable is found; callers skip the overlay.
pub fn resolve_font(font: &str) -> Option<PathBuf> {
    let font = font.trim();
    if font.is_empty() {
        return None;
    }

    let as_path = Path::new(font);
    if as_path.is_file() && is_font_file(as_path) {
        return Some(as_path.to_path_buf());
    }

    let output = match Command::new("fc-match").arg("--format=%{file}").arg(font).output() {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!(font = %font, error = %e, "fc-match unavailable, cannot resolve font");
            return None;
        }
    };

    if !output.status.success() {
        return None;
    }

    let resolved = PathBuf::from(String::from_utf8_lossy(&output.stdout).trim());
    if resolved.is_file() && is_font_file(&resolved) {
        tracing::debug!(font = %font, file = %resolved.display(), "resolved font");
        Some(resolved)
    } else {
        None
    }
}

fn is_font_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "ttf" | "otf" | "ttc"))
        .unwrap_or(false)
}

/// Build the drawtext filter for an overlay whose text lives in `text_file`.
pub fn build_drawtext_filter(overlay: &TextOverlay, font_file: &Path, text_file: &Path) -> String {
    let color = if is_safe_color(&overlay.color) {
        overlay.color.trim().to_string()
    } else {
        tracing::warn!(color = %overlay.color, "Unsupported text color, using {}", DEFAULT_TEXT_COLOR);
        DEFAULT_TEXT_COLOR.to_string()
    };

    let (x, y) = position_expressions(&overlay.position);
    let mut filter = format!(
        "drawtext=fontfile={}:textfile={}:expansion=none:fontsize={}:fontcolor={}:x={}:y={}",
        escape_filter_value(&font_file.to_string_lossy()),
        escape_filter_value(&text_file.to_string_lossy()),
        overlay.font_size.max(1),
        color,
        escape_filter_value(&x),
        escape_filter_value(&y),
    );

    match overlay.bg_color.as_deref().map(str::trim) {
        None | Some("") | Some("transparent") | Some("none") => {}
        Some(bg) if is_safe_color(bg) => {
            filter.push_str(&format!(":box=1:boxcolor={}:boxborderw={}", bg, BOX_BORDER_WIDTH));
        }
        Some(bg) => {
            tracing::warn!(bg_color = %bg, "Unsupported text background color, drawing without box");
        }
    }

    filter
}
