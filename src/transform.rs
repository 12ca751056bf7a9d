// src/transform.rs
//
// Edit pipeline: trim -> crop -> speed -> reverse -> resize -> text -> encode,
// expressed as a single ffmpeg filter graph.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::core::analyze_video;
use crate::error::ProcessingError;
use crate::types::{ConvertOptions, CropRect, OutputFormat, TextOverlay, VideoMetadata};
use crate::utils::{build_atempo_chain, build_crop_filter, build_resize_filter, execute_ffmpeg_command};
use crate::visual::{build_drawtext_filter, resolve_font};

const EVEN_DIMENSIONS_FILTER: &str = "scale=trunc(iw/2)*2:trunc(ih/2)*2";

/// Resolved trim window; `end` stays open when the source duration is unknown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedTrim {
    pub start: f64,
    pub end: Option<f64>,
}

/// A validated conversion, ready to be turned into ffmpeg arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct EditPlan {
    pub format: OutputFormat,
    pub trim: Option<ResolvedTrim>,
    pub crop: Option<CropRect>,
    pub speed_factor: f64,
    pub reverse: bool,
    pub resize: Option<String>,
    pub text: Option<(TextOverlay, PathBuf)>,
    /// Output frame rate passed to the encoder.
    pub output_fps: f64,
    pub include_audio: bool,
    /// Length of the rendered clip in seconds, when the source duration is known.
    pub expected_duration: Option<f64>,
}

impl EditPlan {
    /// Validate `options` against the probed source.
    ///
    /// Recoverable problems (bad crop, missing font, audio that cannot be
    /// attached) are logged and dropped from the plan.
    pub fn build(
        metadata: &VideoMetadata,
        options: &ConvertOptions,
        format: OutputFormat,
        font_file: Option<PathBuf>,
    ) -> Result<Self, ProcessingError> {
        if !options.speed_factor.is_finite() || options.speed_factor <= 0.0 {
            return Err(ProcessingError::InvalidInput(
                "Speed factor must be greater than 0".to_string(),
            ));
        }
        if !options.fps.is_finite() || options.fps <= 0.0 {
            return Err(ProcessingError::InvalidInput(
                "Frame rate must be greater than 0".to_string(),
            ));
        }

        let duration = metadata.known_duration();
        let trim = resolve_trim(options, duration)?;

        if options.reverse && duration.is_none() {
            return Err(ProcessingError::InvalidInput(
                "Cannot reverse a video of unknown duration".to_string(),
            ));
        }

        let crop = options.crop.and_then(|crop| {
            if crop.fits_within(metadata.width, metadata.height) {
                Some(crop)
            } else {
                tracing::warn!(
                    x = crop.x,
                    y = crop.y,
                    width = crop.width,
                    height = crop.height,
                    frame_width = metadata.width,
                    frame_height = metadata.height,
                    "Crop rectangle outside the frame, skipping crop"
                );
                None
            }
        });

        let resize = build_resize_filter(
            options.resize.width.filter(|w| *w > 0),
            options.resize.height.filter(|h| *h > 0),
            format == OutputFormat::Mp4,
        );

        let text = match (&options.text, font_file) {
            (Some(overlay), _) if overlay.text.trim().is_empty() => None,
            (Some(overlay), Some(font)) => Some((overlay.clone(), font)),
            (Some(overlay), None) => {
                tracing::warn!(font = %overlay.font, "Font could not be resolved, skipping text overlay");
                None
            }
            (None, _) => None,
        };

        let include_audio = match (options.include_audio, format) {
            (false, _) => false,
            (true, OutputFormat::Gif) => {
                tracing::warn!("GIF output cannot carry audio, ignoring include_audio");
                false
            }
            (true, OutputFormat::Mp4) if !metadata.has_audio => {
                tracing::warn!(path = %metadata.file_path, "Source has no audio track, writing video only");
                false
            }
            (true, OutputFormat::Mp4) => true,
        };

        let output_fps = match format {
            OutputFormat::Gif => options.fps,
            OutputFormat::Mp4 if metadata.fps.is_finite() && metadata.fps > 0.0 => metadata.fps,
            OutputFormat::Mp4 => options.fps,
        };

        let expected_duration = duration.map(|total| {
            let (start, end) = match trim {
                Some(t) => (t.start, t.end.unwrap_or(total)),
                None => (0.0, total),
            };
            (end - start) / options.speed_factor
        });

        Ok(Self {
            format,
            trim,
            crop,
            speed_factor: options.speed_factor,
            reverse: options.reverse,
            resize,
            text,
            output_fps,
            include_audio,
            expected_duration,
        })
    }

    fn video_chain(&self, text_file: Option<&Path>) -> String {
        let mut filters = Vec::new();

        if let Some(trim) = self.trim {
            filters.push(match trim.end {
                Some(end) => format!("trim=start={:.3}:end={:.3}", trim.start, end),
                None => format!("trim=start={:.3}", trim.start),
            });
            filters.push("setpts=PTS-STARTPTS".to_string());
        }
        if let Some(crop) = self.crop {
            filters.push(build_crop_filter(crop.x, crop.y, crop.width, crop.height));
        }
        if (self.speed_factor - 1.0).abs() > f64::EPSILON {
            filters.push(format!("setpts=PTS/{}", self.speed_factor));
        }
        if self.reverse {
            filters.push("reverse".to_string());
        }
        if let Some(resize) = &self.resize {
            filters.push(resize.clone());
        }
        if let (Some((overlay, font)), Some(text_file)) = (&self.text, text_file) {
            filters.push(build_drawtext_filter(overlay, font, text_file));
        }

        match self.format {
            OutputFormat::Gif => {
                filters.push(format!("fps={}", self.output_fps));
                format!(
                    "[0:v:0]{},split[s0][s1];[s0]palettegen[p];[s1][p]paletteuse[vout]",
                    filters.join(",")
                )
            }
            OutputFormat::Mp4 => {
                // yuv420p needs even dimensions; an odd side loses one pixel
                filters.push(EVEN_DIMENSIONS_FILTER.to_string());
                filters.push("format=yuv420p".to_string());
                format!("[0:v:0]{}[vout]", filters.join(","))
            }
        }
    }

    fn audio_chain(&self) -> String {
        let mut filters = Vec::new();

        if let Some(trim) = self.trim {
            filters.push(match trim.end {
                Some(end) => format!("atrim=start={:.3}:end={:.3}", trim.start, end),
                None => format!("atrim=start={:.3}", trim.start),
            });
            filters.push("asetpts=PTS-STARTPTS".to_string());
        }
        filters.extend(build_atempo_chain(self.speed_factor));
        if self.reverse {
            filters.push("areverse".to_string());
        }
        if filters.is_empty() {
            filters.push("anull".to_string());
        }

        format!("[0:a:0]{}[aout]", filters.join(","))
    }

    /// Full ffmpeg argument list. `text_file` holds the overlay text; the
    /// overlay is left out when it is `None`.
    pub fn ffmpeg_args(&self, input: &Path, output: &Path, text_file: Option<&Path>) -> Vec<String> {
        let mut graph = self.video_chain(text_file);
        if self.include_audio {
            graph.push(';');
            graph.push_str(&self.audio_chain());
        }

        let mut args: Vec<String> = vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-y".into(),
            "-i".into(),
            input.to_string_lossy().to_string(),
            "-filter_complex".into(),
            graph,
            "-map".into(),
            "[vout]".into(),
        ];

        if self.include_audio {
            args.extend(["-map", "[aout]", "-c:a", "aac", "-b:a", "128k"].map(String::from));
        } else {
            args.push("-an".into());
        }

        match self.format {
            OutputFormat::Gif => {
                args.extend(["-loop", "0"].map(String::from));
            }
            OutputFormat::Mp4 => {
                args.extend(
                    ["-c:v", "libx264", "-preset", "veryfast", "-crf", "23", "-movflags", "+faststart"]
                        .map(String::from),
                );
                args.push("-r".into());
                args.push(format!("{}", self.output_fps));
            }
        }

        args.push(output.to_string_lossy().to_string());
        args
    }
}

fn resolve_trim(options: &ConvertOptions, duration: Option<f64>) -> Result<Option<ResolvedTrim>, ProcessingError> {
    if !options.trim.is_set() {
        return Ok(None);
    }

    let start = options.trim.start.unwrap_or(0.0);
    let end = options.trim.end.or(duration);
    if !start.is_finite() || end.map(|e| !e.is_finite()).unwrap_or(false) {
        return Err(ProcessingError::InvalidInput("Trim times must be numbers".to_string()));
    }

    let start = if start < 0.0 {
        tracing::warn!(start, "Negative start time, clamping to 0");
        0.0
    } else {
        start
    };

    let end = match (end, duration) {
        (Some(end), Some(total)) if end > total => {
            tracing::warn!(end, duration = total, "End time beyond video duration, clamping");
            Some(total)
        }
        (end, _) => end,
    };

    if let Some(end) = end {
        if start >= end {
            return Err(ProcessingError::InvalidInput(
                "Start time must be less than end time".to_string(),
            ));
        }
    }

    Ok(Some(ResolvedTrim { start, end }))
}

/// Write the overlay text next to the output so drawtext can read it verbatim.
fn write_text_sidecar(output: &Path, text: &str) -> Result<tempfile::TempPath, ProcessingError> {
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut file = tempfile::Builder::new()
        .prefix("overlay_")
        .suffix(".txt")
        .tempfile_in(dir)?;
    file.write_all(text.as_bytes())?;
    file.flush()?;
    Ok(file.into_temp_path())
}

/// Render `input` into `output` with every edit in `options` applied.
///
/// The output extension (`.gif` or `.mp4`) picks the encoder.
pub fn process_video_output(
    input: &Path,
    output: &Path,
    options: &ConvertOptions,
) -> Result<PathBuf, ProcessingError> {
    if !input.exists() {
        return Err(ProcessingError::NotFound(input.to_path_buf()));
    }

    let format = OutputFormat::from_path(output).ok_or_else(|| {
        ProcessingError::Processing(format!("Unsupported output format: {}", output.display()))
    })?;

    let metadata = analyze_video(input).map_err(|e| match e {
        ProcessingError::CannotOpen(detail) => ProcessingError::Processing(detail),
        other => other,
    })?;

    let font_file = options
        .text
        .as_ref()
        .filter(|overlay| !overlay.text.trim().is_empty())
        .and_then(|overlay| resolve_font(&overlay.font));

    let plan = EditPlan::build(&metadata, options, format, font_file)?;

    // dropped on every return path below, which removes the file
    let sidecar = match &plan.text {
        Some((overlay, _)) => Some(write_text_sidecar(output, &overlay.text)?),
        None => None,
    };

    let args = plan.ffmpeg_args(input, output, sidecar.as_deref());
    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        format = ?plan.format,
        expected_duration = ?plan.expected_duration,
        "rendering video"
    );

    let mut command = Command::new("ffmpeg");
    command.args(&args);
    execute_ffmpeg_command(command)?;

    if !output.exists() {
        return Err(ProcessingError::Processing(format!(
            "FFmpeg reported success but {} was not written",
            output.display()
        )));
    }

    Ok(output.to_path_buf())
}
