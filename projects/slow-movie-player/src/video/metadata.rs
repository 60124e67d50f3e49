use crate::error::{PlayerError, PlayerResult};
use crate::video::probe::{MediaProbe, StreamInfo};
use crate::video::{is_accepted_extension, ACCEPTED_EXTENSIONS};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Fixed output raster every frame is fitted into.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

/// Which source dimension gets trimmed to reach the canvas aspect ratio.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CropAxis {
    /// Source is wider than the canvas: keep full height, trim width.
    Width,
    /// Source is as wide or narrower: keep full width, trim height.
    Height,
}

/// Crop box as ffmpeg `crop` filter expressions over the input size (`iw`, `ih`).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CropGeometry {
    pub axis: CropAxis,
    pub width_expr: String,
    pub height_expr: String,
}

impl CropGeometry {
    pub fn for_aspect(aspect_ratio: f64, canvas: Canvas) -> Self {
        let target = canvas.aspect_ratio();
        if aspect_ratio > target {
            Self {
                axis: CropAxis::Width,
                width_expr: format!("ih*{}", target),
                height_expr: "ih".to_string(),
            }
        } else {
            Self {
                axis: CropAxis::Height,
                width_expr: "iw".to_string(),
                height_expr: format!("iw*{}", canvas.height as f64 / canvas.width as f64),
            }
        }
    }

    /// Evaluates the crop box for a concrete source size.
    pub fn crop_box(&self, width: u32, height: u32, canvas: Canvas) -> (f64, f64) {
        let (w, h) = (width as f64, height as f64);
        match self.axis {
            CropAxis::Width => (h * canvas.aspect_ratio(), h),
            CropAxis::Height => (w, w * canvas.height as f64 / canvas.width as f64),
        }
    }
}

/// Immutable timing and geometry facts about one video file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VideoMetadata {
    pub frame_rate: f64,
    pub duration_secs: f64,
    pub frame_count: u64,
    /// Milliseconds each frame is notionally on screen.
    pub frame_time_ms: f64,
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: f64,
    pub crop: CropGeometry,
}

impl VideoMetadata {
    /// Checks the file, probes it, and derives playback metrics for `canvas`.
    pub fn resolve(path: &Path, canvas: Canvas, probe: &dyn MediaProbe) -> PlayerResult<Self> {
        if !path.is_file() {
            tracing::error!("Video file not found: {}", path.display());
            return Err(PlayerError::FileNotFound(path.to_path_buf()));
        }
        if !is_accepted_extension(path) {
            let extension = path
                .extension()
                .and_then(|s| s.to_str())
                .map(|s| format!(".{}", s))
                .unwrap_or_default();
            tracing::error!(
                "Unsupported video format: {:?}, supported formats: {:?}",
                extension,
                ACCEPTED_EXTENSIONS
            );
            return Err(PlayerError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension,
                supported: ACCEPTED_EXTENSIONS.join(","),
            });
        }

        let info = probe.probe(path)?;
        let metadata = Self::from_stream(path, &info, canvas)?;
        tracing::info!(
            "Video info for {}: fps={:.3}, duration={:.2}s, frame_count={}, frame_time={:.3}ms, aspect_ratio={:.3}",
            path.display(),
            metadata.frame_rate,
            metadata.duration_secs,
            metadata.frame_count,
            metadata.frame_time_ms,
            metadata.aspect_ratio
        );
        let (crop_w, crop_h) = metadata.crop.crop_box(metadata.width, metadata.height, canvas);
        tracing::debug!(
            "Cropping {} to {:.0}x{:.0} ({:?} axis)",
            path.display(),
            crop_w,
            crop_h,
            metadata.crop.axis
        );
        Ok(metadata)
    }

    fn from_stream(path: &Path, info: &StreamInfo, canvas: Canvas) -> PlayerResult<Self> {
        let (num, den) = info.avg_frame_rate;
        if num <= 0 || den <= 0 {
            return Err(PlayerError::probe(
                path,
                format!("non-positive frame rate {}/{}", num, den),
            ));
        }
        let frame_rate = num as f64 / den as f64;

        if !info.duration_secs.is_finite() || info.duration_secs < 0.0 {
            return Err(PlayerError::probe(
                path,
                format!("invalid duration {}", info.duration_secs),
            ));
        }

        let frame_count = match info.frame_count {
            Some(n) if n > 0 => n,
            _ => (info.duration_secs * frame_rate).floor() as u64,
        };
        if frame_count == 0 {
            return Err(PlayerError::probe(path, "video has no frames"));
        }

        if info.width == 0 || info.height == 0 {
            return Err(PlayerError::probe(
                path,
                format!("invalid frame size {}x{}", info.width, info.height),
            ));
        }
        let aspect_ratio = info.width as f64 / info.height as f64;

        Ok(Self {
            frame_rate,
            duration_secs: info.duration_secs,
            frame_count,
            frame_time_ms: 1000.0 / frame_rate,
            width: info.width,
            height: info.height,
            aspect_ratio,
            crop: CropGeometry::for_aspect(aspect_ratio, canvas),
        })
    }

    /// Millisecond timecode of `frame`, truncated to whole milliseconds.
    pub fn timecode_ms(&self, frame: u64) -> u64 {
        (frame as f64 * self.frame_time_ms).floor() as u64
    }
}
