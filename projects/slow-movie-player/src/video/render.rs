use crate::error::{PlayerError, PlayerResult};
use crate::video::metadata::{Canvas, CropGeometry};
use futures::future::BoxFuture;
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// One frame extraction: which timecode of which file, fitted how, written where.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub video_path: PathBuf,
    pub frame: u64,
    pub timecode_ms: u64,
    pub crop: CropGeometry,
    pub canvas: Canvas,
    /// Opaque dithering label, carried through untouched.
    pub dither: String,
    pub output: PathBuf,
}

/// A raster written to disk for a single frame.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RenderedFrame {
    pub path: PathBuf,
    pub frame: u64,
    pub timecode_ms: u64,
    pub width: u32,
    pub height: u32,
}

/// Produces a canvas-sized image for a frame of a video.
///
/// Implementations must be cancel-safe: dropping the returned future abandons
/// the render and releases whatever process or resource backs it.
pub trait FrameRenderer: Send + Sync {
    fn render<'a>(&'a self, request: &'a RenderRequest)
        -> BoxFuture<'a, PlayerResult<RenderedFrame>>;
}

/// Renders frames by running the ffmpeg command line tool.
#[derive(Debug, Clone)]
pub struct FfmpegRenderer {
    binary: PathBuf,
}

impl FfmpegRenderer {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub async fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    async fn run(&self, request: &RenderRequest) -> PlayerResult<RenderedFrame> {
        if let Some(parent) = request.output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let staging = staging_path(&request.output);

        tracing::debug!(
            "Rendering frame {} ({}ms) of {} with dither '{}'",
            request.frame,
            request.timecode_ms,
            request.video_path.display(),
            request.dither
        );

        // kill_on_drop: a cancelled render must not leave ffmpeg running.
        let output = Command::new(&self.binary)
            .args(ffmpeg_args(request, &staging))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                PlayerError::render(format!(
                    "failed to launch {}: {}",
                    self.binary.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let last_line = stderr.lines().last().unwrap_or("").trim();
            return Err(PlayerError::render(format!(
                "ffmpeg exited with {} at {}ms: {}",
                output.status, request.timecode_ms, last_line
            )));
        }

        // Decodes the header and renames on disk, keep it off the async workers.
        let request = request.clone();
        tokio::task::spawn_blocking(move || publish_artifact(&staging, &request))
            .await
            .map_err(|e| PlayerError::render(e.to_string()))?
    }
}

impl FrameRenderer for FfmpegRenderer {
    fn render<'a>(
        &'a self,
        request: &'a RenderRequest,
    ) -> BoxFuture<'a, PlayerResult<RenderedFrame>> {
        Box::pin(self.run(request))
    }
}

/// Filter chain: square pixels, crop to canvas aspect, fit, pad, single channel.
pub fn filter_graph(crop: &CropGeometry, canvas: Canvas) -> String {
    let (w, h) = (canvas.width, canvas.height);
    format!(
        "scale=iw*sar:ih,crop={}:{},scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:-1:-1,format=gray",
        crop.width_expr, crop.height_expr
    )
}

pub fn ffmpeg_args(request: &RenderRequest, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-y", "-ss"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(format!("{}ms", request.timecode_ms).into());
    args.push("-i".into());
    args.push(request.video_path.clone().into_os_string());
    args.push("-vf".into());
    args.push(filter_graph(&request.crop, request.canvas).into());
    args.push("-frames:v".into());
    args.push("1".into());
    args.push("-copyts".into());
    args.push(output.as_os_str().to_owned());
    args
}

/// Sibling path the renderer writes to before the artifact is moved into place.
pub fn staging_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("frame");
    let ext = output.extension().and_then(|s| s.to_str()).unwrap_or("bmp");
    output.with_file_name(format!("{}.partial.{}", stem, ext))
}

/// Checks a freshly written raster against the canvas and renames it over the
/// final output path, so readers never see a partial file.
pub fn publish_artifact(staging: &Path, request: &RenderRequest) -> PlayerResult<RenderedFrame> {
    let (width, height) = image::image_dimensions(staging).map_err(|e| {
        PlayerError::render(format!(
            "unreadable artifact {}: {}",
            staging.display(),
            e
        ))
    })?;

    if (width, height) != (request.canvas.width, request.canvas.height) {
        let _ = std::fs::remove_file(staging);
        return Err(PlayerError::render(format!(
            "artifact is {}x{}, expected {}x{}",
            width, height, request.canvas.width, request.canvas.height
        )));
    }

    std::fs::rename(staging, &request.output)?;

    Ok(RenderedFrame {
        path: request.output.clone(),
        frame: request.frame,
        timecode_ms: request.timecode_ms,
        width,
        height,
    })
}
