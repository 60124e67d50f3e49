// Batch pre-render: writes every frame of a video to an output directory as
// `<timecode>ms.bmp`, using the same metadata and render path as live playback.

use crate::error::PlayerError;
use crate::video::metadata::{Canvas, VideoMetadata};
use crate::video::probe::MediaProbe;
use crate::video::render::{FrameRenderer, RenderRequest};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub struct ConversionStats {
    pub rendered_frames: u64,
    pub duration: Duration,
}

pub struct ConvertJob<'a> {
    pub video: PathBuf,
    pub output_dir: PathBuf,
    pub overwrite: bool,
    pub canvas: Canvas,
    pub dither: String,
    pub probe: &'a dyn MediaProbe,
    pub renderer: &'a dyn FrameRenderer,
}

/// Creates `output_dir`, or empties it when `overwrite` is set.
pub fn prepare_output_dir(output_dir: &Path, overwrite: bool) -> Result<(), PlayerError> {
    if !output_dir.is_dir() {
        fs::create_dir_all(output_dir)?;
        return Ok(());
    }
    if !overwrite {
        tracing::error!("Output directory already exists: {}", output_dir.display());
        return Err(PlayerError::OutputExists(output_dir.to_path_buf()));
    }

    tracing::warn!(
        "Output directory already exists: {}, overwriting",
        output_dir.display()
    );
    for entry in fs::read_dir(output_dir)? {
        let path = entry?.path();
        if path.is_file() {
            fs::remove_file(path)?;
        }
    }
    Ok(())
}

pub fn frame_file_name(timecode_ms: u64) -> String {
    format!("{}ms.bmp", timecode_ms)
}

pub async fn convert_video(job: ConvertJob<'_>) -> Result<ConversionStats> {
    let metadata = VideoMetadata::resolve(&job.video, job.canvas, job.probe)?;
    prepare_output_dir(&job.output_dir, job.overwrite)?;

    tracing::info!(
        "Converting {} ({} frames) into {}",
        job.video.display(),
        metadata.frame_count,
        job.output_dir.display()
    );

    let pb = ProgressBar::new(metadata.frame_count);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec:.1.yellow} frames, {eta})")?
            .progress_chars("#>-"),
    );

    let start_time = Instant::now();
    let mut rendered_frames = 0;
    for frame in 0..metadata.frame_count {
        let timecode_ms = metadata.timecode_ms(frame);
        let request = RenderRequest {
            video_path: job.video.clone(),
            frame,
            timecode_ms,
            crop: metadata.crop.clone(),
            canvas: job.canvas,
            dither: job.dither.clone(),
            output: job.output_dir.join(frame_file_name(timecode_ms)),
        };
        job.renderer
            .render(&request)
            .await
            .with_context(|| format!("Failed to convert frame {} ({}ms)", frame, timecode_ms))?;
        rendered_frames += 1;
        pb.inc(1);
    }

    pb.finish_with_message("Done");

    Ok(ConversionStats {
        rendered_frames,
        duration: start_time.elapsed(),
    })
}
