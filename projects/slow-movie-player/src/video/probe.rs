use crate::error::{PlayerError, PlayerResult};
use std::path::Path;

use ffmpeg_next::ffi;

/// Raw stream facts reported by the container, before any derivation.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    /// Average frame rate as an exact rational (e.g. 24000/1001).
    pub avg_frame_rate: (i32, i32),
    pub duration_secs: f64,
    /// Frame count stored in the container, when it has one.
    pub frame_count: Option<u64>,
    pub width: u32,
    pub height: u32,
}

/// Reads stream metadata out of a video file.
pub trait MediaProbe: Send + Sync {
    fn probe(&self, path: &Path) -> PlayerResult<StreamInfo>;
}

/// Probe backed by libavformat via ffmpeg-next.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegProbe;

impl MediaProbe for FfmpegProbe {
    fn probe(&self, path: &Path) -> PlayerResult<StreamInfo> {
        ffmpeg_next::init().map_err(|e| PlayerError::probe(path, e.to_string()))?;

        let input_ctx =
            ffmpeg_next::format::input(&path).map_err(|e| PlayerError::probe(path, e.to_string()))?;

        let video_stream = input_ctx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| PlayerError::probe(path, "no video stream found"))?;

        let rational_fps = video_stream.avg_frame_rate();
        let stream_frames = video_stream.frames();
        let duration_secs = input_ctx.duration() as f64 / ffi::AV_TIME_BASE as f64;

        let decoder_ctx =
            ffmpeg_next::codec::context::Context::from_parameters(video_stream.parameters())
                .map_err(|e| PlayerError::probe(path, e.to_string()))?;
        let decoder = decoder_ctx
            .decoder()
            .video()
            .map_err(|e| PlayerError::probe(path, e.to_string()))?;

        let info = StreamInfo {
            avg_frame_rate: (rational_fps.numerator(), rational_fps.denominator()),
            duration_secs,
            frame_count: (stream_frames > 0).then_some(stream_frames as u64),
            width: decoder.width(),
            height: decoder.height(),
        };

        tracing::debug!(
            "FfmpegProbe: {} avg_frame_rate={}/{}, duration={:.2}s, stream_frames={}, {}x{}",
            path.display(),
            info.avg_frame_rate.0,
            info.avg_frame_rate.1,
            info.duration_secs,
            stream_frames,
            info.width,
            info.height
        );

        Ok(info)
    }
}
