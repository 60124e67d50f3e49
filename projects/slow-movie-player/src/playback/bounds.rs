use crate::error::{PlayerError, PlayerResult};
use crate::video::metadata::VideoMetadata;
use serde::Serialize;

/// Frame range of a session; `end_frame` is exclusive.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameBounds {
    pub start_frame: u64,
    pub end_frame: u64,
}

impl FrameBounds {
    /// Converts a millisecond range into frame indices.
    ///
    /// Ranges are never clamped: a request that does not fit the video fails.
    pub fn from_millis(metadata: &VideoMetadata, start_ms: f64, end_ms: f64) -> PlayerResult<Self> {
        let start_frame = (start_ms / metadata.frame_time_ms).floor();
        let end_frame = (end_ms / metadata.frame_time_ms).floor();

        if !start_frame.is_finite() || !end_frame.is_finite() || start_frame < 0.0 || start_frame >= end_frame {
            return Err(PlayerError::InvalidRange {
                start_ms,
                end_ms,
                start_frame: start_frame as i64,
                end_frame: end_frame as i64,
            });
        }

        let (start_frame, end_frame) = (start_frame as u64, end_frame as u64);
        if end_frame > metadata.frame_count {
            return Err(PlayerError::OutOfBounds {
                end_frame,
                frame_count: metadata.frame_count,
            });
        }

        Ok(Self {
            start_frame,
            end_frame,
        })
    }

    /// Ticks that render a frame when advancing by `step`.
    pub fn render_ticks(&self, step: u32) -> u64 {
        let span = self.end_frame - self.start_frame;
        span.div_ceil(step.max(1) as u64)
    }
}
