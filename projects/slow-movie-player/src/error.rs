use std::path::PathBuf;

pub type PlayerResult<T> = Result<T, PlayerError>;

/// Everything that can go wrong between a play request and a rendered frame.
#[derive(thiserror::Error, Debug)]
pub enum PlayerError {
    #[error("video file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("unsupported video format '{extension}' for {}, supported formats: {supported}", .path.display())]
    UnsupportedFormat {
        path: PathBuf,
        extension: String,
        supported: String,
    },

    #[error("failed to probe {}: {reason}", .path.display())]
    MetadataProbeFailed { path: PathBuf, reason: String },

    #[error("invalid playback range: start {start_ms}ms (frame {start_frame}) must come before end {end_ms}ms (frame {end_frame})")]
    InvalidRange {
        start_ms: f64,
        end_ms: f64,
        start_frame: i64,
        end_frame: i64,
    },

    #[error("end frame {end_frame} is past the last frame of the video ({frame_count} frames)")]
    OutOfBounds { end_frame: u64, frame_count: u64 },

    #[error("frame step must be at least 1")]
    InvalidStep,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("a video is already playing")]
    SessionBusy,

    #[error("render failed: {0}")]
    RenderFailed(String),

    #[error("no video is currently playing")]
    NoActiveSession,

    #[error("output directory already exists: {}, set OVERWRITE=true to replace its contents", .0.display())]
    OutputExists(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PlayerError {
    pub fn render(msg: impl Into<String>) -> Self {
        Self::RenderFailed(msg.into())
    }

    pub fn probe(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MetadataProbeFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
