use crate::error::{PlayerError, PlayerResult};
use crate::playback::bounds::FrameBounds;
use crate::video::metadata::VideoMetadata;
use crate::video::render::RenderedFrame;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a session. Idle is the absence of one.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    Playing,
    Completed,
    Stopped,
}

/// What a tick does when a render fails.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RenderFailurePolicy {
    /// Record the failure and retry the same frame on the next tick.
    #[default]
    Hold,
    /// Record the failure and move on to the next frame anyway.
    Advance,
}

/// Parameters of a play request, as sent by the dashboard.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PlayRequest {
    pub file_path: PathBuf,
    pub dither_alg: String,
    /// Frames advanced per tick.
    pub step: u32,
    /// Start time in milliseconds.
    pub start: f64,
    /// End time in milliseconds.
    pub end: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    Render(u64),
    Complete,
}

/// Mutable progress of one bounded playback run.
#[derive(Debug, Clone)]
pub struct PlaybackSession {
    pub id: SessionId,
    pub video_path: PathBuf,
    pub dither_algorithm: String,
    pub step: u32,
    pub start_ms: f64,
    pub end_ms: f64,
    pub bounds: FrameBounds,
    pub current_frame: u64,
    pub started_at: DateTime<Utc>,
    pub estimated_end_at: DateTime<Utc>,
    pub state: PlaybackState,
    pub frames_rendered: u64,
    pub render_failures: u64,
    pub last_frame: Option<RenderedFrame>,
    pub last_error: Option<String>,
}

impl PlaybackSession {
    /// Idle -> Playing.
    pub fn begin(
        id: SessionId,
        request: &PlayRequest,
        metadata: &VideoMetadata,
        bounds: FrameBounds,
        now: DateTime<Utc>,
    ) -> PlayerResult<Self> {
        if request.step == 0 {
            return Err(PlayerError::InvalidStep);
        }

        // Uniform per-frame cost assumed; this is an estimate, not a deadline.
        let span_ms = metadata.frame_time_ms * metadata.frame_count as f64 / request.step as f64;
        let estimated_end_at = TimeDelta::try_milliseconds(span_ms as i64)
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Ok(Self {
            id,
            video_path: request.file_path.clone(),
            dither_algorithm: request.dither_alg.clone(),
            step: request.step,
            start_ms: request.start,
            end_ms: request.end,
            bounds,
            current_frame: bounds.start_frame,
            started_at: now,
            estimated_end_at,
            state: PlaybackState::Playing,
            frames_rendered: 0,
            render_failures: 0,
            last_frame: None,
            last_error: None,
        })
    }

    pub fn next_action(&self) -> TickAction {
        if self.state != PlaybackState::Playing || self.current_frame >= self.bounds.end_frame {
            TickAction::Complete
        } else {
            TickAction::Render(self.current_frame)
        }
    }

    /// Playing -> Completed.
    pub fn complete(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Completed;
        }
    }

    /// Playing -> Stopped.
    pub fn stop(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Stopped;
        }
    }

    /// Applies a render outcome and moves the playhead as `policy` dictates.
    /// Returns whether the playhead advanced.
    pub fn record_render(
        &mut self,
        outcome: PlayerResult<RenderedFrame>,
        policy: RenderFailurePolicy,
    ) -> bool {
        match outcome {
            Ok(frame) => {
                self.frames_rendered += 1;
                self.last_frame = Some(frame);
                self.last_error = None;
            }
            Err(e) => {
                self.render_failures += 1;
                self.last_error = Some(e.to_string());
                if policy == RenderFailurePolicy::Hold {
                    return false;
                }
            }
        }
        self.current_frame += self.step as u64;
        true
    }

    /// Render ticks left before the terminal tick.
    pub fn remaining_ticks(&self) -> u64 {
        let left = self.bounds.end_frame.saturating_sub(self.current_frame);
        left.div_ceil(self.step as u64)
    }

    /// Fraction of the range already played, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        let span = (self.bounds.end_frame - self.bounds.start_frame) as f64;
        let done = self.current_frame.saturating_sub(self.bounds.start_frame) as f64;
        (done / span).clamp(0.0, 1.0)
    }
}
