use crate::playback::session::{PlaybackSession, PlaybackState, SessionId};
use crate::video::metadata::VideoMetadata;
use crate::video::render::RenderedFrame;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Point-in-time view of the active session, shaped for the dashboard.
#[derive(Serialize, Debug, Clone)]
pub struct PlaybackSnapshot {
    pub video_info: VideoMetadata,
    pub player_info: PlayerInfo,
}

#[derive(Serialize, Debug, Clone)]
pub struct PlayerInfo {
    pub session_id: SessionId,
    pub file_path: PathBuf,
    pub dither_alg: String,
    pub step: u32,
    pub start: f64,
    pub end: f64,
    pub start_frame: u64,
    pub end_frame: u64,
    pub current_frame: u64,
    pub playback_start: DateTime<Utc>,
    pub playback_end: DateTime<Utc>,
    pub state: PlaybackState,
    pub frames_rendered: u64,
    pub render_failures: u64,
    pub last_error: Option<String>,
    pub last_frame: Option<RenderedFrame>,
    pub progress: f64,
    /// Wall-clock finish if every remaining tick fires on schedule.
    pub projected_finish_at: DateTime<Utc>,
}

impl PlaybackSnapshot {
    pub fn capture(
        metadata: &VideoMetadata,
        session: &PlaybackSession,
        now: DateTime<Utc>,
        tick_interval: Duration,
    ) -> Self {
        let remaining_ms = tick_interval.as_secs_f64() * 1000.0 * session.remaining_ticks() as f64;
        let projected_finish_at = TimeDelta::try_milliseconds(remaining_ms as i64)
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            video_info: metadata.clone(),
            player_info: PlayerInfo {
                session_id: session.id,
                file_path: session.video_path.clone(),
                dither_alg: session.dither_algorithm.clone(),
                step: session.step,
                start: session.start_ms,
                end: session.end_ms,
                start_frame: session.bounds.start_frame,
                end_frame: session.bounds.end_frame,
                current_frame: session.current_frame,
                playback_start: session.started_at,
                playback_end: session.estimated_end_at,
                state: session.state,
                frames_rendered: session.frames_rendered,
                render_failures: session.render_failures,
                last_error: session.last_error.clone(),
                last_frame: session.last_frame.clone(),
                progress: session.progress(),
                projected_finish_at,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::bounds::FrameBounds;
    use crate::playback::session::{PlayRequest, RenderFailurePolicy};
    use crate::test_utils::film_metadata;
    use chrono::TimeZone;

    #[test]
    fn projects_session_and_metadata() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let meta = film_metadata();
        let request = PlayRequest {
            file_path: PathBuf::from("videos/film.mp4"),
            dither_alg: "atkinson".to_string(),
            step: 4,
            start: 0.0,
            end: 1000.0,
        };
        let bounds = FrameBounds::from_millis(&meta, request.start, request.end).unwrap();
        let mut session = PlaybackSession::begin(SessionId(9), &request, &meta, bounds, now).unwrap();
        session.record_render(
            Err(crate::error::PlayerError::render("decoder hiccup")),
            RenderFailurePolicy::Advance,
        );

        let snap = PlaybackSnapshot::capture(&meta, &session, now, Duration::from_secs(30));
        let info = &snap.player_info;
        assert_eq!(info.session_id, SessionId(9));
        assert_eq!(info.dither_alg, "atkinson");
        assert_eq!((info.start_frame, info.end_frame), (0, 24));
        assert_eq!(info.current_frame, 4);
        assert_eq!(info.render_failures, 1);
        assert_eq!(info.state, PlaybackState::Playing);
        // 20 frames left at 4 per tick
        assert_eq!(info.projected_finish_at, now + TimeDelta::seconds(150));
        assert_eq!(snap.video_info, meta);
    }

    #[test]
    fn serializes_with_dashboard_field_names() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let meta = film_metadata();
        let request = PlayRequest {
            file_path: PathBuf::from("videos/film.mp4"),
            dither_alg: "none".to_string(),
            step: 1,
            start: 0.0,
            end: 5000.0,
        };
        let bounds = FrameBounds::from_millis(&meta, request.start, request.end).unwrap();
        let session = PlaybackSession::begin(SessionId(2), &request, &meta, bounds, now).unwrap();

        let json = serde_json::to_value(PlaybackSnapshot::capture(
            &meta,
            &session,
            now,
            Duration::from_secs(30),
        ))
        .unwrap();
        assert_eq!(json["player_info"]["session_id"], 2);
        assert_eq!(json["player_info"]["state"], "playing");
        assert_eq!(json["player_info"]["end_frame"], 120);
        assert_eq!(json["video_info"]["frame_count"], 240);
        assert_eq!(json["video_info"]["crop"]["axis"], "height");
    }
}
