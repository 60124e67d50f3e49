use crate::cli::ServeArgs;
use crate::error::PlayerError;
use crate::playback::scheduler::SessionManager;
use crate::playback::session::{PlayRequest, SessionId};
use crate::playback::snapshot::PlaybackSnapshot;
use crate::video::list_videos;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub args: Arc<ServeArgs>,
    pub sessions: SessionManager,
}

#[derive(Serialize)]
pub struct VideoList {
    pub videos: Vec<PathBuf>,
}

#[derive(Serialize)]
pub struct PlayStarted {
    pub session_id: SessionId,
}

impl IntoResponse for PlayerError {
    fn into_response(self) -> Response {
        let status = match &self {
            PlayerError::NoActiveSession => return StatusCode::NO_CONTENT.into_response(),
            PlayerError::SessionBusy => StatusCode::CONFLICT,
            PlayerError::FileNotFound(_) => StatusCode::NOT_FOUND,
            PlayerError::UnsupportedFormat { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            PlayerError::InvalidRange { .. }
            | PlayerError::OutOfBounds { .. }
            | PlayerError::InvalidStep
            | PlayerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            PlayerError::MetadataProbeFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            PlayerError::RenderFailed(_) | PlayerError::OutputExists(_) | PlayerError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (
            status,
            Json(serde_json::json!({ "detail": self.to_string() })),
        )
            .into_response()
    }
}

/// Start playing a video. 201 on success, 409 if one is already playing.
pub async fn play_video(
    State(state): State<AppState>,
    payload: Result<Json<PlayRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PlayStarted>), PlayerError> {
    let Json(payload) = payload.map_err(|e| PlayerError::InvalidRequest(e.body_text()))?;
    let session_id = state.sessions.start_session(payload).await?;
    Ok((StatusCode::CREATED, Json(PlayStarted { session_id })))
}

/// Stop the current video. 200 with its final state, 204 if nothing was playing.
pub async fn stop_video(State(state): State<AppState>) -> Result<Json<PlaybackSnapshot>, PlayerError> {
    Ok(Json(state.sessions.stop_session().await?))
}

/// Current player state, or 204 if nothing is playing.
pub async fn player_state(
    State(state): State<AppState>,
) -> Result<Json<PlaybackSnapshot>, PlayerError> {
    Ok(Json(state.sessions.snapshot()?))
}

pub async fn get_videos(State(state): State<AppState>) -> Json<VideoList> {
    Json(VideoList {
        videos: list_videos(&state.args.video_root),
    })
}
