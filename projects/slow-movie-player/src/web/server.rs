use crate::cli::ServeArgs;
use crate::playback::scheduler::SessionManager;
use crate::video::metadata::Canvas;
use crate::video::probe::FfmpegProbe;
use crate::video::render::FrameRenderer;
use crate::web::api::{get_videos, play_video, player_state, stop_video, AppState};
use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::{IpAddr, SocketAddr, TcpListener};
use std::sync::Arc;
use tower_http::services::ServeFile;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub fn router(state: AppState) -> Router {
    let current_frame = ServeFile::new(&state.args.frame_path);
    Router::new()
        .route("/play-video", post(play_video))
        .route("/stop-video", post(stop_video))
        .route("/player-state", get(player_state))
        .route("/list-videos", get(get_videos))
        .route_service("/current-frame", current_frame)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn bind(host: IpAddr, port: u16) -> Result<TcpListener> {
    let mut current_port = port;
    loop {
        let addr = SocketAddr::new(host, current_port);
        match TcpListener::bind(addr) {
            Ok(listener) => {
                listener.set_nonblocking(true)?;
                info!("Successfully bound to {}", addr);
                return Ok(listener);
            }
            Err(e) => {
                warn!("Failed to bind to {}: {}. Trying next port...", addr, e);
                current_port = current_port
                    .checked_add(1)
                    .ok_or_else(|| anyhow::anyhow!("No available ports found"))?;
            }
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

pub async fn run_server(
    args: ServeArgs,
    canvas: Canvas,
    renderer: Arc<dyn FrameRenderer>,
) -> Result<()> {
    let listener = bind(args.host, args.port)?;

    let sessions = SessionManager::new(
        args.playback_config(canvas),
        Arc::new(FfmpegProbe),
        renderer,
    );
    info!(
        "Canvas {}x{}, one frame every {}s, videos under {}",
        canvas.width,
        canvas.height,
        args.tick_secs,
        args.video_root.display()
    );

    let state = AppState {
        args: Arc::new(args),
        sessions: sessions.clone(),
    };
    let app = router(state);

    let tokio_listener = tokio::net::TcpListener::from_std(listener)?;
    info!(
        "Slow movie player started on http://{:?}",
        tokio_listener.local_addr()?
    );

    axum::serve(tokio_listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sessions.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occupied_port_falls_through_to_the_next() {
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        match bind("127.0.0.1".parse().unwrap(), port) {
            Ok(listener) => assert_ne!(listener.local_addr().unwrap().port(), port),
            // Only if every port above is taken.
            Err(e) => assert!(e.to_string().contains("No available ports")),
        }
    }
}
