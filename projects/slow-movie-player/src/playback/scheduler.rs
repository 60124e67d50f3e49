// Session manager: owns the single playback slot and the ticker that drives it.
//
// Every mutation of the active session happens here, under one lock that is
// never held across an await. Ticks are serialized by a separate gate; a tick
// that finds the gate taken is skipped rather than queued.

use crate::error::{PlayerError, PlayerResult};
use crate::playback::bounds::FrameBounds;
use crate::playback::session::{
    PlayRequest, PlaybackSession, RenderFailurePolicy, SessionId, TickAction,
};
use crate::playback::snapshot::PlaybackSnapshot;
use crate::video::metadata::{Canvas, VideoMetadata};
use crate::video::probe::MediaProbe;
use crate::video::render::{FrameRenderer, RenderRequest};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    pub canvas: Canvas,
    /// Where each tick's frame is written.
    pub frame_path: PathBuf,
    pub tick_interval: Duration,
    /// How long `stop` waits for an in-flight render before cancelling it.
    pub stop_grace: Duration,
    pub on_render_failure: RenderFailurePolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing is playing.
    Idle,
    /// Another tick was still in flight.
    Skipped,
    Rendered(u64),
    RenderFailed(u64),
    /// The session reached its end frame and released the slot.
    Completed(SessionId),
    /// The session this tick belonged to is gone.
    Superseded,
}

struct Ticker {
    cancel: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Ticker {
    async fn shutdown(mut self, grace: Duration) {
        let _ = self.cancel.send(true);
        if tokio::time::timeout(grace, &mut self.handle).await.is_err() {
            warn!(
                "Render still in flight after {:?}, cancelling it",
                grace
            );
            self.handle.abort();
            let _ = (&mut self.handle).await;
        }
    }
}

// Dropping a ticker, e.g. from an abandoned stop, cancels its task.
impl Drop for Ticker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct ActiveSession {
    session: PlaybackSession,
    metadata: Arc<VideoMetadata>,
    ticker: Option<Ticker>,
}

struct Inner {
    config: PlaybackConfig,
    probe: Arc<dyn MediaProbe>,
    renderer: Arc<dyn FrameRenderer>,
    slot: Mutex<Option<ActiveSession>>,
    tick_gate: tokio::sync::Mutex<()>,
    next_id: AtomicU64,
}

/// Process-wide owner of at most one playback session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(
        config: PlaybackConfig,
        probe: Arc<dyn MediaProbe>,
        renderer: Arc<dyn FrameRenderer>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                probe,
                renderer,
                slot: Mutex::new(None),
                tick_gate: tokio::sync::Mutex::new(()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<ActiveSession>> {
        self.inner
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Validates the request, claims the slot, and starts ticking.
    pub async fn start_session(&self, request: PlayRequest) -> PlayerResult<SessionId> {
        let id = self.create_session(request).await?;
        self.spawn_ticker(id);
        Ok(id)
    }

    async fn create_session(&self, request: PlayRequest) -> PlayerResult<SessionId> {
        if request.step == 0 {
            return Err(PlayerError::InvalidStep);
        }
        if self.slot().is_some() {
            info!("Rejecting play request for {}: a video is already playing", request.file_path.display());
            return Err(PlayerError::SessionBusy);
        }

        // Probing opens the container, keep it off the async workers.
        let probe = self.inner.probe.clone();
        let canvas = self.inner.config.canvas;
        let path = request.file_path.clone();
        let metadata = tokio::task::spawn_blocking(move || {
            VideoMetadata::resolve(&path, canvas, probe.as_ref())
        })
        .await
        .map_err(|e| PlayerError::probe(&request.file_path, e.to_string()))??;

        let bounds = FrameBounds::from_millis(&metadata, request.start, request.end)?;

        let mut slot = self.slot();
        if slot.is_some() {
            return Err(PlayerError::SessionBusy);
        }
        let id = SessionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let session = PlaybackSession::begin(id, &request, &metadata, bounds, Utc::now())?;
        info!(
            "Session {} started: {} frames {}..{} step {} ({} renders), estimated end {}",
            id,
            session.video_path.display(),
            bounds.start_frame,
            bounds.end_frame,
            session.step,
            bounds.render_ticks(session.step),
            session.estimated_end_at
        );
        *slot = Some(ActiveSession {
            session,
            metadata: Arc::new(metadata),
            ticker: None,
        });
        Ok(id)
    }

    fn spawn_ticker(&self, id: SessionId) {
        let (cancel, cancel_rx) = watch::channel(false);
        let handle = tokio::spawn(self.clone().run_ticker(id, cancel_rx));
        let ticker = Ticker { cancel, handle };

        let mut slot = self.slot();
        match slot.as_mut() {
            Some(active) if active.session.id == id => active.ticker = Some(ticker),
            // Session already gone; the ticker exits on its first tick.
            _ => {
                let _ = ticker.cancel.send(true);
            }
        }
    }

    async fn run_ticker(self, id: SessionId, mut cancel: watch::Receiver<bool>) {
        // A stopped session's render may hold the gate until its grace runs out.
        tokio::select! {
            biased;
            _ = cancel.changed() => return,
            _ = self.inner.tick_gate.lock() => {}
        }

        let mut interval = tokio::time::interval(self.inner.config.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.changed() => break,
                _ = interval.tick() => {}
            }
            match self.tick_session(Some(id)).await {
                TickOutcome::Rendered(_) | TickOutcome::RenderFailed(_) | TickOutcome::Skipped => {}
                TickOutcome::Completed(_) | TickOutcome::Idle | TickOutcome::Superseded => break,
            }
        }
        debug!("Ticker for session {} exited", id);
    }

    /// Runs one tick against whatever session is active, off the ticker's schedule.
    #[cfg(test)]
    pub async fn tick(&self) -> TickOutcome {
        self.tick_session(None).await
    }

    async fn tick_session(&self, expected: Option<SessionId>) -> TickOutcome {
        let Ok(_gate) = self.inner.tick_gate.try_lock() else {
            debug!("Previous tick still running, skipping");
            return TickOutcome::Skipped;
        };

        let (id, request, frame_count) = {
            let mut slot = self.slot();
            let Some(active) = slot.as_mut() else {
                debug!("Nothing is currently playing");
                return TickOutcome::Idle;
            };
            let id = active.session.id;
            if expected.is_some_and(|expected| expected != id) {
                return TickOutcome::Superseded;
            }

            match active.session.next_action() {
                TickAction::Complete => {
                    active.session.complete();
                    info!(
                        "Session {} completed after {} frames ({} failed renders)",
                        id, active.session.frames_rendered, active.session.render_failures
                    );
                    slot.take();
                    return TickOutcome::Completed(id);
                }
                TickAction::Render(frame) => {
                    let metadata = &active.metadata;
                    let request = RenderRequest {
                        video_path: active.session.video_path.clone(),
                        frame,
                        timecode_ms: metadata.timecode_ms(frame),
                        crop: metadata.crop.clone(),
                        canvas: self.inner.config.canvas,
                        dither: active.session.dither_algorithm.clone(),
                        output: self.inner.config.frame_path.clone(),
                    };
                    (id, request, metadata.frame_count)
                }
            }
        };

        info!(
            "Session {}: frame {}/{} at {}ms",
            id,
            request.frame,
            frame_count,
            request.timecode_ms
        );
        let result = self.inner.renderer.render(&request).await;

        let mut slot = self.slot();
        match slot.as_mut() {
            Some(active) if active.session.id == id => {
                let frame = request.frame;
                let failed = result.is_err();
                if let Err(e) = &result {
                    warn!("Session {}: frame {} failed: {}", id, frame, e);
                }
                let advanced = active
                    .session
                    .record_render(result, self.inner.config.on_render_failure);
                if !advanced {
                    debug!("Session {}: holding frame {} for the next tick", id, frame);
                }
                if failed {
                    TickOutcome::RenderFailed(frame)
                } else {
                    TickOutcome::Rendered(frame)
                }
            }
            _ => {
                debug!(
                    "Session {} ended while frame {} was rendering, discarding",
                    id, request.frame
                );
                TickOutcome::Superseded
            }
        }
    }

    /// Ends the active session, cancelling an in-flight render after the grace period.
    pub async fn stop_session(&self) -> PlayerResult<PlaybackSnapshot> {
        let mut active = self.slot().take().ok_or(PlayerError::NoActiveSession)?;
        active.session.stop();
        info!(
            "Session {} stopped at frame {}",
            active.session.id, active.session.current_frame
        );
        let snapshot = PlaybackSnapshot::capture(
            &active.metadata,
            &active.session,
            Utc::now(),
            self.inner.config.tick_interval,
        );

        if let Some(ticker) = active.ticker.take() {
            ticker.shutdown(self.inner.config.stop_grace).await;
        }
        Ok(snapshot)
    }

    pub fn snapshot(&self) -> PlayerResult<PlaybackSnapshot> {
        let slot = self.slot();
        let active = slot.as_ref().ok_or(PlayerError::NoActiveSession)?;
        Ok(PlaybackSnapshot::capture(
            &active.metadata,
            &active.session,
            Utc::now(),
            self.inner.config.tick_interval,
        ))
    }

    /// Stops whatever is playing; used when the process is going down.
    pub async fn shutdown(&self) {
        match self.stop_session().await {
            Ok(snapshot) => info!(
                "Stopped session {} on shutdown",
                snapshot.player_info.session_id
            ),
            Err(PlayerError::NoActiveSession) => {}
            Err(e) => warn!("Failed to stop session on shutdown: {}", e),
        }
    }
}
