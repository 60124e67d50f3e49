//! Test doubles for the probe and render seams.

use crate::error::{PlayerError, PlayerResult};
use crate::video::metadata::{Canvas, CropGeometry, VideoMetadata};
use crate::video::probe::{MediaProbe, StreamInfo};
use crate::video::render::{
    publish_artifact, staging_path, FrameRenderer, RenderRequest, RenderedFrame,
};
use futures::future::BoxFuture;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Creates an empty file named `name` under `dir`.
pub fn touch_video(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"").unwrap();
    path
}

/// 24 fps, 10 s, 1920x1080, no container frame count.
pub fn film_stream() -> StreamInfo {
    StreamInfo {
        avg_frame_rate: (24, 1),
        duration_secs: 10.0,
        frame_count: None,
        width: 1920,
        height: 1080,
    }
}

/// Metadata for [`film_stream`] fitted to a 1600x900 canvas.
pub fn film_metadata() -> VideoMetadata {
    VideoMetadata {
        frame_rate: 24.0,
        duration_secs: 10.0,
        frame_count: 240,
        frame_time_ms: 1000.0 / 24.0,
        width: 1920,
        height: 1080,
        aspect_ratio: 1920.0 / 1080.0,
        crop: CropGeometry::for_aspect(1920.0 / 1080.0, Canvas::new(1600, 900)),
    }
}

pub struct FixedProbe {
    result: Result<StreamInfo, String>,
    calls: AtomicUsize,
}

impl FixedProbe {
    pub fn new(info: StreamInfo) -> Self {
        Self {
            result: Ok(info),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            result: Err(reason.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MediaProbe for FixedProbe {
    fn probe(&self, path: &Path) -> PlayerResult<StreamInfo> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result
            .clone()
            .map_err(|reason| PlayerError::probe(path, reason))
    }
}

struct DropCounter(Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Renderer that writes blank canvases and can be told to fail or hang.
#[derive(Default)]
pub struct ScriptedRenderer {
    rendered: Mutex<Vec<u64>>,
    failing_frames: Mutex<HashSet<u64>>,
    hang: AtomicBool,
    abandoned: Arc<AtomicUsize>,
}

impl ScriptedRenderer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Frames that rendered successfully, in order.
    pub fn rendered(&self) -> Vec<u64> {
        self.rendered.lock().unwrap().clone()
    }

    pub fn fail_frame(&self, frame: u64) {
        self.failing_frames.lock().unwrap().insert(frame);
    }

    pub fn heal_frame(&self, frame: u64) {
        self.failing_frames.lock().unwrap().remove(&frame);
    }

    pub fn hang(&self, hang: bool) {
        self.hang.store(hang, Ordering::SeqCst);
    }

    /// Number of hung renders whose futures were dropped before finishing.
    pub fn abandoned(&self) -> usize {
        self.abandoned.load(Ordering::SeqCst)
    }
}

impl FrameRenderer for ScriptedRenderer {
    fn render<'a>(
        &'a self,
        request: &'a RenderRequest,
    ) -> BoxFuture<'a, PlayerResult<RenderedFrame>> {
        Box::pin(async move {
            if self.hang.load(Ordering::SeqCst) {
                let _guard = DropCounter(self.abandoned.clone());
                futures::future::pending::<()>().await;
            }
            if self.failing_frames.lock().unwrap().contains(&request.frame) {
                return Err(PlayerError::render(format!(
                    "scripted failure at frame {}",
                    request.frame
                )));
            }

            let staging = staging_path(&request.output);
            if let Some(parent) = staging.parent() {
                std::fs::create_dir_all(parent)?;
            }
            image::GrayImage::new(request.canvas.width, request.canvas.height)
                .save_with_format(&staging, image::ImageFormat::Bmp)
                .map_err(|e| PlayerError::render(e.to_string()))?;
            let frame = publish_artifact(&staging, request)?;

            self.rendered.lock().unwrap().push(request.frame);
            Ok(frame)
        })
    }
}
