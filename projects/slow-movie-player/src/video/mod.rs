pub mod metadata;
pub mod probe;
pub mod render;

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Container extensions accepted for playback, matched case-insensitively.
pub const ACCEPTED_EXTENSIONS: [&str; 5] = [".avi", ".mp4", ".m4v", ".mkv", ".mov"];

pub fn is_accepted_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            let ext = format!(".{}", ext.to_lowercase());
            ACCEPTED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Recursively collects playable videos under `video_root`, ordered by path.
pub fn list_videos(video_root: &Path) -> Vec<PathBuf> {
    WalkDir::new(video_root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| is_accepted_extension(e.path()))
        .map(|e| e.path().to_path_buf())
        .collect()
}
