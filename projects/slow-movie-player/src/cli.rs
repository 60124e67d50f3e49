use crate::playback::scheduler::PlaybackConfig;
use crate::playback::session::RenderFailurePolicy;
use crate::video::metadata::Canvas;
use clap::{Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Width of the display canvas in pixels
    #[arg(long, env = "WIDTH", value_parser = clap::value_parser!(u32).range(1..))]
    pub width: u32,

    /// Height of the display canvas in pixels
    #[arg(long, env = "HEIGHT", value_parser = clap::value_parser!(u32).range(1..))]
    pub height: u32,

    /// ffmpeg binary used to extract frames
    #[arg(long, env = "SLOW_MOVIE_FFMPEG", default_value = "ffmpeg")]
    pub ffmpeg: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the playback API and step through videos
    Serve(ServeArgs),
    /// Pre-render every frame of a video to bitmaps
    Convert(ConvertArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct ServeArgs {
    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Port to bind to
    #[arg(long, default_value_t = 5050)]
    pub port: u16,

    /// Root directory for video files
    #[arg(long, env = "SLOW_MOVIE_VIDEO_ROOT", default_value = "videos")]
    pub video_root: PathBuf,

    /// Where the current frame is written
    #[arg(long, env = "SLOW_MOVIE_FRAME_PATH", default_value = "tmp/current_frame.bmp")]
    pub frame_path: PathBuf,

    /// Seconds between frames
    #[arg(long, env = "SLOW_MOVIE_TICK_SECS", default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    pub tick_secs: u64,

    /// Milliseconds a stop waits for an in-flight render before killing it
    #[arg(long, default_value_t = 2000)]
    pub stop_grace_ms: u64,

    /// Whether a failed render still advances to the next frame
    #[arg(long, value_enum, default_value_t = RenderFailurePolicy::Hold)]
    pub on_render_failure: RenderFailurePolicy,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ConvertArgs {
    /// Video file to convert
    #[arg(long)]
    pub video: PathBuf,

    /// Directory that receives one bitmap per frame
    #[arg(long)]
    pub output_dir: PathBuf,

    /// Replace the contents of an existing output directory
    #[arg(long, env = "OVERWRITE")]
    pub overwrite: bool,

    /// Dithering label passed to the renderer
    #[arg(long, default_value = "none")]
    pub dither: String,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn canvas(&self) -> Canvas {
        Canvas::new(self.width, self.height)
    }
}

impl ServeArgs {
    pub fn playback_config(&self, canvas: Canvas) -> PlaybackConfig {
        PlaybackConfig {
            canvas,
            frame_path: self.frame_path.clone(),
            tick_interval: Duration::from_secs(self.tick_secs),
            stop_grace: Duration::from_millis(self.stop_grace_ms),
            on_render_failure: self.on_render_failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_defaults() {
        let args = Args::try_parse_from([
            "slow-movie-player",
            "--width",
            "800",
            "--height",
            "480",
            "serve",
            "--video-root",
            "videos",
            "--frame-path",
            "tmp/current_frame.bmp",
            "--tick-secs",
            "30",
        ])
        .unwrap();
        let canvas = args.canvas();
        assert_eq!(canvas, Canvas::new(800, 480));

        let Command::Serve(serve) = args.command else {
            panic!("expected serve");
        };
        assert_eq!(serve.port, 5050);
        assert_eq!(serve.on_render_failure, RenderFailurePolicy::Hold);

        let config = serve.playback_config(canvas);
        assert_eq!(config.canvas, canvas);
        assert_eq!(config.tick_interval, Duration::from_secs(30));
        assert_eq!(config.stop_grace, Duration::from_millis(2000));
    }

    #[test]
    fn advance_policy_and_convert_flags() {
        let args = Args::try_parse_from([
            "slow-movie-player",
            "--width=800",
            "--height=480",
            "serve",
            "--on-render-failure",
            "advance",
        ])
        .unwrap();
        let Command::Serve(serve) = args.command else {
            panic!("expected serve");
        };
        assert_eq!(serve.on_render_failure, RenderFailurePolicy::Advance);

        let args = Args::try_parse_from([
            "slow-movie-player",
            "--width=800",
            "--height=480",
            "convert",
            "--video",
            "videos/film.mkv",
            "--output-dir",
            "frames/film",
            "--overwrite",
        ])
        .unwrap();
        let Command::Convert(convert) = args.command else {
            panic!("expected convert");
        };
        assert!(convert.overwrite);
        assert_eq!(convert.output_dir, PathBuf::from("frames/film"));
    }

    #[test]
    fn zero_sized_canvas_is_rejected() {
        let res = Args::try_parse_from(["slow-movie-player", "--width=0", "--height=480", "serve"]);
        assert!(res.is_err());
    }
}
