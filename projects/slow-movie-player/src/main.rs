mod cli;
mod convert;
mod error;
mod playback;
#[cfg(test)]
mod test_utils;
mod video;
mod web;

use anyhow::Result;
use cli::{Args, Command};
use convert::{convert_video, ConvertJob};
use std::sync::Arc;
use video::probe::FfmpegProbe;
use video::render::FfmpegRenderer;
use web::server::run_server;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    let args = Args::parse_args();
    let canvas = args.canvas();

    let renderer = FfmpegRenderer::new(&args.ffmpeg);
    if !renderer.is_available().await {
        tracing::warn!(
            "{} did not answer -version, frames will fail to render",
            args.ffmpeg.display()
        );
    }

    match args.command {
        Command::Serve(serve) => run_server(serve, canvas, Arc::new(renderer)).await?,
        Command::Convert(convert) => {
            let stats = convert_video(ConvertJob {
                video: convert.video,
                output_dir: convert.output_dir,
                overwrite: convert.overwrite,
                canvas,
                dither: convert.dither,
                probe: &FfmpegProbe,
                renderer: &renderer,
            })
            .await?;
            tracing::info!(
                "Converted {} frames in {:.2}s",
                stats.rendered_frames,
                stats.duration.as_secs_f64()
            );
        }
    }

    Ok(())
}
