//! Framecast server entry point.
//!
//! ```text
//! framecast                          Serve on 0.0.0.0:8000
//! framecast --bind 127.0.0.1:9000    Serve on a custom address
//! framecast --print-config           Write the effective config as JSON and exit
//! ```
//!
//! Every flag can also be set through the environment variable named in
//! `--help`.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use framecast::server::{self, AppState};
use framecast::sources::SyntheticConfig;
use framecast::{FrameSize, StreamConfig};

#[derive(Parser, Debug)]
#[command(name = "framecast", version, about = "Token-gated MJPEG-over-WebSocket frame server")]
struct Cli {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8000")]
    bind: SocketAddr,

    /// Secret used to sign and verify stream tokens.
    #[arg(long, env = "JWT_SECRET", default_value = "change-me-in-production", hide_env_values = true)]
    jwt_secret: String,

    /// Token lifetime in minutes.
    #[arg(long, env = "JWT_EXPIRE_MINUTES", default_value_t = 60)]
    jwt_expire_minutes: u64,

    /// Target frames per second (values below 1 stream at 1).
    #[arg(long, env = "STREAM_FPS", default_value_t = 24.0)]
    fps: f64,

    /// JPEG quality, 1-100.
    #[arg(long, env = "JPEG_QUALITY", default_value_t = 80)]
    jpeg_quality: u8,

    /// Video file to loop; the synthetic scene is used when it is missing.
    #[arg(long, env = "VIDEO_FILE", default_value = "assets/big_buck_bunny.mp4")]
    video_file: PathBuf,

    /// ffmpeg executable used to decode the video.
    #[arg(long, env = "FFMPEG_BIN", default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    #[arg(long, env = "FRAME_WIDTH", default_value_t = 1280)]
    frame_width: u32,

    #[arg(long, env = "FRAME_HEIGHT", default_value_t = 720)]
    frame_height: u32,

    /// Number of shapes in the synthetic scene.
    #[arg(long, env = "SYNTHETIC_SHAPES_COUNT", default_value_t = 12)]
    shapes: usize,

    #[arg(long, env = "SHAPE_MIN_SIZE", default_value_t = 25)]
    shape_min_size: u32,

    #[arg(long, env = "SHAPE_MAX_SIZE", default_value_t = 120)]
    shape_max_size: u32,

    #[arg(long, env = "SHAPE_MIN_SPEED", default_value_t = 2.0)]
    shape_min_speed: f64,

    #[arg(long, env = "SHAPE_MAX_SPEED", default_value_t = 8.0)]
    shape_max_speed: f64,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Print the effective configuration to stdout and exit.
    #[arg(long)]
    print_config: bool,
}

impl Cli {
    fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            bind: self.bind,
            jwt_secret: self.jwt_secret.clone(),
            jwt_expire_minutes: self.jwt_expire_minutes,
            fps: self.fps,
            jpeg_quality: self.jpeg_quality,
            video_file: self.video_file.clone(),
            ffmpeg: self.ffmpeg.clone(),
            frame_size: FrameSize::new(self.frame_width, self.frame_height),
            synthetic: SyntheticConfig {
                shape_count: self.shapes,
                min_size: self.shape_min_size,
                max_size: self.shape_max_size,
                min_speed: self.shape_min_speed,
                max_speed: self.shape_max_speed,
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = cli.stream_config().normalized().context("invalid configuration")?;

    if cli.print_config {
        let mut printable = config.clone();
        printable.jwt_secret = "<redacted>".into();
        println!("{}", serde_json::to_string_pretty(&printable)?);
        return Ok(());
    }

    info!("framecast v{}", env!("CARGO_PKG_VERSION"));
    info!("frame size: {}, target fps: {}", config.frame_size, config.fps);
    info!("jpeg quality: {}", config.jpeg_quality);
    if config.video_file.exists() {
        info!("video file: {}", config.video_file.display());
    } else {
        warn!("video file {} not found, serving the synthetic scene", config.video_file.display());
    }
    if config.jwt_secret == StreamConfig::default().jwt_secret {
        warn!("JWT_SECRET is the built-in default; set it before exposing this server");
    }

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        on_signal.cancel();
    });

    server::serve(listener, AppState::from_config(&config), shutdown).await?;
    info!("server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_map_onto_stream_config() {
        let cli = Cli::try_parse_from([
            "framecast",
            "--shapes",
            "5",
            "--frame-width",
            "320",
            "--frame-height",
            "240",
            "--shape-max-size",
            "40",
        ])
        .unwrap();

        let config = cli.stream_config().normalized().unwrap();
        assert_eq!(config.synthetic.shape_count, 5);
        assert_eq!(config.frame_size, FrameSize::new(320, 240));
        assert_eq!(config.synthetic.max_size, 40);
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
