//! Streams a cycling YUYV test pattern (2 s color bars, 2 s solid color)
//! to a V4L2 output device.
//!
//! There is deliberately no graceful-stop handling here: the emitter runs
//! until the process is terminated, and the pool's Drop stops streaming and
//! unmaps the buffers on the way out.

use std::path::PathBuf;

use clap::Parser;

use yuvloop::{Direction, OutputPipeline, Pool, Session, SessionConfig};

#[derive(Parser)]
#[command(version, about = "Stream a cycling YUYV test pattern to a V4L2 output device")]
struct Args {
    /// Output device node
    #[arg(short, long, default_value = "/dev/video1")]
    device: PathBuf,

    /// Target frame rate
    #[arg(long, default_value_t = 15)]
    fps: u32,

    /// Number of pool buffers to request
    #[arg(long, default_value_t = 2)]
    buffers: u32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = SessionConfig::new(&args.device, Direction::Output);
    config.fps = args.fps;
    config.buffer_count = args.buffers;

    let session = Session::negotiate(&config)?;

    let mut pool = Pool::request(&session, config.buffer_count)?;
    pool.map_all()?;
    pool.enqueue_all()?;

    tracing::info!(buffers = pool.buffer_count(), "streaming started");

    OutputPipeline::new(session.format(), config.fps).run(&mut pool, None)?;

    Ok(())
}
