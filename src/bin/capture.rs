//! Captures raw YUYV frames from a V4L2 device into a file until
//! interrupted.

use std::fs::File;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use yuvloop::{CapturePipeline, Direction, Pool, Session, SessionConfig, StopFlag};

#[derive(Parser)]
#[command(version, about = "Capture YUYV frames from a V4L2 device into a raw file")]
struct Args {
    /// Capture device node
    #[arg(short, long, default_value = "/dev/video1")]
    device: PathBuf,

    /// Output file, truncated on start
    #[arg(short, long, default_value = "yuyv_cycle.yuv")]
    output: PathBuf,

    /// Target frame rate (informational on the capture side)
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

    let stop = StopFlag::new();
    stop.install()?;

    let mut config = SessionConfig::new(&args.device, Direction::Capture);
    config.fps = args.fps;
    config.buffer_count = args.buffers;

    let session = Session::negotiate(&config)?;

    let mut pool = Pool::request(&session, config.buffer_count)?;
    pool.map_all()?;
    pool.enqueue_all()?;

    // unbuffered: each frame is a single write call, and a short or failed
    // write costs that frame only
    let mut sink = File::create(&args.output)?;

    info!(
        buffers = pool.buffer_count(),
        output = %args.output.display(),
        "capturing, press Ctrl+C to stop"
    );

    let report = CapturePipeline::new(session.format()).run(&mut pool, &mut sink, &stop)?;

    pool.release();

    info!(
        frames = report.frames,
        skipped = report.skipped,
        dropped = report.dropped,
        sink_errors = report.sink_errors,
        output = %args.output.display(),
        "capture finished"
    );

    Ok(())
}
