//! Run command - run the device daemon in the foreground

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use relaycam_core::ipc::ControlServer;
use relaycam_core::{config, Frame, FrameConsumer, VirtualDevice};
use tokio::signal;
use tracing::{debug, error, info};

/// Arguments for the run command
#[derive(Args)]
pub struct RunArgs {
    /// Path to a configuration file (default: the user config path)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the device name
    #[arg(short, long)]
    name: Option<String>,

    /// Do not start the source endpoint; wait for a control command
    #[arg(long)]
    idle: bool,
}

/// How often the daemon consumer logs a frame count
const LOG_EVERY: u64 = 300;

/// Consumer that counts frames and logs progress
///
/// The daemon has no downstream reader of its own; frames are dropped
/// after counting, which returns pooled buffers immediately.
struct LoggingConsumer {
    frames: AtomicU64,
}

impl FrameConsumer for LoggingConsumer {
    fn accept(&self, frame: Frame, _host_time_ns: u64) {
        let count = self.frames.fetch_add(1, Ordering::Relaxed) + 1;
        if count % LOG_EVERY == 0 {
            info!("{} frames emitted ({})", count, frame.format);
        } else {
            debug!(pts = frame.pts, "frame emitted");
        }
    }
}

/// Run the device daemon until interrupted or told to stop
pub async fn run(args: RunArgs) -> Result<()> {
    let mut device_config = match &args.config {
        Some(path) => config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => config::load().context("Failed to load configuration")?,
    };
    if let Some(name) = args.name {
        device_config.name = name;
    }

    println!("Relaycam - Device Daemon\n");
    println!("Configuration:");
    println!("  Device:     {}", device_config.name);
    println!("  Format:     {}", device_config.format());
    println!("  Pool:       {} buffers", device_config.pool_high_water);
    println!();

    let consumer = Arc::new(LoggingConsumer {
        frames: AtomicU64::new(0),
    });
    let device = Arc::new(
        VirtualDevice::new(device_config, consumer).context("Failed to create device")?,
    );

    if !args.idle {
        device.start_source().context("Failed to start source")?;
        println!("Source started, emitting frames.");
    } else {
        println!("Source idle, waiting for 'relaycam start'.");
    }

    let mut server = ControlServer::new(device.clone());
    server.start().await.context("Failed to start control server")?;

    println!("Press Ctrl+C to stop...\n");

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                println!("\nReceived interrupt signal...");
                break;
            }
            result = server.accept_one() => {
                match result {
                    Ok(true) => {}
                    Ok(false) => {
                        info!("stop requested via control channel");
                        break;
                    }
                    Err(e) => {
                        error!("control server error: {}", e);
                    }
                }
            }
        }
    }

    println!("Stopping device...");
    device.shutdown();
    server.cleanup();

    let stats = device.stats();
    println!("Device stopped.");
    println!("  Synthetic frames: {}", stats.synthetic_frames);
    println!("  Relayed frames:   {}", stats.relayed_frames);
    println!("  Dropped (busy):   {}", stats.dropped_busy);

    Ok(())
}
