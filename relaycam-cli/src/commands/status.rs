//! Status command - query a running daemon

use anyhow::{Context, Result};
use relaycam_core::ipc::ControlClient;

/// Show status of the running daemon
pub async fn status() -> Result<()> {
    let mut client = match ControlClient::connect().await {
        Ok(client) => client,
        Err(_) => {
            println!("Relaycam - Status\n");
            println!("No running daemon found.");
            println!();
            println!("Start one with: relaycam run");
            return Ok(());
        }
    };

    let status = client.status().await.context("Failed to query status")?;

    println!("Relaycam - Status\n");
    println!("  Device:          {}", status.device_name);
    println!(
        "  Source:          {}",
        if status.running { "active" } else { "idle" }
    );
    println!("  Source sessions: {}", status.source_sessions);
    println!("  Sink sessions:   {}", status.sink_sessions);
    println!(
        "  Format:          {}x{} @ {} fps",
        status.resolution.0, status.resolution.1, status.fps
    );
    println!("  PID:             {}", status.pid);
    println!("  Uptime:          {:.1}s", status.uptime_seconds);

    Ok(())
}

/// Show frame counters of the running daemon
pub async fn stats() -> Result<()> {
    let mut client = ControlClient::connect()
        .await
        .context("No running daemon found. Start one with: relaycam run")?;

    let stats = client.stats().await.context("Failed to query stats")?;

    println!("Relaycam - Counters\n");
    println!("  Synthetic frames:  {}", stats.synthetic_frames);
    println!("  Relayed frames:    {}", stats.relayed_frames);
    println!("  Dropped (busy):    {}", stats.dropped_busy);
    println!("  Rejected frames:   {}", stats.rejected_frames);
    println!("  Completions acked: {}", stats.completions_acked);
    println!(
        "  Pool:              {}/{} buffers out",
        stats.pool_outstanding, stats.pool_high_water
    );

    Ok(())
}
