//! Stop command - stop the source endpoint on a running daemon

use anyhow::{Context, Result};
use relaycam_core::ipc::ControlClient;

/// Stop the source endpoint
///
/// Endpoints are reference counted, so this only goes idle once every
/// start has been matched by a stop.
pub async fn stop() -> Result<()> {
    let mut client = ControlClient::connect()
        .await
        .context("No running daemon found. Start one with: relaycam run")?;

    client.stop_source().await.context("Failed to stop source")?;

    let status = client.status().await.context("Failed to query status")?;
    if status.running {
        println!(
            "Stop recorded; {} source session{} still active.",
            status.source_sessions,
            if status.source_sessions == 1 { "" } else { "s" }
        );
    } else {
        println!("Source stopped.");
    }

    Ok(())
}
