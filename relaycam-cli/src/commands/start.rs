//! Start command - start the source endpoint on a running daemon

use anyhow::{Context, Result};
use relaycam_core::ipc::ControlClient;

/// Start (or join) the source endpoint
pub async fn start() -> Result<()> {
    let mut client = ControlClient::connect()
        .await
        .context("No running daemon found. Start one with: relaycam run")?;

    client.start_source().await.context("Failed to start source")?;

    let status = client.status().await.context("Failed to query status")?;
    println!(
        "Source started on '{}' ({} session{}).",
        status.device_name,
        status.source_sessions,
        if status.source_sessions == 1 { "" } else { "s" }
    );

    Ok(())
}
