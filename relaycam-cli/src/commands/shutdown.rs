//! Shutdown command - stop a running daemon

use anyhow::{Context, Result};
use relaycam_core::ipc::ControlClient;

/// Shut the running daemon down
pub async fn shutdown() -> Result<()> {
    let mut client = ControlClient::connect()
        .await
        .context("No running daemon found.")?;

    client.stop().await.context("Failed to stop daemon")?;
    println!("Daemon is shutting down.");

    Ok(())
}
