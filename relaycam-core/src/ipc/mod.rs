//! Control channel for the device
//!
//! Unix socket transport for the start/stop control signals and status
//! queries. Signals are delivered asynchronously and idempotently: the
//! session counters absorb duplicate starts and stops without complaint.

mod client;
mod protocol;
mod server;

pub use client::ControlClient;
pub use protocol::{ControlMessage, ControlResponse, DeviceStatus};
pub use server::ControlServer;

use std::path::PathBuf;

/// Get the control socket path
///
/// Uses XDG_RUNTIME_DIR if available, otherwise /tmp
pub fn socket_path() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        PathBuf::from(runtime_dir).join("relaycam.sock")
    } else {
        let user = std::env::var("USER").unwrap_or_else(|_| "default".to_string());
        PathBuf::from(format!("/tmp/relaycam-{}.sock", user))
    }
}

/// Check if a daemon is running by probing the socket
pub async fn daemon_running() -> bool {
    let path = socket_path();
    if !path.exists() {
        return false;
    }

    match ControlClient::connect().await {
        Ok(mut client) => matches!(client.ping().await, Ok(true)),
        Err(_) => false,
    }
}
