//! Control server for daemon mode
//!
//! Listens on a Unix socket and maps control messages onto the device's
//! endpoint operations.

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::protocol::{ControlMessage, ControlResponse, DeviceStatus};
use super::socket_path;
use crate::device::VirtualDevice;
use crate::error::{RelaycamError, Result};

/// Control server that handles client connections
pub struct ControlServer {
    /// Path to the Unix socket
    socket_path: PathBuf,
    /// Listener for incoming connections
    listener: Option<UnixListener>,
    /// The device the daemon is running
    device: Arc<VirtualDevice>,
    /// Shutdown signal sender
    shutdown_tx: broadcast::Sender<()>,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl ControlServer {
    /// Create a control server on the default socket path
    pub fn new(device: Arc<VirtualDevice>) -> Self {
        Self::with_socket_path(device, socket_path())
    }

    /// Create a control server on a specific socket path
    pub fn with_socket_path(device: Arc<VirtualDevice>, socket_path: PathBuf) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            socket_path,
            listener: None,
            device,
            shutdown_tx,
            start_time: Instant::now(),
        }
    }

    /// Start listening for connections
    pub async fn start(&mut self) -> Result<()> {
        // Remove existing socket if present
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| {
                RelaycamError::control(format!("failed to remove old socket: {}", e))
            })?;
        }

        if let Some(parent) = self.socket_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    RelaycamError::control(format!("failed to create socket directory: {}", e))
                })?;
            }
        }

        let listener = UnixListener::bind(&self.socket_path).map_err(|e| {
            RelaycamError::control(format!(
                "failed to bind socket at {:?}: {}",
                self.socket_path, e
            ))
        })?;

        // Owner-only socket; nobody else gets to drive the device.
        let permissions = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&self.socket_path, permissions).map_err(|e| {
            RelaycamError::control(format!("failed to set socket permissions: {}", e))
        })?;

        info!("control server listening on {:?}", self.socket_path);
        self.listener = Some(listener);

        Ok(())
    }

    /// Get a receiver for shutdown signals
    pub fn shutdown_receiver(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Accept and handle one connection
    ///
    /// Returns true if the server should continue, false if it should shut
    /// down.
    pub async fn accept_one(&self) -> Result<bool> {
        let listener = self
            .listener
            .as_ref()
            .ok_or_else(|| RelaycamError::control("server not started"))?;

        // Accept with timeout so callers can interleave shutdown checks.
        let accept_result =
            tokio::time::timeout(std::time::Duration::from_millis(100), listener.accept()).await;

        let (stream, _addr) = match accept_result {
            Ok(Ok((stream, addr))) => (stream, addr),
            Ok(Err(e)) => {
                error!("failed to accept connection: {}", e);
                return Ok(true);
            }
            Err(_) => {
                return Ok(true);
            }
        };

        debug!("control client connected");

        Ok(self.handle_connection(stream).await)
    }

    /// Handle a client connection
    ///
    /// Returns true if the server should continue.
    async fn handle_connection(&self, stream: UnixStream) -> bool {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    debug!("control client disconnected");
                    return true;
                }
                Ok(_) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    match ControlMessage::from_bytes(trimmed.as_bytes()) {
                        Ok(msg) => {
                            let (response, should_stop) = self.handle_message(msg);

                            if let Err(e) = writer.write_all(&response.to_bytes()).await {
                                error!("failed to send control response: {}", e);
                                return true;
                            }

                            if should_stop {
                                let _ = self.shutdown_tx.send(());
                                return false;
                            }
                        }
                        Err(e) => {
                            warn!("invalid control message: {}", e);
                            let response = ControlResponse::error(format!("invalid message: {}", e));
                            let _ = writer.write_all(&response.to_bytes()).await;
                        }
                    }
                }
                Err(e) => {
                    error!("error reading from control client: {}", e);
                    return true;
                }
            }
        }
    }

    /// Handle a control message
    ///
    /// Returns (response, should_stop).
    fn handle_message(&self, msg: ControlMessage) -> (ControlResponse, bool) {
        match msg {
            ControlMessage::Ping => (ControlResponse::Pong, false),
            ControlMessage::Status => (ControlResponse::Status(self.get_status()), false),
            ControlMessage::Stats => (ControlResponse::Stats(self.device.stats()), false),
            ControlMessage::StartSource => match self.device.start_source() {
                Ok(()) => {
                    info!("source started via control channel");
                    (ControlResponse::Ok, false)
                }
                Err(e) => (ControlResponse::error(e.to_string()), false),
            },
            ControlMessage::StopSource => {
                // Idempotent: a stop with no matching start is absorbed.
                self.device.stop_source();
                info!("source stop requested via control channel");
                (ControlResponse::Ok, false)
            }
            ControlMessage::Stop => {
                info!("received stop command via control channel");
                (ControlResponse::Stopping, true)
            }
        }
    }

    /// Current device status
    fn get_status(&self) -> DeviceStatus {
        let format = self.device.format();
        DeviceStatus {
            device_name: self.device.name().to_string(),
            running: self.device.source_active(),
            source_sessions: self.device.stats().source_sessions,
            sink_sessions: self.device.stats().sink_sessions,
            resolution: (format.width, format.height),
            fps: format.fps_num / format.fps_den,
            pid: std::process::id(),
            uptime_seconds: self.start_time.elapsed().as_secs_f64(),
        }
    }

    /// Clean up the socket file
    pub fn cleanup(&self) {
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!("failed to remove socket file: {}", e);
            } else {
                debug!("removed socket file {:?}", self.socket_path);
            }
        }
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        self.cleanup();
    }
}
