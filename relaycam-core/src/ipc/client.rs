//! Control client for CLI commands
//!
//! Connects to the running daemon to send control signals and queries.

use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::debug;

use super::protocol::{ControlMessage, ControlResponse, DeviceStatus};
use super::socket_path;
use crate::device::DeviceStats;
use crate::error::{RelaycamError, Result};

/// Default connection timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default read/write timeout
const IO_TIMEOUT: Duration = Duration::from_secs(10);

/// Control client for communicating with the daemon
pub struct ControlClient {
    stream: UnixStream,
}

impl ControlClient {
    /// Connect to the daemon at the default socket path
    pub async fn connect() -> Result<Self> {
        Self::connect_to(&socket_path()).await
    }

    /// Connect to a daemon at a specific socket path
    pub async fn connect_to(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RelaycamError::NoActiveSession);
        }

        let stream = tokio::time::timeout(CONNECT_TIMEOUT, UnixStream::connect(path))
            .await
            .map_err(|_| RelaycamError::control("connection timed out"))?
            .map_err(|e| RelaycamError::control(format!("failed to connect to daemon: {}", e)))?;

        debug!("connected to daemon at {:?}", path);

        Ok(Self { stream })
    }

    /// Send a message and receive a response
    async fn send(&mut self, msg: ControlMessage) -> Result<ControlResponse> {
        let (reader, mut writer) = self.stream.split();

        let msg_bytes = msg.to_bytes();
        tokio::time::timeout(IO_TIMEOUT, writer.write_all(&msg_bytes))
            .await
            .map_err(|_| RelaycamError::control("write timed out"))?
            .map_err(|e| RelaycamError::control(format!("failed to send message: {}", e)))?;

        let mut reader = BufReader::new(reader);
        let mut line = String::new();
        tokio::time::timeout(IO_TIMEOUT, reader.read_line(&mut line))
            .await
            .map_err(|_| RelaycamError::control("read timed out"))?
            .map_err(|e| RelaycamError::control(format!("failed to read response: {}", e)))?;

        ControlResponse::from_bytes(line.trim().as_bytes())
            .map_err(|e| RelaycamError::control(format!("invalid response: {}", e)))
    }

    /// Ping the daemon to check if it's alive
    pub async fn ping(&mut self) -> Result<bool> {
        match self.send(ControlMessage::Ping).await {
            Ok(ControlResponse::Pong) => Ok(true),
            Ok(_) => Ok(false),
            Err(_) => Ok(false),
        }
    }

    /// Get the current device status
    pub async fn status(&mut self) -> Result<DeviceStatus> {
        match self.send(ControlMessage::Status).await? {
            ControlResponse::Status(status) => Ok(status),
            ControlResponse::Error { message } => Err(RelaycamError::Control(message)),
            _ => Err(RelaycamError::control("unexpected response")),
        }
    }

    /// Get device counters
    pub async fn stats(&mut self) -> Result<DeviceStats> {
        match self.send(ControlMessage::Stats).await? {
            ControlResponse::Stats(stats) => Ok(stats),
            ControlResponse::Error { message } => Err(RelaycamError::Control(message)),
            _ => Err(RelaycamError::control("unexpected response")),
        }
    }

    /// Start (or join) the source endpoint
    pub async fn start_source(&mut self) -> Result<()> {
        match self.send(ControlMessage::StartSource).await? {
            ControlResponse::Ok => Ok(()),
            ControlResponse::Error { message } => Err(RelaycamError::Control(message)),
            _ => Err(RelaycamError::control("unexpected response")),
        }
    }

    /// Stop the source endpoint
    pub async fn stop_source(&mut self) -> Result<()> {
        match self.send(ControlMessage::StopSource).await? {
            ControlResponse::Ok => Ok(()),
            ControlResponse::Error { message } => Err(RelaycamError::Control(message)),
            _ => Err(RelaycamError::control("unexpected response")),
        }
    }

    /// Request the daemon to stop
    pub async fn stop(&mut self) -> Result<()> {
        match self.send(ControlMessage::Stop).await? {
            ControlResponse::Stopping => Ok(()),
            ControlResponse::Error { message } => Err(RelaycamError::Control(message)),
            _ => Err(RelaycamError::control("unexpected response")),
        }
    }
}
