//! Control protocol definitions
//!
//! Line-delimited JSON messages between the daemon and control clients.

use serde::{Deserialize, Serialize};

use crate::device::DeviceStats;

/// Messages a client can send to the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlMessage {
    /// Check if the daemon is alive
    Ping,
    /// Request current device status
    Status,
    /// Request device counters
    Stats,
    /// Start (or join) the source endpoint
    StartSource,
    /// Stop the source endpoint
    StopSource,
    /// Stop the daemon gracefully
    Stop,
}

/// Responses from the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlResponse {
    /// Simple acknowledgment
    Ok,
    /// Pong response to ping
    Pong,
    /// Error response
    Error { message: String },
    /// Status response
    Status(DeviceStatus),
    /// Counters response
    Stats(DeviceStats),
    /// Shutdown acknowledgment
    Stopping,
}

/// Current device status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceStatus {
    /// Device name
    pub device_name: String,
    /// Whether the source endpoint is emitting
    pub running: bool,
    /// Source session count
    pub source_sessions: u32,
    /// Sink session count
    pub sink_sessions: u32,
    /// Fixed output resolution
    pub resolution: (u32, u32),
    /// Fixed frame rate
    pub fps: u32,
    /// Daemon process ID
    pub pid: u32,
    /// Uptime in seconds
    pub uptime_seconds: f64,
}

impl ControlMessage {
    /// Serialize message to JSON bytes with newline terminator
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = serde_json::to_vec(self).unwrap_or_default();
        bytes.push(b'\n');
        bytes
    }

    /// Deserialize message from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

impl ControlResponse {
    /// Serialize response to JSON bytes with newline terminator
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = serde_json::to_vec(self).unwrap_or_default();
        bytes.push(b'\n');
        bytes
    }

    /// Deserialize response from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Create an error response
    pub fn error(message: impl Into<String>) -> Self {
        ControlResponse::Error {
            message: message.into(),
        }
    }
}
