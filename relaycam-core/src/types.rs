//! Core types for Relaycam
//!
//! These types represent the frames flowing through the device and the
//! fixed format descriptor every frame is checked against.

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use crate::pool::PooledBuffer;

/// Default device width in pixels
pub const DEFAULT_WIDTH: u32 = 1280;

/// Default device height in pixels
pub const DEFAULT_HEIGHT: u32 = 720;

/// Default device frame rate (frames per second)
pub const DEFAULT_FRAME_RATE: u32 = 30;

/// Pixel layout of a frame
///
/// The device runs a single fixed layout; the enum exists so the format
/// descriptor is self-describing in configs and over the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PixelLayout {
    /// 32-bit packed BGRA, 8 bits per channel
    #[default]
    Bgra32,
}

impl PixelLayout {
    /// Bytes per pixel
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            PixelLayout::Bgra32 => 4,
        }
    }
}

impl std::fmt::Display for PixelLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PixelLayout::Bgra32 => write!(f, "BGRA32"),
        }
    }
}

/// Frame format descriptor
///
/// Fixed for the lifetime of a device. Every frame produced or relayed must
/// match it exactly; mismatches are rejected, never adapted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameFormat {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Pixel layout
    pub layout: PixelLayout,
    /// Frame rate numerator (frames)
    pub fps_num: u32,
    /// Frame rate denominator (seconds)
    pub fps_den: u32,
}

impl FrameFormat {
    /// Stride in bytes of one row
    pub fn stride(&self) -> u32 {
        self.width * self.layout.bytes_per_pixel()
    }

    /// Total size in bytes of one frame
    pub fn frame_bytes(&self) -> usize {
        self.stride() as usize * self.height as usize
    }

    /// Duration of one frame interval
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(self.fps_den as f64 / self.fps_num as f64)
    }

    /// Exact match check used on the relay path
    pub fn matches(&self, other: &FrameFormat) -> bool {
        self == other
    }
}

impl Default for FrameFormat {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            layout: PixelLayout::Bgra32,
            fps_num: DEFAULT_FRAME_RATE,
            fps_den: 1,
        }
    }
}

impl std::fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}x{} {} @ {}/{}",
            self.width, self.height, self.layout, self.fps_num, self.fps_den
        )
    }
}

/// Video frame
///
/// Immutable once published. Not `Clone` on purpose: a frame has exactly
/// one owner at a time, and handing it to a consumer is a move.
#[derive(Debug)]
pub struct Frame {
    /// Frame format
    pub format: FrameFormat,
    /// Frame data
    pub data: FrameData,
    /// Presentation timestamp in nanoseconds (monotonic host time)
    pub pts: u64,
}

impl Frame {
    /// Frame payload as bytes
    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_bytes()
    }
}

/// Frame data storage
#[derive(Debug)]
pub enum FrameData {
    /// Buffer loaned from the device pool; returns to the pool on drop
    Pooled(PooledBuffer),
    /// Producer-supplied memory
    Memory(Vec<u8>),
}

impl FrameData {
    /// Payload as bytes
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            FrameData::Pooled(buf) => buf,
            FrameData::Memory(data) => data,
        }
    }

    /// Check if this frame is backed by the device pool
    pub fn is_pooled(&self) -> bool {
        matches!(self, FrameData::Pooled(_))
    }
}

/// Monotonic host time in nanoseconds
///
/// Measured from the first call in this process; only differences and
/// ordering are meaningful, matching the host-time clock contract.
pub fn host_time_ns() -> u64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let epoch = EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_nanos() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_format() {
        let fmt = FrameFormat::default();
        assert_eq!(fmt.width, 1280);
        assert_eq!(fmt.height, 720);
        assert_eq!(fmt.stride(), 1280 * 4);
        assert_eq!(fmt.frame_bytes(), 1280 * 720 * 4);
        assert_eq!(fmt.frame_interval(), Duration::from_secs_f64(1.0 / 30.0));
    }

    #[test]
    fn test_format_match_is_exact() {
        let fmt = FrameFormat::default();
        let mut other = fmt;
        assert!(fmt.matches(&other));
        other.height = 1080;
        assert!(!fmt.matches(&other));
        other = fmt;
        other.fps_num = 60;
        assert!(!fmt.matches(&other));
    }

    #[test]
    fn test_host_time_is_monotonic() {
        let a = host_time_ns();
        let b = host_time_ns();
        assert!(b >= a);
    }
}
