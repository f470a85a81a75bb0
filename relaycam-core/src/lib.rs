//! Relaycam Core Library
//!
//! A virtual video device with two endpoints: a **source** that downstream
//! consumers read frames from, and a **sink** that an external producer
//! writes frames into. With no producer attached the source emits a
//! synthetic test signal (a white stripe bouncing vertically at a fixed
//! 30 fps); with a producer attached, its frames preempt the synthetic
//! signal and are relayed with their original timestamps.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐    ┌───────────────┐    ┌────────────────┐
//! │ Producer │───▶│ Sink Relay    │───▶│                │
//! │ (sink in)│    │ (90 Hz drain) │    │    Consumer    │
//! └──────────┘    └───────────────┘    │  (source out)  │
//!                 ┌───────────────┐    │                │
//!                 │ Source Sched. │───▶│                │
//!                 │ (30 Hz sweep) │    └────────────────┘
//!                 └───────────────┘
//! ```
//!
//! Both loops run on dedicated threads and coordinate only through the
//! reference-counted session gates and the shared buffer pool.

pub mod config;
pub mod device;
pub mod error;
pub mod ipc;
pub mod pattern;
pub mod pool;
pub mod relay;
pub mod session;
pub mod types;

pub use config::{DeviceConfig, DEFAULT_DEVICE_NAME};
pub use device::{DeviceStats, VirtualDevice};
pub use error::{RelaycamError, Result};
pub use pattern::{SweepState, STRIPE_HEIGHT};
pub use pool::{BufferPool, PooledBuffer, DEFAULT_HIGH_WATER};
pub use relay::{FrameConsumer, FrameProducer, SequencedFrame};
pub use session::SessionCounter;
pub use types::{host_time_ns, Frame, FrameData, FrameFormat, PixelLayout};
