//! Bounded frame buffer pool
//!
//! Pre-allocates a fixed set of frame-sized buffers and loans them out.
//! `acquire` is non-blocking: once the outstanding count reaches the
//! high-water mark it returns `None` ("busy"), which callers treat as
//! "skip this cycle" rather than an error. A loaned buffer returns to the
//! free set when its `PooledBuffer` is dropped, wherever that happens.

use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::error::{RelaycamError, Result};
use crate::types::FrameFormat;

/// Default outstanding-buffer high-water mark
pub const DEFAULT_HIGH_WATER: u32 = 5;

struct PoolInner {
    format: FrameFormat,
    high_water: u32,
    free: Mutex<Vec<Vec<u8>>>,
    acquired: AtomicU64,
    busy: AtomicU64,
}

/// Bounded pool of fixed-format frame buffers
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

impl BufferPool {
    /// Create a pool with `high_water` pre-allocated buffers of `format` size
    pub fn new(format: FrameFormat, high_water: u32) -> Result<Self> {
        if format.frame_bytes() == 0 {
            return Err(RelaycamError::config(format!(
                "degenerate frame format {}",
                format
            )));
        }
        if high_water == 0 {
            return Err(RelaycamError::config("buffer pool high-water mark is zero"));
        }

        let frame_bytes = format.frame_bytes();
        let free: Vec<Vec<u8>> = (0..high_water).map(|_| vec![0u8; frame_bytes]).collect();
        debug!(
            high_water,
            frame_bytes, "created buffer pool for format {}", format
        );

        Ok(Self {
            inner: Arc::new(PoolInner {
                format,
                high_water,
                free: Mutex::new(free),
                acquired: AtomicU64::new(0),
                busy: AtomicU64::new(0),
            }),
        })
    }

    /// Acquire a buffer without clearing it
    ///
    /// Returns `None` once outstanding buffers reach the high-water mark.
    /// Never blocks beyond the free-list lock. Contents are whatever the
    /// previous owner left behind; callers must fully overwrite.
    pub fn acquire(&self) -> Option<PooledBuffer> {
        let data = {
            let mut free = self.inner.free.lock();
            free.pop()
        };
        match data {
            Some(data) => {
                self.inner.acquired.fetch_add(1, Ordering::Relaxed);
                Some(PooledBuffer {
                    data,
                    inner: Arc::clone(&self.inner),
                })
            }
            None => {
                self.inner.busy.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Format every buffer in this pool matches
    pub fn format(&self) -> FrameFormat {
        self.inner.format
    }

    /// Outstanding-buffer high-water mark
    pub fn high_water(&self) -> u32 {
        self.inner.high_water
    }

    /// Buffers currently loaned out
    pub fn outstanding(&self) -> u32 {
        self.inner.high_water - self.free_count()
    }

    /// Buffers currently in the free set
    pub fn free_count(&self) -> u32 {
        self.inner.free.lock().len() as u32
    }

    /// Total successful acquisitions
    pub fn acquired_total(&self) -> u64 {
        self.inner.acquired.load(Ordering::Relaxed)
    }

    /// Total acquisitions refused at the high-water mark
    pub fn busy_total(&self) -> u64 {
        self.inner.busy.load(Ordering::Relaxed)
    }
}

/// Buffer loaned from a [`BufferPool`]
///
/// Dereferences to the frame bytes. Returns to the pool's free set on drop;
/// the pool does not clear returned contents.
pub struct PooledBuffer {
    data: Vec<u8>,
    inner: Arc<PoolInner>,
}

impl Deref for PooledBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        let data = std::mem::take(&mut self.data);
        self.inner.free.lock().push(data);
    }
}

impl std::fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("len", &self.data.len())
            .finish()
    }
}
