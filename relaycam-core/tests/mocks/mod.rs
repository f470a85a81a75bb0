//! Mock infrastructure for testing
//!
//! A recording consumer for the source output path and a queue-backed
//! producer for the sink endpoint.

use parking_lot::Mutex;
use std::collections::VecDeque;

use relaycam_core::{Frame, FrameConsumer, FrameData, FrameFormat, FrameProducer, SequencedFrame};

/// What the recording consumer saw for one accepted frame
#[derive(Debug, Clone)]
pub struct ReceivedFrame {
    pub pts: u64,
    pub host_time_ns: u64,
    pub format: FrameFormat,
    pub pooled: bool,
    /// First all-white row, present for synthetic stripe frames
    pub stripe_row: Option<u32>,
}

/// Consumer that records metadata about every accepted frame
///
/// Frames themselves are dropped on accept, which returns pooled buffers
/// to the device pool the way a real consumer finishing a read would.
#[derive(Default)]
pub struct RecordingConsumer {
    received: Mutex<Vec<ReceivedFrame>>,
}

impl RecordingConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.received.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<ReceivedFrame> {
        self.received.lock().clone()
    }
}

impl FrameConsumer for RecordingConsumer {
    fn accept(&self, frame: Frame, host_time_ns: u64) {
        let stride = frame.format.stride() as usize;
        let stripe_row = frame
            .as_bytes()
            .chunks(stride)
            .position(|line| line.first() == Some(&0xFF))
            .map(|row| row as u32);

        self.received.lock().push(ReceivedFrame {
            pts: frame.pts,
            host_time_ns,
            format: frame.format,
            pooled: frame.data.is_pooled(),
            stripe_row,
        });
    }
}

/// Producer backed by an in-memory queue
#[derive(Default)]
pub struct QueueProducer {
    queue: Mutex<VecDeque<SequencedFrame>>,
    completions: Mutex<Vec<(u64, u64)>>,
}

impl QueueProducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a frame for the relay loop to dequeue
    pub fn push(&self, sequence: u64, frame: Frame) {
        self.queue
            .lock()
            .push_back(SequencedFrame { sequence, frame });
    }

    /// Completions acknowledged so far, as (sequence, host_time_ns)
    pub fn completions(&self) -> Vec<(u64, u64)> {
        self.completions.lock().clone()
    }
}

impl FrameProducer for QueueProducer {
    fn try_dequeue(&self) -> Option<SequencedFrame> {
        self.queue.lock().pop_front()
    }

    fn complete(&self, sequence: u64, host_time_ns: u64) {
        self.completions.lock().push((sequence, host_time_ns));
    }
}

/// Create a producer frame filled with a solid byte value
pub fn create_producer_frame(format: FrameFormat, pts: u64, fill: u8) -> Frame {
    Frame {
        format,
        data: FrameData::Memory(vec![fill; format.frame_bytes()]),
        pts,
    }
}
