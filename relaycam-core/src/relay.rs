//! Producer and consumer seams
//!
//! The device core talks to the outside world through these two traits:
//! a producer feeds frames into the sink endpoint, a consumer reads frames
//! off the source endpoint. Both are handed in as typed `Arc` handles, so
//! the wiring is explicit at call sites instead of discovered at runtime.

use crate::types::Frame;

/// Frame tagged with the producer's monotonically increasing sequence number
#[derive(Debug)]
pub struct SequencedFrame {
    /// Producer-assigned sequence number
    pub sequence: u64,
    /// The frame itself
    pub frame: Frame,
}

/// External producer attached to the sink endpoint
///
/// Both operations must be non-blocking; the relay loop calls them from its
/// tick thread and a stalled producer must only ever yield empty ticks.
pub trait FrameProducer: Send + Sync {
    /// Dequeue one completed frame, if any is ready
    fn try_dequeue(&self) -> Option<SequencedFrame>;

    /// Acknowledge consumption of `sequence` at `host_time_ns`
    ///
    /// Called for every dequeued frame whether or not it was relayed, so the
    /// producer can reclaim the slot regardless of consumer attachment.
    fn complete(&self, sequence: u64, host_time_ns: u64);
}

/// Downstream consumer attached to the source endpoint
pub trait FrameConsumer: Send + Sync {
    /// Accept an emitted frame
    ///
    /// Fire-and-forget: must not block the calling tick thread. Ownership of
    /// the frame (and any pooled buffer behind it) transfers to the
    /// consumer; dropping the frame releases the buffer.
    fn accept(&self, frame: Frame, host_time_ns: u64);
}
