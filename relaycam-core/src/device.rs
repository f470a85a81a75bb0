//! The virtual device
//!
//! Composes the buffer pool, pattern generator, and per-endpoint session
//! counters, and runs the two tick loops:
//!
//! ```text
//! producer ──▶ SinkRelayLoop ──▶ (relay, producer pts) ──▶ consumer
//!                  │ suppresses
//! SourceScheduler ─┴──▶ (synthetic stripe, host pts) ───▶ consumer
//! ```
//!
//! The loops never call each other; they coordinate only through the
//! session counters and the shared pool. Emission always happens outside
//! every lock.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use crate::config::DeviceConfig;
use crate::error::Result;
use crate::pattern::{self, SweepState};
use crate::pool::BufferPool;
use crate::relay::{FrameConsumer, FrameProducer, SequencedFrame};
use crate::session::{SessionCounter, TickWorker};
use crate::types::{host_time_ns, Frame, FrameData, FrameFormat};

/// Source scheduler thread name
const SOURCE_THREAD: &str = "relaycam-source";

/// Sink relay thread name
const SINK_THREAD: &str = "relaycam-sink";

/// Snapshot of device counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceStats {
    /// Synthetic frames emitted by the source scheduler
    pub synthetic_frames: u64,
    /// Producer frames relayed to the consumer
    pub relayed_frames: u64,
    /// Source ticks skipped because the pool was at its high-water mark
    pub dropped_busy: u64,
    /// Producer frames rejected for format mismatch
    pub rejected_frames: u64,
    /// Completions acknowledged to the producer
    pub completions_acked: u64,
    /// Current source session count
    pub source_sessions: u32,
    /// Current sink session count
    pub sink_sessions: u32,
    /// Pool buffers currently loaned out
    pub pool_outstanding: u32,
    /// Pool high-water mark
    pub pool_high_water: u32,
}

/// State shared between the device handle and the two tick threads
struct Shared {
    format: FrameFormat,
    pool: BufferPool,
    sweep: Mutex<SweepState>,
    source: SessionCounter,
    sink: SessionCounter,
    consumer: Arc<dyn FrameConsumer>,
    producer: Mutex<Option<Arc<dyn FrameProducer>>>,
    synthetic_frames: AtomicU64,
    relayed_frames: AtomicU64,
    dropped_busy: AtomicU64,
    rejected_frames: AtomicU64,
    completions_acked: AtomicU64,
}

impl Shared {
    /// One source scheduler tick (30 Hz, tight cadence)
    fn source_tick(&self) {
        // Sink-sourced frames preempt synthetic generation entirely.
        if self.sink.is_active() {
            trace!("sink active, source tick yields");
            return;
        }

        let Some(mut buf) = self.pool.acquire() else {
            self.dropped_busy.fetch_add(1, Ordering::Relaxed);
            debug!("out of frame buffers, dropping source tick");
            return;
        };

        {
            let mut sweep = self.sweep.lock();
            pattern::paint_stripe(&mut buf, &self.format, &mut sweep);
        }

        let pts = host_time_ns();
        let frame = Frame {
            format: self.format,
            data: FrameData::Pooled(buf),
            pts,
        };
        self.consumer.accept(frame, pts);
        self.synthetic_frames.fetch_add(1, Ordering::Relaxed);
    }

    /// One sink relay tick (3x frame rate, opportunistic drain)
    fn sink_tick(&self) {
        let producer = self.producer.lock().clone();
        let Some(producer) = producer else {
            // Dormant tick with no producer bound: safe no-op.
            return;
        };

        let Some(SequencedFrame { sequence, frame }) = producer.try_dequeue() else {
            return;
        };

        let now = host_time_ns();
        if !frame.format.matches(&self.format) {
            warn!(
                sequence,
                got = %frame.format,
                want = %self.format,
                "rejecting producer frame with mismatched format"
            );
            self.rejected_frames.fetch_add(1, Ordering::Relaxed);
        } else if self.source.is_active() {
            // Relay with the producer's own timestamp, not ours.
            let pts = frame.pts;
            self.consumer.accept(frame, pts);
            self.relayed_frames.fetch_add(1, Ordering::Relaxed);
        } else {
            trace!(sequence, "source idle, discarding relayed frame");
        }

        // Acknowledge consumption unconditionally so the producer can
        // reclaim the slot even with no consumer attached.
        producer.complete(sequence, now);
        self.completions_acked.fetch_add(1, Ordering::Relaxed);
    }
}

/// Virtual video device with a source and a sink endpoint
///
/// The consumer is wired in at construction; a producer attaches per sink
/// session. Endpoints are reference counted: any number of callers may
/// start them independently, and teardown happens on the last stop.
pub struct VirtualDevice {
    config: DeviceConfig,
    shared: Arc<Shared>,
}

impl VirtualDevice {
    /// Create a device with the given configuration and consumer
    ///
    /// Fails if the configuration is invalid or the buffer pool cannot be
    /// built; the device cannot operate without either.
    pub fn new(config: DeviceConfig, consumer: Arc<dyn FrameConsumer>) -> Result<Self> {
        config.validate()?;
        let format = config.format();
        let pool = BufferPool::new(format, config.pool_high_water)?;

        info!("creating virtual device '{}' ({})", config.name, format);

        let shared = Arc::new(Shared {
            format,
            pool,
            sweep: Mutex::new(SweepState::default()),
            source: SessionCounter::new("source"),
            sink: SessionCounter::new("sink"),
            consumer,
            producer: Mutex::new(None),
            synthetic_frames: AtomicU64::new(0),
            relayed_frames: AtomicU64::new(0),
            dropped_busy: AtomicU64::new(0),
            rejected_frames: AtomicU64::new(0),
            completions_acked: AtomicU64::new(0),
        });

        Ok(Self { config, shared })
    }

    /// Device name
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The device's fixed frame format
    pub fn format(&self) -> FrameFormat {
        self.shared.format
    }

    /// Device configuration
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Start the source endpoint
    ///
    /// The first start arms the source scheduler on its own thread; further
    /// starts only bump the session count.
    pub fn start_source(&self) -> Result<()> {
        let shared = Arc::clone(&self.shared);
        let period = self.config.frame_interval();
        self.shared.source.start(move || {
            TickWorker::spawn(SOURCE_THREAD, period, Duration::ZERO, move || {
                shared.source_tick()
            })
        })
    }

    /// Stop the source endpoint (teardown on the last matching stop)
    pub fn stop_source(&self) {
        self.shared.source.stop();
    }

    /// Start the sink endpoint with the given producer
    ///
    /// Records the producer handle for the relay loop; a start while already
    /// active replaces the handle (last writer wins) and bumps the count.
    /// The handle is published inside the session's critical section, so it
    /// cannot interleave with a concurrent stop's teardown.
    pub fn start_sink(&self, producer: Arc<dyn FrameProducer>) -> Result<()> {
        let shared = Arc::clone(&self.shared);
        let period = self.config.sink_poll_interval();
        let leeway = self.config.sink_leeway();
        self.shared.sink.start_with(
            move || TickWorker::spawn(SINK_THREAD, period, leeway, move || shared.sink_tick()),
            || *self.shared.producer.lock() = Some(producer),
        )
    }

    /// Stop the sink endpoint
    ///
    /// The producer handle is cleared only by the stop that takes the sink
    /// idle, inside the session's critical section; a start racing with the
    /// worker join keeps its own producer.
    pub fn stop_sink(&self) {
        self.shared.sink.stop_with(|| {
            self.shared.producer.lock().take();
        });
    }

    /// Whether the source endpoint is active
    pub fn source_active(&self) -> bool {
        self.shared.source.is_active()
    }

    /// Whether the sink endpoint is active
    pub fn sink_active(&self) -> bool {
        self.shared.sink.is_active()
    }

    /// Snapshot of the device counters
    pub fn stats(&self) -> DeviceStats {
        DeviceStats {
            synthetic_frames: self.shared.synthetic_frames.load(Ordering::Relaxed),
            relayed_frames: self.shared.relayed_frames.load(Ordering::Relaxed),
            dropped_busy: self.shared.dropped_busy.load(Ordering::Relaxed),
            rejected_frames: self.shared.rejected_frames.load(Ordering::Relaxed),
            completions_acked: self.shared.completions_acked.load(Ordering::Relaxed),
            source_sessions: self.shared.source.count(),
            sink_sessions: self.shared.sink.count(),
            pool_outstanding: self.shared.pool.outstanding(),
            pool_high_water: self.shared.pool.high_water(),
        }
    }

    /// Force both endpoints idle regardless of session counts
    pub fn shutdown(&self) {
        self.shared.source.shutdown();
        self.shared.sink.shutdown_with(|| {
            self.shared.producer.lock().take();
        });
        debug!("device '{}' shut down", self.config.name);
    }
}

impl Drop for VirtualDevice {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// What the test consumer saw for one accepted frame
    struct Received {
        pts: u64,
        host_time_ns: u64,
        format: FrameFormat,
        pooled: bool,
        stripe_row: Option<usize>,
    }

    #[derive(Default)]
    struct CollectingConsumer {
        received: Mutex<Vec<Received>>,
    }

    impl CollectingConsumer {
        fn first_white_row(frame: &Frame) -> Option<usize> {
            let stride = frame.format.stride() as usize;
            frame
                .as_bytes()
                .chunks(stride)
                .position(|line| line.first() == Some(&0xFF))
        }
    }

    impl FrameConsumer for CollectingConsumer {
        fn accept(&self, frame: Frame, host_time_ns: u64) {
            let record = Received {
                pts: frame.pts,
                host_time_ns,
                format: frame.format,
                pooled: frame.data.is_pooled(),
                stripe_row: Self::first_white_row(&frame),
            };
            self.received.lock().push(record);
        }
    }

    #[derive(Default)]
    struct QueueProducer {
        queue: Mutex<VecDeque<SequencedFrame>>,
        completions: Mutex<Vec<(u64, u64)>>,
    }

    impl QueueProducer {
        fn push(&self, sequence: u64, frame: Frame) {
            self.queue.lock().push_back(SequencedFrame { sequence, frame });
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

    fn device() -> (VirtualDevice, Arc<CollectingConsumer>) {
        let consumer = Arc::new(CollectingConsumer::default());
        let device = VirtualDevice::new(DeviceConfig::default(), consumer.clone()).unwrap();
        (device, consumer)
    }

    fn producer_frame(format: FrameFormat, pts: u64) -> Frame {
        Frame {
            format,
            data: FrameData::Memory(vec![0x55; format.frame_bytes()]),
            pts,
        }
    }

    #[test]
    fn test_three_ticks_emit_three_advancing_frames() {
        let (device, consumer) = device();

        for _ in 0..3 {
            device.shared.source_tick();
        }

        let received = consumer.received.lock();
        assert_eq!(received.len(), 3);
        for (i, r) in received.iter().enumerate() {
            assert_eq!(r.stripe_row, Some(i));
            assert_eq!(r.format, device.format());
            assert!(r.pooled);
            assert_eq!(r.pts, r.host_time_ns);
        }
        assert!(received.windows(2).all(|w| w[0].pts <= w[1].pts));
        assert_eq!(device.stats().synthetic_frames, 3);
    }

    #[test]
    fn test_active_sink_suppresses_generation() {
        let (device, consumer) = device();
        device.shared.sink.set_count_for_test(1);

        for _ in 0..3 {
            device.shared.source_tick();
        }

        assert!(consumer.received.lock().is_empty());
        assert_eq!(device.stats().synthetic_frames, 0);
    }

    #[test]
    fn test_busy_pool_drops_tick() {
        let (device, consumer) = device();

        let held: Vec<_> = (0..device.shared.pool.high_water())
            .map(|_| device.shared.pool.acquire().unwrap())
            .collect();
        device.shared.source_tick();

        assert!(consumer.received.lock().is_empty());
        assert_eq!(device.stats().dropped_busy, 1);
        drop(held);

        device.shared.source_tick();
        assert_eq!(consumer.received.lock().len(), 1);
    }

    #[test]
    fn test_relay_uses_producer_timestamp_and_acks() {
        let (device, consumer) = device();
        let producer = Arc::new(QueueProducer::default());
        producer.push(7, producer_frame(device.format(), 424_242));

        device.shared.source.set_count_for_test(1);
        *device.shared.producer.lock() = Some(producer.clone());

        device.shared.sink_tick();

        let received = consumer.received.lock();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].pts, 424_242);
        assert_eq!(received[0].host_time_ns, 424_242);
        assert!(!received[0].pooled);

        let completions = producer.completions.lock();
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].0, 7);
        assert_eq!(device.stats().relayed_frames, 1);
    }

    #[test]
    fn test_relay_acks_even_when_source_idle() {
        let (device, consumer) = device();
        let producer = Arc::new(QueueProducer::default());
        producer.push(3, producer_frame(device.format(), 99));
        *device.shared.producer.lock() = Some(producer.clone());

        device.shared.sink_tick();

        assert!(consumer.received.lock().is_empty());
        let completions = producer.completions.lock();
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].0, 3);
        assert_eq!(device.stats().completions_acked, 1);
    }

    #[test]
    fn test_relay_rejects_format_mismatch_but_still_acks() {
        let (device, consumer) = device();
        let producer = Arc::new(QueueProducer::default());
        let mut bad_format = device.format();
        bad_format.width = 640;
        bad_format.height = 480;
        producer.push(11, producer_frame(bad_format, 1));

        device.shared.source.set_count_for_test(1);
        *device.shared.producer.lock() = Some(producer.clone());

        device.shared.sink_tick();

        assert!(consumer.received.lock().is_empty());
        assert_eq!(device.stats().rejected_frames, 1);
        assert_eq!(producer.completions.lock().len(), 1);
    }

    #[test]
    fn test_sink_tick_without_producer_is_noop() {
        let (device, consumer) = device();
        device.shared.sink_tick();
        assert!(consumer.received.lock().is_empty());
        assert_eq!(device.stats().completions_acked, 0);
    }

    #[test]
    fn test_stop_sink_clears_producer_only_at_idle() {
        let (device, _consumer) = device();
        let producer = Arc::new(QueueProducer::default());

        device.start_sink(producer.clone()).unwrap();
        device.start_sink(producer).unwrap();
        assert_eq!(device.stats().sink_sessions, 2);

        device.stop_sink();
        assert!(device.sink_active());
        assert!(device.shared.producer.lock().is_some());

        device.stop_sink();
        assert!(!device.sink_active());
        assert!(device.shared.producer.lock().is_none());
    }

    /// Producer whose dequeue stalls, keeping a relay tick in flight
    struct SlowProducer {
        delay: Duration,
    }

    impl FrameProducer for SlowProducer {
        fn try_dequeue(&self) -> Option<SequencedFrame> {
            std::thread::sleep(self.delay);
            None
        }

        fn complete(&self, _sequence: u64, _host_time_ns: u64) {}
    }

    #[test]
    fn test_start_sink_during_final_stop_keeps_new_producer() {
        let (device, _consumer) = device();
        let device = Arc::new(device);

        // First session's relay tick blocks inside the producer, so the
        // final stop spends a long time joining the worker.
        device
            .start_sink(Arc::new(SlowProducer {
                delay: Duration::from_millis(200),
            }))
            .unwrap();
        std::thread::sleep(Duration::from_millis(30));

        let stopper = {
            let device = Arc::clone(&device);
            std::thread::spawn(move || device.stop_sink())
        };
        std::thread::sleep(Duration::from_millis(30));

        // A second session starts while that join is still in progress; its
        // producer must survive the older stop returning.
        let producer = Arc::new(QueueProducer::default());
        producer.push(9, producer_frame(device.format(), 9_000));
        device.start_sink(producer.clone()).unwrap();
        stopper.join().unwrap();

        assert!(device.sink_active());
        assert!(device.shared.producer.lock().is_some());

        // The new session's relay loop still drains and acks.
        std::thread::sleep(Duration::from_millis(300));
        {
            let completions = producer.completions.lock();
            assert_eq!(completions.len(), 1);
            assert_eq!(completions[0].0, 9);
        }
        device.shutdown();
    }

    #[test]
    fn test_construction_rejects_invalid_config() {
        let consumer = Arc::new(CollectingConsumer::default());
        let mut config = DeviceConfig::default();
        config.fps = 0;
        assert!(VirtualDevice::new(config, consumer).is_err());
    }
}
