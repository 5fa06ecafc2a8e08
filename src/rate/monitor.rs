//! # Rate Monitor
//!
//! A background sampler that reports how fast events (usually bytes) are
//! flowing without slowing down the code that produces them.
//!
//! ## Architecture
//!
//! ```text
//!     caller threads                       sampling thread
//!
//!     add(n) ──┐                     ┌──► sleep(period) / stop?
//!     add(n) ──┼─► pending (atomic) ─┤
//!     add(n) ──┘      swap(0) ◄──────┘    total += drained
//!                                         rate = drained / elapsed
//!                                              │
//!                                              ▼
//!                                    channel (cap 8) or callback
//! ```
//!
//! The hot path is a single `fetch_add`. Everything else (the cumulative
//! total, the period start, delivery) lives on the sampling thread.
//!
//! ## Lifecycle
//!
//! ```text
//!     Running ──stop()──► Stopping ──next check──► Stopped
//! ```
//!
//! `stop` is idempotent and never waits for the thread. A sample already
//! being computed when `stop` is called may still be delivered; nothing after
//! that is.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace};

use super::{config::MonitorConfig, utils::CacheAligned};

/// One report from a [`Monitor`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateSample {
    /// Events observed since the monitor was created.
    pub total: u64,

    /// Events per second over the period that just ended.
    pub rate: f64,
}

impl fmt::Display for RateSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} total, {:.2}/s", self.total, self.rate)
    }
}

/// Where samples go.
enum Sink {
    Channel(SyncSender<RateSample>),
    Callback(Box<dyn FnMut(RateSample) + Send>),
}

impl Sink {
    /// Hands `sample` over. Returns false when the sampling thread should exit:
    /// the monitor was stopped, or nobody can receive samples any more.
    ///
    /// A full channel is retried every `period` while still watching for a stop.
    fn deliver(
        &mut self,
        sample: RateSample,
        shared: &Shared,
        stop_rx: &Receiver<()>,
        period: Duration,
    ) -> bool {
        let tx = match self {
            Self::Channel(tx) => tx,
            Self::Callback(f) => {
                f(sample);
                return true;
            }
        };

        let mut sample = sample;
        loop {
            match tx.try_send(sample) {
                Ok(()) => return true,
                Err(TrySendError::Disconnected(_)) => {
                    debug!("Sample receiver dropped, stopping monitor thread");
                    return false;
                }
                Err(TrySendError::Full(pending)) => sample = pending,
            }

            trace!("Sample channel full, waiting for the consumer");
            match stop_rx.recv_timeout(period) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => return false,
                Err(RecvTimeoutError::Timeout) => {}
            }
            if shared.stopped.load(Ordering::Acquire) {
                return false;
            }
        }
    }
}

/// State shared between the monitor handle and its sampling thread.
#[derive(Debug)]
struct Shared {
    /// Events added since the last sample. Touched by every `add`.
    pending: CacheAligned<AtomicU64>,

    stopped: AtomicBool,
}

/// Measures the rate at which abstract events happen.
///
/// Calling [`add`](Self::add) records that `n` events happened. Every period
/// a background thread computes the average rate over the preceding period and
/// the running total, and hands both to a channel or a callback.
///
/// ## Example
///
/// ```rust
/// use std::time::Duration;
/// use streamrate::Monitor;
///
/// let (monitor, samples) = Monitor::new(Duration::from_millis(20));
/// monitor.add(1024);
///
/// let sample = samples.recv().unwrap();
/// assert_eq!(sample.total, 1024);
///
/// monitor.stop();
/// ```
///
/// ## Thread Safety
///
/// `Monitor` is `Sync`: share it by reference or through an `Arc` and call
/// `add` from any number of threads. Dropping it stops the sampling thread.
pub struct Monitor {
    shared: Arc<Shared>,
    stop_tx: mpsc::Sender<()>,
    period: Duration,
}

impl Monitor {
    /// Creates a monitor that sends a [`RateSample`] to the returned channel
    /// every `period`. A zero period selects the 500ms default.
    ///
    /// The channel holds up to 8 samples. When it is full the sampling thread
    /// waits for the consumer without losing samples, but still exits on
    /// [`stop`](Self::stop). If the receiver is dropped the thread exits too.
    ///
    /// # Panics
    ///
    /// Panics if the sampling thread cannot be spawned.
    pub fn new(period: Duration) -> (Self, Receiver<RateSample>) {
        Self::with_config(MonitorConfig::new(period))
    }

    /// Like [`new`](Self::new) with full control over period and channel
    /// capacity. A capacity of 0 is raised to 1; use
    /// [`MonitorConfig::validate`] to reject it instead.
    ///
    /// # Panics
    ///
    /// Panics if the sampling thread cannot be spawned.
    pub fn with_config(config: MonitorConfig) -> (Self, Receiver<RateSample>) {
        let (tx, rx) = mpsc::sync_channel(config.capacity.max(1));
        let monitor = Self::start(config.effective_period(), Sink::Channel(tx));
        (monitor, rx)
    }

    /// Creates a monitor that calls `f` on its sampling thread every `period`.
    /// A zero period selects the 500ms default.
    ///
    /// # Panics
    ///
    /// Panics if the sampling thread cannot be spawned.
    pub fn with_callback<F>(period: Duration, f: F) -> Self
    where
        F: FnMut(RateSample) + Send + 'static,
    {
        let config = MonitorConfig::new(period);
        Self::start(config.effective_period(), Sink::Callback(Box::new(f)))
    }

    fn start(period: Duration, sink: Sink) -> Self {
        let shared = Arc::new(Shared {
            pending: CacheAligned::new(AtomicU64::new(0)),
            stopped: AtomicBool::new(false),
        });
        let (stop_tx, stop_rx) = mpsc::channel();

        let thread_shared = shared.clone();
        thread::Builder::new()
            .name("streamrate-monitor".to_string())
            .spawn(move || sample_loop(&thread_shared, period, sink, &stop_rx))
            .expect("Failed to spawn monitor thread");

        Self {
            shared,
            stop_tx,
            period,
        }
    }

    /// Records that `n` events happened.
    ///
    /// A single atomic add: no locks, no I/O, safe from any thread.
    #[inline]
    pub fn add(&self, n: u64) {
        self.shared.pending.get().fetch_add(n, Ordering::Relaxed);
    }

    /// Stops sampling. Later calls do nothing.
    ///
    /// Does not wait for the sampling thread: at most one sample that was
    /// already in flight may still be delivered.
    pub fn stop(&self) {
        if !self.shared.stopped.swap(true, Ordering::AcqRel) {
            // Wakes the thread if it is sleeping; fails only if it already exited.
            let _ = self.stop_tx.send(());
        }
    }

    /// Returns true once [`stop`](Self::stop) has been called.
    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::Acquire)
    }

    /// Events added since the last sample.
    pub fn pending(&self) -> u64 {
        self.shared.pending.get().load(Ordering::Acquire)
    }

    /// The sampling period in use.
    pub fn period(&self) -> Duration {
        self.period
    }
}

impl fmt::Debug for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monitor")
            .field("period", &self.period)
            .field("pending", &self.pending())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn sample_loop(shared: &Shared, period: Duration, mut sink: Sink, stop_rx: &Receiver<()>) {
    info!("Started monitor thread (period: {:?})", period);

    let mut period_start = Instant::now();
    let mut total: u64 = 0;

    loop {
        match stop_rx.recv_timeout(period) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        // A stop that raced with the timeout still wins.
        if shared.stopped.load(Ordering::Acquire) {
            break;
        }

        let now = Instant::now();
        let elapsed = now.duration_since(period_start);
        period_start = now;

        let drained = shared.pending.get().swap(0, Ordering::AcqRel);
        total = total.saturating_add(drained);

        let sample = RateSample {
            total,
            rate: drained as f64 / elapsed.as_secs_f64(),
        };

        if !sink.deliver(sample, shared, stop_rx, period) {
            break;
        }
    }

    info!("Monitor thread stopping (total: {})", total);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    const PERIOD: Duration = Duration::from_millis(20);

    #[test]
    fn test_sample_accumulates_total() {
        let (monitor, samples) = Monitor::new(PERIOD);

        monitor.add(100);
        monitor.add(23);
        let first = samples.recv().unwrap();
        assert_eq!(first.total, 123);
        assert!(first.rate > 0.0);

        monitor.add(7);
        let mut second = samples.recv().unwrap();
        while second.total == 123 {
            second = samples.recv().unwrap();
        }
        assert_eq!(second.total, 130);

        monitor.stop();
    }

    #[test]
    fn test_pending_drained_after_sample() {
        let (monitor, samples) = Monitor::new(PERIOD);

        monitor.add(42);
        let sample = samples.recv().unwrap();
        assert_eq!(sample.total, 42);
        assert_eq!(monitor.pending(), 0);
    }

    #[test]
    fn test_idle_period_has_zero_rate() {
        let (_monitor, samples) = Monitor::new(PERIOD);

        let sample = samples.recv().unwrap();
        assert_eq!(sample.total, 0);
        assert_eq!(sample.rate, 0.0);
    }

    #[test]
    fn test_zero_period_uses_default() {
        let (monitor, _samples) = Monitor::new(Duration::ZERO);
        assert_eq!(monitor.period(), Duration::from_millis(500));
    }

    #[test]
    fn test_callback_delivery() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let monitor = Monitor::with_callback(PERIOD, move |sample| {
            sink.lock().unwrap().push(sample);
        });
        monitor.add(5);

        thread::sleep(PERIOD * 5);
        monitor.stop();

        let seen = seen.lock().unwrap();
        assert!(!seen.is_empty());
        assert_eq!(seen.last().unwrap().total, 5);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (monitor, samples) = Monitor::new(PERIOD);

        monitor.stop();
        monitor.stop();
        monitor.stop();
        assert!(monitor.is_stopped());

        // The thread exits and drops the sender.
        let remaining: Vec<_> = samples.iter().collect();
        assert!(remaining.len() <= 1);
    }

    #[test]
    fn test_stop_reaches_thread_blocked_on_full_channel() {
        let config = MonitorConfig::new(Duration::from_millis(1)).with_capacity(1);
        let (monitor, samples) = Monitor::with_config(config);

        // Nobody reads: the channel fills and the thread waits to deliver.
        thread::sleep(Duration::from_millis(30));
        monitor.stop();
        thread::sleep(Duration::from_millis(30));

        // The thread exited while the receiver is still held, so its sender is gone.
        assert!(samples.try_recv().is_ok());
        assert_eq!(samples.try_recv(), Err(mpsc::TryRecvError::Disconnected));
    }

    #[test]
    fn test_drop_reaches_thread_blocked_on_full_channel() {
        let config = MonitorConfig::new(Duration::from_millis(1)).with_capacity(2);
        let (monitor, samples) = Monitor::with_config(config);

        thread::sleep(Duration::from_millis(30));
        drop(monitor);
        thread::sleep(Duration::from_millis(30));

        let queued: Vec<_> = samples.try_iter().collect();
        assert_eq!(queued.len(), 2);
        assert_eq!(samples.try_recv(), Err(mpsc::TryRecvError::Disconnected));
    }

    #[test]
    fn test_full_channel_keeps_samples() {
        let config = MonitorConfig::new(Duration::from_millis(5)).with_capacity(1);
        let (monitor, samples) = Monitor::with_config(config);

        monitor.add(10);
        thread::sleep(Duration::from_millis(30));
        monitor.add(5);

        // The first sample waited in the channel; the later bytes still show up.
        assert_eq!(samples.recv().unwrap().total, 10);
        let mut sample = samples.recv().unwrap();
        while sample.total < 15 {
            sample = samples.recv().unwrap();
        }
        assert_eq!(sample.total, 15);
    }

    #[test]
    fn test_drop_stops_thread() {
        let (monitor, samples) = Monitor::new(PERIOD);
        drop(monitor);

        assert!(samples.iter().count() <= 1);
    }

    #[test]
    fn test_concurrent_add() {
        let (monitor, samples) = Monitor::new(Duration::from_millis(200));
        let monitor = Arc::new(monitor);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let monitor = monitor.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        monitor.add(1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut total = 0;
        while total < 8000 {
            total = samples.recv_timeout(Duration::from_secs(5)).unwrap().total;
        }
        assert_eq!(total, 8000);
    }

    #[test]
    fn test_receiver_dropped_ends_thread() {
        let (monitor, samples) = Monitor::new(PERIOD);
        drop(samples);

        thread::sleep(PERIOD * 3);
        // Still usable: add just bumps the counter.
        monitor.add(1);
        assert_eq!(monitor.pending(), 1);
    }

    #[test]
    fn test_sample_display() {
        let sample = RateSample {
            total: 10,
            rate: 2.5,
        };
        assert_eq!(sample.to_string(), "10 total, 2.50/s");
    }
}
