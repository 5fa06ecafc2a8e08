//! # Stream Decorators
//!
//! Thin wrappers that put a [`Bucket`] or a [`Monitor`] in front of any
//! `std::io::Read` or `std::io::Write`.
//!
//! | Decorator | Wraps | Does |
//! |---|---|---|
//! | [`LimitReader`] | `Read` | caps read throughput, short reads allowed |
//! | [`LimitWriter`] | `Write` | caps write throughput, splits big writes |
//! | [`MonitorReader`] | `Read` | reports read throughput |
//! | [`MonitorWriter`] | `Write` | reports write throughput |
//!
//! Every decorator can be [`close`](LimitReader::close)d. Closing drops the
//! wrapped stream (writers are flushed first) and makes every later call fail
//! with the closed error (see [`is_closed`](super::is_closed)).

use std::fmt;
use std::io::{self, Read, Write};
use std::sync::mpsc::Receiver;
use std::time::Duration;

use tracing::debug;

use super::{
    config::LimiterConfig,
    core::{Bucket, ReadInto, WriteFrom},
    error::{closed, StreamError},
    metrics::LimiterMetrics,
    monitor::{Monitor, RateSample},
};

/// A reader capped at a fixed number of bytes per second.
///
/// Each `read` returns at most one quantum's worth of bytes, sleeping first if
/// the current quantum is used up. With a rate of zero any non-empty `read`
/// blocks forever.
///
/// ## Example
///
/// ```rust
/// use std::io::Read;
/// use streamrate::LimitReader;
///
/// // 1000 B/s, 100 bytes per 100ms quantum
/// let mut reader = LimitReader::new(&[0u8; 4096][..], 1000);
/// let mut buf = [0u8; 512];
///
/// assert_eq!(reader.read(&mut buf).unwrap(), 100);
/// ```
pub struct LimitReader<R> {
    inner: Option<R>,
    bucket: Bucket,
}

impl<R: Read> LimitReader<R> {
    /// Limits `inner` to `bytes_per_second` with the default 100ms quantum.
    pub fn new(inner: R, bytes_per_second: u64) -> Self {
        Self::with_config(inner, LimiterConfig::per_second(bytes_per_second))
    }

    /// Limits `inner` to `bytes_per_second`, granting the budget every `quantum`.
    ///
    /// Smaller quanta give smoother throughput as long as `inner` answers
    /// quickly; very small ones cost extra read calls.
    pub fn with_quantum(inner: R, bytes_per_second: u64, quantum: Duration) -> Self {
        Self::with_config(inner, LimiterConfig::new(bytes_per_second, quantum))
    }

    /// Limits `inner` according to `config`.
    pub fn with_config(inner: R, config: LimiterConfig) -> Self {
        Self {
            inner: Some(inner),
            bucket: Bucket::new(config),
        }
    }
}

impl<R> LimitReader<R> {
    /// The configuration this reader was built with.
    pub fn config(&self) -> &LimiterConfig {
        self.bucket.config()
    }

    /// Snapshot of the limiter's activity.
    pub fn metrics(&self) -> LimiterMetrics {
        self.bucket.metrics()
    }

    /// Bytes still available in the current quantum.
    pub fn quantum_remaining(&self) -> usize {
        self.bucket.remaining()
    }

    /// The wrapped reader, or `None` once closed.
    pub fn get_ref(&self) -> Option<&R> {
        self.inner.as_ref()
    }

    /// Mutable access to the wrapped reader. Reading through it bypasses the limit.
    pub fn get_mut(&mut self) -> Option<&mut R> {
        self.inner.as_mut()
    }

    /// Unwraps the reader, or `None` if it was closed.
    pub fn into_inner(self) -> Option<R> {
        self.inner
    }

    /// Returns true once closed.
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    /// Drops the wrapped reader. Later reads fail with the closed error.
    pub fn close(&mut self) -> io::Result<()> {
        if self.inner.take().is_some() {
            debug!("Closed rate-limited reader");
        }
        Ok(())
    }
}

impl<R: Read> Read for LimitReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let inner = self.inner.as_mut().ok_or_else(closed)?;
        let len = buf.len();
        self.bucket.run(&mut ReadInto { inner, buf }, len)
    }
}

impl<R: fmt::Debug> fmt::Debug for LimitReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LimitReader")
            .field("inner", &self.inner)
            .field("bucket", &self.bucket)
            .finish()
    }
}

/// A writer capped at a fixed number of bytes per second.
///
/// A `write` larger than one quantum's budget is split across as many quanta
/// as needed and only returns once every byte was accepted (or the wrapped
/// writer failed). With a rate of zero any non-empty `write` blocks forever.
///
/// ## Example
///
/// ```rust
/// use std::io::Write;
/// use std::time::{Duration, Instant};
/// use streamrate::LimitWriter;
///
/// // 10 bytes per 10ms quantum
/// let mut writer = LimitWriter::with_quantum(Vec::new(), 1000, Duration::from_millis(10));
///
/// let start = Instant::now();
/// assert_eq!(writer.write(&[1u8; 30]).unwrap(), 30);
/// assert!(start.elapsed() >= Duration::from_millis(20));
/// ```
pub struct LimitWriter<W> {
    inner: Option<W>,
    bucket: Bucket,
}

impl<W: Write> LimitWriter<W> {
    /// Limits `inner` to `bytes_per_second` with the default 100ms quantum.
    pub fn new(inner: W, bytes_per_second: u64) -> Self {
        Self::with_config(inner, LimiterConfig::per_second(bytes_per_second))
    }

    /// Limits `inner` to `bytes_per_second`, granting the budget every `quantum`.
    pub fn with_quantum(inner: W, bytes_per_second: u64, quantum: Duration) -> Self {
        Self::with_config(inner, LimiterConfig::new(bytes_per_second, quantum))
    }

    /// Limits `inner` according to `config`.
    pub fn with_config(inner: W, config: LimiterConfig) -> Self {
        Self {
            inner: Some(inner),
            bucket: Bucket::new(config),
        }
    }

    /// Flushes and drops the wrapped writer. Later writes fail with the closed
    /// error, whether or not the flush succeeded.
    pub fn close(&mut self) -> io::Result<()> {
        match self.inner.take() {
            Some(mut inner) => {
                debug!("Closing rate-limited writer");
                inner.flush()
            }
            None => Ok(()),
        }
    }
}

impl<W> LimitWriter<W> {
    /// The configuration this writer was built with.
    pub fn config(&self) -> &LimiterConfig {
        self.bucket.config()
    }

    /// Snapshot of the limiter's activity.
    pub fn metrics(&self) -> LimiterMetrics {
        self.bucket.metrics()
    }

    /// Bytes still available in the current quantum.
    pub fn quantum_remaining(&self) -> usize {
        self.bucket.remaining()
    }

    /// The wrapped writer, or `None` once closed.
    pub fn get_ref(&self) -> Option<&W> {
        self.inner.as_ref()
    }

    /// Mutable access to the wrapped writer. Writing through it bypasses the limit.
    pub fn get_mut(&mut self) -> Option<&mut W> {
        self.inner.as_mut()
    }

    /// Unwraps the writer without flushing, or `None` if it was closed.
    pub fn into_inner(self) -> Option<W> {
        self.inner
    }

    /// Returns true once closed.
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }
}

impl<W: Write> Write for LimitWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let inner = self.inner.as_mut().ok_or_else(closed)?;
        let len = buf.len();
        self.bucket.run(&mut WriteFrom { inner, buf }, len)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.as_mut().ok_or_else(closed)?.flush()
    }
}

impl<W: fmt::Debug> fmt::Debug for LimitWriter<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LimitWriter")
            .field("inner", &self.inner)
            .field("bucket", &self.bucket)
            .finish()
    }
}

/// Shared plumbing of the two monitored decorators.
struct Monitored<T> {
    inner: Option<T>,
    monitor: Monitor,
    err: Option<StreamError>,
}

impl<T> Monitored<T> {
    fn new(inner: T, monitor: Monitor) -> Self {
        Self {
            inner: Some(inner),
            monitor,
            err: None,
        }
    }

    /// Runs `op` on the wrapped stream, counting what it moved.
    fn observe(&mut self, op: impl FnOnce(&mut T) -> io::Result<usize>) -> io::Result<usize> {
        if let Some(err) = &self.err {
            return Err(err.clone().into());
        }
        let inner = self.inner.as_mut().ok_or_else(closed)?;

        match op(inner) {
            Ok(n) => {
                self.monitor.add(n as u64);
                Ok(n)
            }
            Err(err) => {
                self.err = StreamError::remember(&err);
                if self.err.is_some() {
                    debug!("Monitored stream failed, remembering error: {}", err);
                }
                Err(err)
            }
        }
    }

    /// Stops the monitor, then releases the stream through `release`.
    fn close(&mut self, release: impl FnOnce(T) -> io::Result<()>) -> io::Result<()> {
        self.monitor.stop();
        let Some(inner) = self.inner.take() else {
            return Ok(());
        };
        // Whatever happened before, from now on the only answer is "closed".
        self.err = None;
        debug!("Closing monitored stream");
        release(inner)
    }
}

/// A reader that reports the rate at which bytes are read from it.
///
/// Every period the average rate over the preceding period and the total
/// bytes read so far are sent to a channel or passed to a callback. Once the
/// wrapped reader fails, that error is returned by every later call.
///
/// ## Example
///
/// ```rust
/// use std::io::Read;
/// use std::time::Duration;
/// use streamrate::MonitorReader;
///
/// let (mut reader, samples) = MonitorReader::new(&b"hello world"[..], Duration::from_millis(10));
///
/// let mut out = String::new();
/// reader.read_to_string(&mut out).unwrap();
///
/// let sample = samples.recv().unwrap();
/// assert_eq!(sample.total, 11);
/// ```
pub struct MonitorReader<R> {
    state: Monitored<R>,
}

impl<R: Read> MonitorReader<R> {
    /// Wraps `inner`, sending a sample to the returned channel every `period`.
    /// A zero period selects the 500ms default.
    ///
    /// # Panics
    ///
    /// Panics if the sampling thread cannot be spawned.
    pub fn new(inner: R, period: Duration) -> (Self, Receiver<RateSample>) {
        let (monitor, samples) = Monitor::new(period);
        (Self::with_monitor(inner, monitor), samples)
    }

    /// Wraps `inner`, calling `f` on the sampling thread every `period`.
    ///
    /// # Panics
    ///
    /// Panics if the sampling thread cannot be spawned.
    pub fn with_callback<F>(inner: R, period: Duration, f: F) -> Self
    where
        F: FnMut(RateSample) + Send + 'static,
    {
        Self::with_monitor(inner, Monitor::with_callback(period, f))
    }

    /// Wraps `inner`, feeding an existing monitor. The reader owns it from now on.
    pub fn with_monitor(inner: R, monitor: Monitor) -> Self {
        Self {
            state: Monitored::new(inner, monitor),
        }
    }
}

impl<R> MonitorReader<R> {
    /// The monitor fed by this reader.
    pub fn monitor(&self) -> &Monitor {
        &self.state.monitor
    }

    /// The wrapped reader, or `None` once closed.
    pub fn get_ref(&self) -> Option<&R> {
        self.state.inner.as_ref()
    }

    /// Mutable access to the wrapped reader. Reads through it are not counted.
    pub fn get_mut(&mut self) -> Option<&mut R> {
        self.state.inner.as_mut()
    }

    /// Stops the monitor and unwraps the reader, or `None` if it was closed.
    pub fn into_inner(mut self) -> Option<R> {
        self.state.monitor.stop();
        self.state.inner.take()
    }

    /// Returns true once closed.
    pub fn is_closed(&self) -> bool {
        self.state.inner.is_none()
    }

    /// Stops the monitor and drops the wrapped reader. Later reads fail with
    /// the closed error.
    pub fn close(&mut self) -> io::Result<()> {
        self.state.close(|inner| {
            drop(inner);
            Ok(())
        })
    }
}

impl<R: Read> Read for MonitorReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.state.observe(|inner| inner.read(buf))
    }
}

impl<R: fmt::Debug> fmt::Debug for MonitorReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorReader")
            .field("inner", &self.state.inner)
            .field("monitor", &self.state.monitor)
            .field("err", &self.state.err)
            .finish()
    }
}

/// A writer that reports the rate at which bytes are written to it.
///
/// Every period the average rate over the preceding period and the total
/// bytes written so far are sent to a channel or passed to a callback. Once
/// the wrapped writer fails, that error is returned by every later call.
pub struct MonitorWriter<W> {
    state: Monitored<W>,
}

impl<W: Write> MonitorWriter<W> {
    /// Wraps `inner`, sending a sample to the returned channel every `period`.
    /// A zero period selects the 500ms default.
    ///
    /// # Panics
    ///
    /// Panics if the sampling thread cannot be spawned.
    pub fn new(inner: W, period: Duration) -> (Self, Receiver<RateSample>) {
        let (monitor, samples) = Monitor::new(period);
        (Self::with_monitor(inner, monitor), samples)
    }

    /// Wraps `inner`, calling `f` on the sampling thread every `period`.
    ///
    /// # Panics
    ///
    /// Panics if the sampling thread cannot be spawned.
    pub fn with_callback<F>(inner: W, period: Duration, f: F) -> Self
    where
        F: FnMut(RateSample) + Send + 'static,
    {
        Self::with_monitor(inner, Monitor::with_callback(period, f))
    }

    /// Wraps `inner`, feeding an existing monitor. The writer owns it from now on.
    pub fn with_monitor(inner: W, monitor: Monitor) -> Self {
        Self {
            state: Monitored::new(inner, monitor),
        }
    }

    /// Stops the monitor, then flushes and drops the wrapped writer. Later
    /// writes fail with the closed error, whether or not the flush succeeded.
    pub fn close(&mut self) -> io::Result<()> {
        self.state.close(|mut inner| inner.flush())
    }
}

impl<W> MonitorWriter<W> {
    /// The monitor fed by this writer.
    pub fn monitor(&self) -> &Monitor {
        &self.state.monitor
    }

    /// The wrapped writer, or `None` once closed.
    pub fn get_ref(&self) -> Option<&W> {
        self.state.inner.as_ref()
    }

    /// Mutable access to the wrapped writer. Writes through it are not counted.
    pub fn get_mut(&mut self) -> Option<&mut W> {
        self.state.inner.as_mut()
    }

    /// Stops the monitor and unwraps the writer without flushing, or `None`
    /// if it was closed.
    pub fn into_inner(mut self) -> Option<W> {
        self.state.monitor.stop();
        self.state.inner.take()
    }

    /// Returns true once closed.
    pub fn is_closed(&self) -> bool {
        self.state.inner.is_none()
    }
}

impl<W: Write> Write for MonitorWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.state.observe(|inner| inner.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.state.observe(|inner| inner.flush().map(|()| 0)).map(drop)
    }
}

impl<W: fmt::Debug> fmt::Debug for MonitorWriter<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorWriter")
            .field("inner", &self.state.inner)
            .field("monitor", &self.state.monitor)
            .field("err", &self.state.err)
            .finish()
    }
}
