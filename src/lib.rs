//! # Streamrate - Bandwidth Limiting and Throughput Monitoring for Blocking I/O
//!
//! Two composable decorators for anything that implements `std::io::Read` or
//! `std::io::Write`:
//!
//! - a **limiter** that caps throughput at a fixed number of bytes per second
//! - a **monitor** that reports observed throughput from a background thread
//!
//! ## The Quantum Bucket
//!
//! The limiter cuts time into fixed windows (quanta, 100ms by default) and
//! grants `bytes_per_second * quantum` bytes in each one:
//!
//! ```text
//!     1000 B/s, 100ms quantum → 100 bytes per quantum
//!
//!     Time 0ms:    [▓▓▓▓▓▓▓▓▓▓] 100 bytes available
//!     write(60):   [▓▓▓▓      ]  40 left
//!     write(60):   [          ]  40 written, budget gone
//!                  ... sleeps until 100ms ...
//!     Time 100ms:  [▓▓▓▓▓▓▓▓▓▓] refilled, remaining 20 written
//! ```
//!
//! Reads return at most one quantum's worth of bytes (a normal short read).
//! Writes are split across as many quanta as needed and only return once
//! everything was written or the wrapped writer failed.
//!
//! ## Quick Start
//!
//! ### Limiting
//!
//! ```rust
//! use std::io::{Read, Write};
//! use streamrate::{LimitReader, LimitWriter};
//!
//! // Read at most 64 KiB/s
//! let mut reader = LimitReader::new(&b"some input"[..], 64 * 1024);
//! let mut input = Vec::new();
//! reader.read_to_end(&mut input).unwrap();
//!
//! // Write at most 1 MiB/s
//! let mut writer = LimitWriter::new(Vec::new(), 1024 * 1024);
//! writer.write_all(&input).unwrap();
//! ```
//!
//! ### Monitoring
//!
//! ```rust
//! use std::io::Write;
//! use std::time::Duration;
//! use streamrate::MonitorWriter;
//!
//! let (mut writer, samples) = MonitorWriter::new(Vec::new(), Duration::from_millis(10));
//! writer.write_all(b"hello").unwrap();
//!
//! let sample = samples.recv().unwrap();
//! println!("{} bytes so far, {:.0} B/s", sample.total, sample.rate);
//! ```
//!
//! ### Builder
//!
//! ```rust
//! use std::time::Duration;
//! use streamrate::LimiterBuilder;
//!
//! let writer = LimiterBuilder::new()
//!     .bytes_per_second(10_000)
//!     .quantum(Duration::from_millis(20))
//!     .writer(Vec::new());
//!
//! assert_eq!(writer.metrics().bytes_per_quantum(), 200);
//! ```
//!
//! ## Architecture Overview
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │   Your Application      │
//!                    └──────────┬──────────────┘
//!                               │ read / write / close
//!                ┌──────────────┴───────────────┐
//!                │                               │
//!     ┌──────────▼──────────┐       ┌───────────▼──────────┐
//!     │   Limit{Reader,     │       │   Monitor{Reader,    │
//!     │         Writer}     │       │           Writer}    │
//!     ├─────────────────────┤       ├──────────────────────┤
//!     │ • Quantum bucket    │       │ • Atomic add(n)      │
//!     │ • Sleeps the caller │       │ • Sampling thread    │
//!     │ • Splits writes     │       │ • Channel / callback │
//!     └──────────┬──────────┘       └───────────┬──────────┘
//!                └──────────────┬───────────────┘
//!                               ▼
//!                     underlying Read / Write
//! ```
//!
//! ## Thread Safety
//!
//! - Limiters are driven through `&mut self`, so one thread uses a limiter at a
//!   time. Wrap it in a `Mutex` to share it.
//! - [`Monitor`] is `Sync`; `add` may be called from any number of threads.
//!
//! ## Logging
//!
//! The crate emits `tracing` events (limiter setup, quantum waits at `trace`,
//! monitor thread lifecycle). Install any subscriber to see them.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    missing_debug_implementations
)]
#![forbid(unsafe_code)]

// Internal module
mod rate;

use std::io::{Read, Write};
use std::time::Duration;

// Public re-exports
pub use rate::{
    is_closed, Budget, ConfigError, LimitReader, LimitWriter, LimiterConfig, LimiterMetrics,
    Monitor, MonitorConfig, MonitorReader, MonitorWriter, RateSample, StreamError,
    DEFAULT_PERIOD, DEFAULT_QUANTUM, DEFAULT_SAMPLE_CAPACITY,
};

/// A monitor wrapped in `Arc` for feeding it from several threads.
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use streamrate::{Monitor, SharedMonitor};
/// use std::sync::Arc;
///
/// let (monitor, _samples) = Monitor::new(Duration::from_millis(100));
/// let shared: SharedMonitor = Arc::new(monitor);
///
/// let counter = shared.clone();
/// std::thread::spawn(move || counter.add(512)).join().unwrap();
/// ```
pub type SharedMonitor = std::sync::Arc<Monitor>;

/// Version information for the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Minimum supported Rust version.
///
/// 1.72 is the first release where `mpsc::Sender` is `Sync`, which lets
/// `Monitor::stop` take `&self`.
pub const MSRV: &str = "1.72.0";

/// Prelude module for convenient imports.
///
/// ```rust
/// use streamrate::prelude::*;
/// ```
pub mod prelude {
    //! Common imports for typical limiting and monitoring use cases.
    //!
    //! # Example
    //! ```rust
    //! use streamrate::prelude::*;
    //!
    //! let config = LimiterConfig::per_second(1024);
    //! let reader = LimitReader::with_config(&b"abc"[..], config);
    //! ```

    pub use crate::{
        is_closed, LimitReader, LimitWriter, LimiterBuilder, LimiterConfig, LimiterMetrics,
        Monitor, MonitorConfig, MonitorReader, MonitorWriter, RateSample, SharedMonitor,
    };
}

/// Builder for rate-limited readers and writers.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use streamrate::LimiterBuilder;
///
/// let reader = LimiterBuilder::new()
///     .bytes_per_second(4096)
///     .quantum(Duration::from_millis(50))
///     .reader(&b"payload"[..]);
///
/// assert_eq!(reader.metrics().bytes_per_quantum(), 204);
///
/// // try_* variants validate the configuration first
/// let result = LimiterBuilder::new()
///     .bytes_per_second(u64::MAX)
///     .quantum(Duration::from_secs(u64::MAX))
///     .try_writer(Vec::new());
///
/// assert!(result.is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct LimiterBuilder {
    config: LimiterConfig,
}

impl LimiterBuilder {
    /// Creates a builder with the default configuration: no practical limit,
    /// 100ms quantum.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the throughput ceiling. Zero makes every non-empty transfer block
    /// forever.
    pub fn bytes_per_second(mut self, bytes_per_second: u64) -> Self {
        self.config.bytes_per_second = bytes_per_second;
        self
    }

    /// Sets the scheduling quantum.
    pub fn quantum(mut self, quantum: Duration) -> Self {
        self.config.quantum = quantum;
        self
    }

    /// Returns the configuration built so far.
    pub fn config(&self) -> LimiterConfig {
        self.config
    }

    /// Builds a rate-limited reader.
    pub fn reader<R: Read>(self, inner: R) -> LimitReader<R> {
        LimitReader::with_config(inner, self.config)
    }

    /// Builds a rate-limited writer.
    pub fn writer<W: Write>(self, inner: W) -> LimitWriter<W> {
        LimitWriter::with_config(inner, self.config)
    }

    /// Builds a rate-limited reader after validating the configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configuration is invalid.
    pub fn try_reader<R: Read>(self, inner: R) -> Result<LimitReader<R>, ConfigError> {
        self.config.validate()?;
        Ok(self.reader(inner))
    }

    /// Builds a rate-limited writer after validating the configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configuration is invalid.
    pub fn try_writer<W: Write>(self, inner: W) -> Result<LimitWriter<W>, ConfigError> {
        self.config.validate()?;
        Ok(self.writer(inner))
    }
}
