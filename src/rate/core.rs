//! # Core Bucket Limiter
//!
//! This module implements the quantum-based token bucket that throttles
//! blocking reads and writes. Time is cut into fixed windows (quanta); each
//! window grants a fixed byte budget, and a caller that exhausts the budget
//! sleeps until the window ends.
//!
//! ```text
//!     write(350 bytes), 100 bytes per 100ms quantum:
//!
//!     t=0ms     ├─ 100 ─┤                       budget 100 → 0
//!     t=100ms           ├─ 100 ─┤               sleep, refill, 100 → 0
//!     t=200ms                   ├─ 100 ─┤       sleep, refill, 100 → 0
//!     t=300ms                           ├─ 50 ─┤ sleep, refill, 100 → 50
//!                                               returns Ok(350)
//!
//!     read(350 bytes), same budget:
//!
//!     t=0ms     ├─ 100 ─┤                       returns Ok(100)
//! ```
//!
//! ## One State Machine, Two Directions
//!
//! The bucket never touches a reader or writer directly. It drives a
//! [`Transfer`], a narrow "move the bytes in this range" capability with two
//! adapters: [`ReadInto`] and [`WriteFrom`]. Writes drain the whole request
//! (splitting it across as many quanta as needed); reads return after one
//! budget-clipped call, like any short read.
//!
//! All scheduling happens on the calling thread. The bucket is owned by a
//! single decorator and mutated only through `&mut self`.

use std::io::{self, Read, Write};
use std::ops::Range;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use super::{
    config::{Budget, LimiterConfig},
    metrics::LimiterMetrics,
    utils::{block_forever, sleep_until},
};

/// Moves bytes between a caller's buffer and an underlying stream.
pub(crate) trait Transfer {
    /// Keep transferring until the whole request is done (writes), or stop
    /// after the first budget-clipped call (reads).
    const DRAIN: bool;

    /// Transfers at most `range.len()` bytes of the caller's buffer.
    fn transfer(&mut self, range: Range<usize>) -> io::Result<usize>;
}

/// Reads from `R` into a caller-supplied buffer.
pub(crate) struct ReadInto<'a, R: ?Sized> {
    pub(crate) inner: &'a mut R,
    pub(crate) buf: &'a mut [u8],
}

impl<R: Read + ?Sized> Transfer for ReadInto<'_, R> {
    const DRAIN: bool = false;

    #[inline]
    fn transfer(&mut self, range: Range<usize>) -> io::Result<usize> {
        self.inner.read(&mut self.buf[range])
    }
}

/// Writes a caller-supplied buffer to `W`.
pub(crate) struct WriteFrom<'a, W: ?Sized> {
    pub(crate) inner: &'a mut W,
    pub(crate) buf: &'a [u8],
}

impl<W: Write + ?Sized> Transfer for WriteFrom<'_, W> {
    const DRAIN: bool = true;

    #[inline]
    fn transfer(&mut self, range: Range<usize>) -> io::Result<usize> {
        self.inner.write(&self.buf[range])
    }
}

/// Quantum bookkeeping for one limited stream.
///
/// Invariant: `remaining <= budget.bytes_per_quantum()`, and no more than
/// `bytes_per_quantum` bytes move between two refills.
#[derive(Debug)]
pub(crate) struct Bucket {
    config: LimiterConfig,
    budget: Budget,

    /// End of the current quantum: the earliest time the next refill may
    /// happen. `None` before the first refill.
    window_end: Option<Instant>,

    /// Bytes left in the current quantum.
    remaining: usize,

    created: Instant,
    bytes_transferred: u64,
    calls: u64,
    quanta: u64,
    waited: Duration,
}

impl Bucket {
    pub(crate) fn new(config: LimiterConfig) -> Self {
        let budget = config.budget();

        match budget {
            Budget::Blocked => {
                debug!("Rate limiter configured with zero rate; transfers will block forever");
            }
            Budget::Quantum {
                bytes_per_quantum,
                quantum,
            } => {
                if quantum != config.effective_quantum() {
                    debug!(
                        "Rate {} B/s too low for {:?} quantum, using 1 byte per {:?}",
                        config.bytes_per_second,
                        config.effective_quantum(),
                        quantum
                    );
                }
                debug!(
                    "Rate limiter configured: {} B/s, {} bytes per {:?}",
                    config.bytes_per_second, bytes_per_quantum, quantum
                );
            }
        }

        Self {
            config,
            budget,
            window_end: None,
            remaining: 0,
            created: Instant::now(),
            bytes_transferred: 0,
            calls: 0,
            quanta: 0,
            waited: Duration::ZERO,
        }
    }

    pub(crate) fn config(&self) -> &LimiterConfig {
        &self.config
    }

    /// Bytes still available in the current quantum.
    pub(crate) fn remaining(&self) -> usize {
        self.remaining
    }

    pub(crate) fn metrics(&self) -> LimiterMetrics {
        LimiterMetrics {
            bytes_transferred: self.bytes_transferred,
            calls: self.calls,
            quanta: self.quanta,
            waited: self.waited,
            elapsed: self.created.elapsed(),
            budget: self.budget,
        }
    }

    /// Runs a rate-limited transfer of `len` bytes.
    ///
    /// Blocks the caller while the current quantum's budget is exhausted.
    /// Underlying errors are returned untouched, except that a draining
    /// transfer which already moved some bytes reports `Ok(moved)` and leaves
    /// the error for the next call.
    pub(crate) fn run<T: Transfer>(&mut self, io: &mut T, len: usize) -> io::Result<usize> {
        if len == 0 {
            return Ok(0);
        }

        let (bytes_per_quantum, quantum) = match self.budget {
            Budget::Blocked => {
                warn!("Transfer of {} bytes on a zero-rate limiter; blocking forever", len);
                block_forever()
            }
            Budget::Quantum {
                bytes_per_quantum,
                quantum,
            } => (bytes_per_quantum, quantum),
        };

        self.calls += 1;
        let mut done = 0;

        // Each pass either moves at least one byte or returns, so a fully
        // accepted write takes at most ceil(len / bytes_per_quantum) + 1 passes.
        loop {
            if self.remaining == 0 {
                self.refill(bytes_per_quantum, quantum);
            }

            let chunk = (len - done).min(self.remaining);
            let n = match io.transfer(done..done + chunk) {
                Ok(n) => n.min(chunk),
                Err(err) if done > 0 => {
                    trace!("Transfer failed after {} bytes: {}", done, err);
                    return Ok(done);
                }
                Err(err) => return Err(err),
            };

            self.remaining -= n;
            self.bytes_transferred += n as u64;
            done += n;

            if !T::DRAIN || done == len {
                return Ok(done);
            }

            if n == 0 {
                if done > 0 {
                    return Ok(done);
                }
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "underlying stream accepted no bytes",
                ));
            }
        }
    }

    /// Waits out the current quantum, then opens a new one with a full budget.
    fn refill(&mut self, bytes_per_quantum: usize, quantum: Duration) {
        let slept = match self.window_end {
            Some(end) => sleep_until(end),
            None => Duration::ZERO,
        };

        self.waited += slept;
        self.quanta += 1;
        self.window_end = Some(Instant::now() + quantum);
        self.remaining = bytes_per_quantum;

        trace!(
            "Quantum {} opened after {:?} wait, budget {} bytes",
            self.quanta,
            slept,
            bytes_per_quantum
        );
    }
}
