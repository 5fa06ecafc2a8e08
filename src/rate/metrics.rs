//! # Limiter Metrics
//!
//! A point-in-time snapshot of what a limiter has done so far: how many bytes
//! it let through, how many quanta it opened, and how long the caller spent
//! asleep waiting for the next one.
//!
//! ```text
//!     Limiter Metrics:
//!     ├─ Transfer:
//!     │  ├─ Bytes: 1048576 in 2048 calls
//!     │  └─ Average Rate: 10240.00 B/s
//!     └─ Scheduling:
//!        ├─ Budget: 1024 bytes / 100ms
//!        ├─ Quanta: 1024
//!        └─ Waiting: 97.50% of 102.400s
//! ```

use std::fmt;
use std::time::Duration;

use super::config::Budget;

/// Snapshot of a limiter's activity.
///
/// ## Example
///
/// ```rust
/// use std::io::Write;
/// use streamrate::LimitWriter;
///
/// let mut writer = LimitWriter::new(Vec::new(), 1_000_000);
/// writer.write_all(b"hello").unwrap();
///
/// let metrics = writer.metrics();
/// assert_eq!(metrics.bytes_transferred, 5);
/// assert_eq!(metrics.bytes_per_quantum(), 100_000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimiterMetrics {
    /// Bytes moved through the limiter.
    pub bytes_transferred: u64,

    /// Non-empty read or write calls made by the caller.
    pub calls: u64,

    /// Quanta opened so far. Each one grants a fresh budget.
    pub quanta: u64,

    /// Total time the caller spent sleeping for a new quantum.
    pub waited: Duration,

    /// Time since the limiter was created.
    pub elapsed: Duration,

    /// The budget the limiter schedules with.
    pub budget: Budget,
}

impl LimiterMetrics {
    /// Bytes per quantum of the underlying budget (0 when blocked).
    #[inline]
    pub fn bytes_per_quantum(&self) -> usize {
        self.budget.bytes_per_quantum()
    }

    /// Average throughput over the limiter's lifetime, in bytes per second.
    pub fn average_rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.bytes_transferred as f64 / secs
        }
    }

    /// Share of the limiter's lifetime spent sleeping, from 0.0 to 1.0.
    ///
    /// Close to 1.0 means the limiter is the bottleneck; close to 0.0 means
    /// the underlying stream or the caller is.
    pub fn wait_ratio(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            (self.waited.as_secs_f64() / secs).min(1.0)
        }
    }

    /// Human-readable multi-line report.
    pub fn summary(&self) -> String {
        let budget = match self.budget {
            Budget::Blocked => "blocked (zero rate)".to_string(),
            Budget::Quantum {
                bytes_per_quantum,
                quantum,
            } => format!("{} bytes / {:?}", bytes_per_quantum, quantum),
        };

        format!(
            "Limiter Metrics:\n\
             ├─ Transfer:\n\
             │  ├─ Bytes: {} in {} calls\n\
             │  └─ Average Rate: {:.2} B/s\n\
             └─ Scheduling:\n\
             \x20  ├─ Budget: {}\n\
             \x20  ├─ Quanta: {}\n\
             \x20  └─ Waiting: {:.2}% of {:.3}s",
            self.bytes_transferred,
            self.calls,
            self.average_rate(),
            budget,
            self.quanta,
            self.wait_ratio() * 100.0,
            self.elapsed.as_secs_f64(),
        )
    }
}

impl fmt::Display for LimiterMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} bytes, {} quanta, {:.2} B/s",
            self.bytes_transferred,
            self.quanta,
            self.average_rate()
        )
    }
}
