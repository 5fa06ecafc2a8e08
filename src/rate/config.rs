//! # Limiter and Monitor Configuration
//!
//! This module holds the settings for both halves of the crate and the
//! arithmetic that turns a bytes-per-second ceiling into a per-quantum budget.
//!
//! ## Quantum Budget
//!
//! ```text
//!     bytes_per_second = 1000, quantum = 100ms
//!
//!     ├── quantum ──┤── quantum ──┤── quantum ──┤
//!     │  100 bytes  │  100 bytes  │  100 bytes  │
//!     └─────────────┴─────────────┴─────────────┘
//!
//!     bytes_per_second = 3, quantum = 100ms   (0.3 bytes per quantum)
//!
//!     ├──── 333ms ────┤──── 333ms ────┤
//!     │     1 byte    │     1 byte    │   ← degenerates to one byte
//!     └───────────────┴───────────────┘
//! ```
//!
//! A rate of zero is not an error: it yields [`Budget::Blocked`], and every
//! non-empty transfer through such a limiter blocks forever.

use std::time::Duration;

use super::error::ConfigError;

/// Default scheduling interval for limiters.
pub const DEFAULT_QUANTUM: Duration = Duration::from_millis(100);

/// Default sampling period for monitors.
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(500);

/// Default capacity of the sample channel returned by [`Monitor::new`](super::Monitor::new).
pub const DEFAULT_SAMPLE_CAPACITY: usize = 8;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// The derived, immutable scheduling budget of a limiter.
///
/// Computed once from a [`LimiterConfig`] and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Budget {
    /// Zero rate: any non-empty transfer blocks forever.
    Blocked,

    /// At most `bytes_per_quantum` bytes may move in each `quantum`.
    Quantum {
        /// Bytes granted per window (always at least 1).
        bytes_per_quantum: usize,
        /// Length of one window.
        quantum: Duration,
    },
}

impl Budget {
    /// Bytes granted per quantum, or 0 when blocked.
    pub fn bytes_per_quantum(&self) -> usize {
        match self {
            Self::Blocked => 0,
            Self::Quantum {
                bytes_per_quantum, ..
            } => *bytes_per_quantum,
        }
    }

    /// Effective quantum, or `None` when blocked.
    pub fn quantum(&self) -> Option<Duration> {
        match self {
            Self::Blocked => None,
            Self::Quantum { quantum, .. } => Some(*quantum),
        }
    }

    /// Returns true for the zero-rate budget.
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked)
    }
}

/// Configuration for a rate-limited reader or writer.
///
/// ## Examples
///
/// ```rust
/// use std::time::Duration;
/// use streamrate::{Budget, LimiterConfig};
///
/// // 1 KiB/s in 100ms windows: 102 bytes per window
/// let config = LimiterConfig::per_second(1024);
/// assert_eq!(config.budget().bytes_per_quantum(), 102);
///
/// // Smoother output with 10ms windows
/// let config = LimiterConfig::per_second(1024).with_quantum(Duration::from_millis(10));
/// assert_eq!(config.budget().bytes_per_quantum(), 10);
///
/// // Zero means "never transfer anything"
/// assert_eq!(LimiterConfig::per_second(0).budget(), Budget::Blocked);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterConfig {
    /// Throughput ceiling. Zero blocks every non-empty transfer forever.
    pub bytes_per_second: u64,

    /// Length of one scheduling window. Zero selects [`DEFAULT_QUANTUM`].
    ///
    /// Smaller values give smoother throughput as long as the underlying
    /// stream answers quickly, but too small a quantum costs extra calls.
    pub quantum: Duration,
}

impl Default for LimiterConfig {
    /// Unlimited in practice: `u64::MAX` bytes per second in 100ms windows.
    fn default() -> Self {
        Self {
            bytes_per_second: u64::MAX,
            quantum: DEFAULT_QUANTUM,
        }
    }
}

impl LimiterConfig {
    /// Creates a configuration with an explicit quantum.
    pub fn new(bytes_per_second: u64, quantum: Duration) -> Self {
        Self {
            bytes_per_second,
            quantum,
        }
    }

    /// Creates a configuration with the default 100ms quantum.
    pub fn per_second(bytes_per_second: u64) -> Self {
        Self::new(bytes_per_second, DEFAULT_QUANTUM)
    }

    /// Sets the quantum.
    pub fn with_quantum(mut self, quantum: Duration) -> Self {
        self.quantum = quantum;
        self
    }

    /// The quantum the limiter actually uses. Zero selects [`DEFAULT_QUANTUM`].
    pub fn effective_quantum(&self) -> Duration {
        if self.quantum.is_zero() {
            DEFAULT_QUANTUM
        } else {
            self.quantum
        }
    }

    /// Derives the scheduling budget.
    ///
    /// `bytes_per_quantum = floor(bytes_per_second * quantum / 1s)`. When that
    /// rounds to zero the budget becomes one byte per `1s / bytes_per_second`.
    /// A budget that would not fit in `usize` saturates; use [`validate`](Self::validate)
    /// to reject such configurations instead.
    pub fn budget(&self) -> Budget {
        if self.bytes_per_second == 0 {
            return Budget::Blocked;
        }

        let bps = self.bytes_per_second as u128;
        let raw = self.raw_bytes_per_quantum();

        if raw == 0 {
            // bps >= 1 here, so the division is defined and the result is <= 1s.
            let nanos = (NANOS_PER_SEC / bps) as u64;
            return Budget::Quantum {
                bytes_per_quantum: 1,
                quantum: Duration::from_nanos(nanos.max(1)),
            };
        }

        Budget::Quantum {
            bytes_per_quantum: usize::try_from(raw).unwrap_or(usize::MAX),
            quantum: self.effective_quantum(),
        }
    }

    fn raw_bytes_per_quantum(&self) -> u128 {
        (self.bytes_per_second as u128).saturating_mul(self.effective_quantum().as_nanos()) / NANOS_PER_SEC
    }

    /// Checks that the per-quantum budget is representable on this platform.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BudgetOverflow`] when `bytes_per_second * quantum`
    /// exceeds `usize::MAX` bytes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.raw_bytes_per_quantum() > usize::MAX as u128 {
            return Err(ConfigError::BudgetOverflow {
                bytes_per_second: self.bytes_per_second,
                quantum: self.quantum,
            });
        }
        Ok(())
    }
}

/// Configuration for a [`Monitor`](super::Monitor).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Time between samples. Zero selects [`DEFAULT_PERIOD`].
    pub period: Duration,

    /// Capacity of the sample channel. Ignored for callback monitors.
    pub capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            period: DEFAULT_PERIOD,
            capacity: DEFAULT_SAMPLE_CAPACITY,
        }
    }
}

impl MonitorConfig {
    /// Creates a configuration with the given period and the default capacity.
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            ..Default::default()
        }
    }

    /// Sets the sampling period.
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Sets the sample channel capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// The period the sampling thread actually uses.
    pub fn effective_period(&self) -> Duration {
        if self.period.is_zero() {
            DEFAULT_PERIOD
        } else {
            self.period
        }
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroCapacity`] when `capacity` is 0: a rendezvous
    /// channel would stall the sampling thread on every sample.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_basic() {
        let config = LimiterConfig::new(1000, Duration::from_millis(100));
        assert_eq!(
            config.budget(),
            Budget::Quantum {
                bytes_per_quantum: 100,
                quantum: Duration::from_millis(100),
            }
        );
    }

    #[test]
    fn test_budget_rounds_down() {
        let config = LimiterConfig::new(1999, Duration::from_millis(100));
        assert_eq!(config.budget().bytes_per_quantum(), 199);
    }

    #[test]
    fn test_budget_degenerates_to_one_byte() {
        let config = LimiterConfig::new(3, Duration::from_millis(100));
        let budget = config.budget();

        assert_eq!(budget.bytes_per_quantum(), 1);
        assert_eq!(budget.quantum(), Some(Duration::from_nanos(333_333_333)));
    }

    #[test]
    fn test_budget_zero_quantum_uses_default() {
        let config = LimiterConfig::new(10, Duration::ZERO);
        let budget = config.budget();

        assert_eq!(budget.bytes_per_quantum(), 1);
        assert_eq!(budget.quantum(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn test_budget_zero_quantum_above_one_gigabyte() {
        let config = LimiterConfig::new(2_000_000_000, Duration::ZERO);
        assert_eq!(config.effective_quantum(), DEFAULT_QUANTUM);
        assert_eq!(
            config.budget(),
            Budget::Quantum {
                bytes_per_quantum: 200_000_000,
                quantum: DEFAULT_QUANTUM,
            }
        );
    }

    #[test]
    fn test_budget_quantum_never_zero() {
        for bytes_per_second in [1, 3, 999_999_999, 1_000_000_000, u64::MAX] {
            for quantum in [Duration::ZERO, Duration::from_nanos(1), DEFAULT_QUANTUM] {
                let budget = LimiterConfig::new(bytes_per_second, quantum).budget();
                assert!(budget.quantum().unwrap() > Duration::ZERO);
                assert!(budget.bytes_per_quantum() >= 1);
            }
        }
    }

    #[test]
    fn test_budget_zero_rate_is_blocked() {
        let budget = LimiterConfig::per_second(0).budget();
        assert!(budget.is_blocked());
        assert_eq!(budget.bytes_per_quantum(), 0);
        assert_eq!(budget.quantum(), None);
    }

    #[test]
    fn test_budget_saturates() {
        let config = LimiterConfig::new(u64::MAX, Duration::from_secs(u64::MAX));
        assert_eq!(config.budget().bytes_per_quantum(), usize::MAX);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_limiter_config_validation() {
        assert!(LimiterConfig::default().validate().is_ok());
        assert!(LimiterConfig::per_second(0).validate().is_ok());
        assert!(LimiterConfig::per_second(1).validate().is_ok());
    }

    #[test]
    fn test_limiter_config_builders() {
        let config = LimiterConfig::per_second(500).with_quantum(Duration::from_millis(20));
        assert_eq!(config.bytes_per_second, 500);
        assert_eq!(config.quantum, Duration::from_millis(20));
        assert_eq!(config.budget().bytes_per_quantum(), 10);
    }

    #[test]
    fn test_monitor_config_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.period, DEFAULT_PERIOD);
        assert_eq!(config.capacity, DEFAULT_SAMPLE_CAPACITY);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_monitor_config_zero_period_uses_default() {
        let config = MonitorConfig::new(Duration::ZERO);
        assert_eq!(config.effective_period(), Duration::from_millis(500));

        let config = config.with_period(Duration::from_millis(20));
        assert_eq!(config.effective_period(), Duration::from_millis(20));
    }

    #[test]
    fn test_monitor_config_zero_capacity() {
        let config = MonitorConfig::default().with_capacity(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroCapacity));
    }
}
