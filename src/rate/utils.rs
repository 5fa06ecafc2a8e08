//! # Utility Functions (utils.rs)
//!
//! Small helpers shared by the limiter and the monitor: sleeping until a
//! deadline, blocking forever, and keeping the monitor's hot counter on its
//! own cache line.

use std::thread;
use std::time::{Duration, Instant};

// Architecture-specific cache line sizes

/// Cache line size for x86_64 processors.
#[cfg(target_arch = "x86_64")]
pub(crate) const CACHE_LINE_SIZE: usize = 64;

/// Cache line size for ARM64 processors.
#[cfg(target_arch = "aarch64")]
pub(crate) const CACHE_LINE_SIZE: usize = 128;

/// Default cache line size for other architectures.
#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
pub(crate) const CACHE_LINE_SIZE: usize = 64;

/// Sleeps until `deadline`, returning how long the thread slept.
///
/// Returns immediately (and `Duration::ZERO`) if the deadline already passed.
pub(crate) fn sleep_until(deadline: Instant) -> Duration {
    let now = Instant::now();
    match deadline.checked_duration_since(now) {
        Some(wait) if !wait.is_zero() => {
            thread::sleep(wait);
            wait
        }
        _ => Duration::ZERO,
    }
}

/// Parks the calling thread for good.
///
/// `thread::park` may return spuriously, hence the loop.
pub(crate) fn block_forever() -> ! {
    loop {
        thread::park();
    }
}

/// Cache-aligned wrapper for values to prevent false sharing.
///
/// The monitor's pending counter is bumped by every caller of `add` while the
/// sampling thread touches the rest of the shared state; keeping the counter on
/// its own line stops those writes from invalidating each other.
///
/// ```text
///     ┌─────────────────────────┐
///     │   pending (AtomicU64)   │ ← own cache line, hammered by add()
///     └─────────────────────────┘
///     ┌─────────────────────────┐
///     │  stopped (AtomicBool)   │ ← read by the sampling thread
///     └─────────────────────────┘
/// ```
#[cfg(target_arch = "x86_64")]
#[repr(C, align(64))]
pub(crate) struct CacheAligned<T>(T);
#[cfg(target_arch = "aarch64")]
#[repr(C, align(128))]
pub(crate) struct CacheAligned<T>(T);
#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
#[repr(C, align(64))]
pub(crate) struct CacheAligned<T>(T);

const _: () = assert!(std::mem::align_of::<CacheAligned<u64>>() == CACHE_LINE_SIZE);

impl<T> CacheAligned<T> {
    /// Creates a new cache-aligned value.
    #[inline(always)]
    pub(crate) const fn new(value: T) -> Self {
        Self(value)
    }

    /// Gets a reference to the inner value.
    #[inline(always)]
    pub(crate) fn get(&self) -> &T {
        &self.0
    }
}

impl<T: Default> Default for CacheAligned<T> {
    fn default() -> Self {
        Self(T::default())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for CacheAligned<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn test_cache_line_size() {
        assert!(CACHE_LINE_SIZE >= 64);
        assert!(CACHE_LINE_SIZE.is_power_of_two());
    }

    #[test]
    fn test_cache_aligned() {
        let aligned = CacheAligned::new(AtomicU64::new(42));
        assert_eq!(aligned.get().load(Ordering::Relaxed), 42);
        assert_eq!(std::mem::align_of::<CacheAligned<AtomicU64>>(), CACHE_LINE_SIZE);
    }

    #[test]
    fn test_cache_aligned_default_and_debug() {
        let aligned: CacheAligned<u64> = CacheAligned::default();
        assert_eq!(*aligned.get(), 0);
        assert_eq!(format!("{:?}", aligned), "0");
    }

    #[test]
    fn test_sleep_until_past_deadline() {
        let start = Instant::now();
        let slept = sleep_until(start - Duration::from_millis(5));

        assert_eq!(slept, Duration::ZERO);
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_sleep_until_future_deadline() {
        let start = Instant::now();
        let slept = sleep_until(start + Duration::from_millis(20));

        assert!(slept > Duration::ZERO);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_block_forever_never_returns() {
        let (tx, rx) = std::sync::mpsc::channel::<()>();
        std::thread::spawn(move || {
            let _tx = tx;
            block_forever();
        });

        // The sender is only dropped if block_forever returns.
        assert_eq!(
            rx.recv_timeout(Duration::from_millis(50)),
            Err(std::sync::mpsc::RecvTimeoutError::Timeout)
        );
    }
}
