//! # Rate Module
//!
//! Internal implementation of the limiter and the monitor.
//!
//! ## Module Structure
//!
//! ```text
//!     rate/
//!     ├── mod.rs          (You are here - Module organization)
//!     ├── config.rs       (Limiter and monitor settings, budget derivation)
//!     ├── core.rs         (Quantum token bucket and the Transfer adapters)
//!     ├── monitor.rs      (Background throughput sampler)
//!     ├── stream.rs       (Read/Write decorators)
//!     ├── metrics.rs      (Limiter activity snapshots)
//!     ├── error.rs        (Config and closed-stream errors)
//!     └── utils.rs        (Sleeping helpers, cache alignment)
//! ```
//!
//! ## Architecture Flow
//!
//! ```text
//!     read()/write()
//!          │
//!          ▼
//!     ┌─────────┐
//!     │ Stream  │ ◄── LimitReader/Writer, MonitorReader/Writer
//!     └────┬────┘
//!          │
//!     ┌────┴─────────────┐
//!     ▼                  ▼
//!  ┌─────────┐      ┌─────────┐
//!  │  Core   │      │ Monitor │ ◄── add(n) + sampling thread
//!  └────┬────┘      └────┬────┘
//!       │                │
//!       ▼                ▼
//!     ┌──────────────────────┐
//!     │        Config        │ ◄── Budget, periods, validation
//!     └──────────────────────┘
//! ```
//!
//! The limiter and the monitor never call each other; the decorators compose them.

mod config;
mod core;
mod error;
mod metrics;
mod monitor;
mod stream;
mod utils;

/// Configuration types and defaults
pub use config::{
    Budget, LimiterConfig, MonitorConfig, DEFAULT_PERIOD, DEFAULT_QUANTUM,
    DEFAULT_SAMPLE_CAPACITY,
};

/// Error types and the closed-stream check
pub use error::{is_closed, ConfigError, StreamError};

/// Limiter activity snapshots
pub use metrics::LimiterMetrics;

/// Throughput monitor
pub use monitor::{Monitor, RateSample};

/// Stream decorators
pub use stream::{LimitReader, LimitWriter, MonitorReader, MonitorWriter};
