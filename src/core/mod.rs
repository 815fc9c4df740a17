//! Core relay logic.
//!
//! This module contains:
//! - Relay: One fetch → forward → acknowledge cycle
//! - Scheduler: Timer loop driving cycles, with pluggable pacing

pub mod relay;
pub mod scheduler;

// Re-export commonly used types
pub use relay::{CycleOutcome, Relay, RelayError};
pub use scheduler::{Backoff, FixedInterval, Pacing, Scheduler, SchedulerStats, DEFAULT_INTERVAL};
