//! Fixed-cadence driver for relay cycles.
//!
//! One cycle runs to completion, then the scheduler sleeps for whatever the
//! pacing strategy asks for, then runs the next one. Cycles never overlap.
//! A failed or panicked cycle is logged and the loop carries on.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info};

use super::relay::{CycleOutcome, Relay, RelayError};
use crate::adapters::Delivery;
use crate::store::OrderStore;

/// Default pause between cycles
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// Decides how long to wait before the next cycle
pub trait Pacing: Send {
    fn next_delay(&mut self, cycle_ok: bool) -> Duration;
}

impl<P: Pacing + ?Sized> Pacing for Box<P> {
    fn next_delay(&mut self, cycle_ok: bool) -> Duration {
        (**self).next_delay(cycle_ok)
    }
}

/// Same pause after every cycle
#[derive(Debug, Clone, Copy)]
pub struct FixedInterval(pub Duration);

impl Default for FixedInterval {
    fn default() -> Self {
        Self(DEFAULT_INTERVAL)
    }
}

impl Pacing for FixedInterval {
    fn next_delay(&mut self, _cycle_ok: bool) -> Duration {
        self.0
    }
}

/// Interval that grows after consecutive failed cycles and resets on success
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    multiplier: f64,
    consecutive_failures: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration, multiplier: f64) -> Self {
        Self {
            base,
            max: max.max(base),
            multiplier: multiplier.max(1.0),
            consecutive_failures: 0,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}

impl Pacing for Backoff {
    fn next_delay(&mut self, cycle_ok: bool) -> Duration {
        if cycle_ok {
            self.consecutive_failures = 0;
            return self.base;
        }

        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let exponent = self.consecutive_failures.min(i32::MAX as u32) as i32;
        let delay = self.base.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = delay.min(self.max.as_millis() as f64) as u64;
        Duration::from_millis(capped)
    }
}

/// Counters kept across cycles
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub cycles: u64,
    pub failed_cycles: u64,
    pub acknowledged: u64,
}

/// Drives a relay on a timer until shutdown
pub struct Scheduler<S, D, P = FixedInterval> {
    relay: Arc<Relay<S, D>>,
    pacing: P,
    stats: SchedulerStats,
}

impl<S, D> Scheduler<S, D, FixedInterval>
where
    S: OrderStore + 'static,
    D: Delivery + 'static,
{
    pub fn new(relay: Relay<S, D>, interval: Duration) -> Self {
        Self {
            relay: Arc::new(relay),
            pacing: FixedInterval(interval),
            stats: SchedulerStats::default(),
        }
    }
}

impl<S, D, P> Scheduler<S, D, P>
where
    S: OrderStore + 'static,
    D: Delivery + 'static,
    P: Pacing,
{
    /// Swap the pacing strategy
    pub fn with_pacing<Q: Pacing>(self, pacing: Q) -> Scheduler<S, D, Q> {
        Scheduler {
            relay: self.relay,
            pacing,
            stats: self.stats,
        }
    }

    pub fn relay(&self) -> &Relay<S, D> {
        &self.relay
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// Run a single cycle without catching panics (CLI `--once`)
    pub async fn run_once(&self) -> Result<CycleOutcome, RelayError> {
        self.relay.run_cycle().await
    }

    /// Run one cycle on its own task, log the result, return the next delay
    pub async fn tick(&mut self) -> Duration {
        let joined = self.spawn_cycle().await;
        self.record(joined)
    }

    fn spawn_cycle(&self) -> JoinHandle<Result<CycleOutcome, RelayError>> {
        let relay = Arc::clone(&self.relay);
        tokio::spawn(async move { relay.run_cycle().await })
    }

    fn record(&mut self, joined: Result<Result<CycleOutcome, RelayError>, JoinError>) -> Duration {
        self.stats.cycles += 1;

        let cycle_ok = match joined {
            Ok(Ok(outcome)) => {
                match &outcome {
                    CycleOutcome::Idle => debug!("Relay cycle idle"),
                    CycleOutcome::Delivered {
                        forwarded,
                        acknowledged,
                    } => {
                        self.stats.acknowledged += acknowledged.len() as u64;
                        info!(
                            forwarded,
                            acknowledged = acknowledged.len(),
                            "Relay cycle complete"
                        );
                    }
                }
                true
            }
            Ok(Err(e)) => {
                self.stats.failed_cycles += 1;
                error!(kind = e.kind(), error = %e, "Relay cycle failed; orders stay pending");
                false
            }
            Err(e) => {
                self.stats.failed_cycles += 1;
                error!(error = %e, "Relay cycle aborted; orders stay pending");
                false
            }
        };

        self.pacing.next_delay(cycle_ok)
    }

    /// Cycle, sleep, repeat until `shutdown` resolves. An in-flight cycle is
    /// cancelled and has stopped by the time this returns.
    pub async fn run_until<F>(mut self, shutdown: F) -> SchedulerStats
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!("Relay scheduler started");

        loop {
            let mut cycle = self.spawn_cycle();
            let joined = tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, cancelling in-flight relay cycle");
                    cycle.abort();
                    // Wait for the task to observe the cancellation
                    let _ = cycle.await;
                    break;
                }
                joined = &mut cycle => joined,
            };

            let delay = self.record(joined);
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping relay scheduler");
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.stats
    }
}
