//! Periodic check scheduling
//!
//! Each tick starts a check cycle unless one is still running. Skipped ticks
//! are dropped, never queued.

use super::decider::{CycleOutcome, RestartDecider};
use super::guard::CycleGuard;
use crate::server::ShutdownSignal;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

pub struct Scheduler {
    decider: Arc<RestartDecider>,
    guard: CycleGuard,
}

impl Scheduler {
    pub fn new(decider: Arc<RestartDecider>) -> Self {
        Self {
            decider,
            guard: CycleGuard::new(),
        }
    }

    /// Guard shared with the cycles this scheduler starts
    pub fn guard(&self) -> &CycleGuard {
        &self.guard
    }

    /// Tick until `shutdown` fires
    ///
    /// The first check runs one interval after start. A cycle still in flight
    /// at shutdown is left to finish on its own.
    pub async fn run(&self, mut shutdown: ShutdownSignal) {
        if shutdown.is_shutdown() {
            debug!("Shutdown already requested, not starting health checks");
            return;
        }

        let period = self.decider.config().tick_interval;
        let id = self.decider.workload_id();
        info!(
            namespace = %id.namespace,
            deployment = %id.name,
            interval = %humantime::format_duration(period),
            "Starting health checks"
        );

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => {
                    info!(cycle_in_flight = self.guard.is_held(), "Health checks shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.tick();
                }
            }
        }
    }

    /// Start a cycle if none is running
    ///
    /// Returns the cycle's handle, or `None` when the tick was skipped.
    pub fn tick(&self) -> Option<JoinHandle<CycleOutcome>> {
        let id = self.decider.workload_id();

        let Some(permit) = self.guard.try_acquire() else {
            info!(
                namespace = %id.namespace,
                deployment = %id.name,
                state = ?self.guard.state(),
                "Already checking deployment health, skipping"
            );
            self.decider.metrics().record_skipped_tick(id);
            return None;
        };

        debug!(namespace = %id.namespace, deployment = %id.name, "Starting check cycle");
        let decider = Arc::clone(&self.decider);
        Some(tokio::spawn(async move { decider.run_cycle(permit).await }))
    }
}

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod tests;
