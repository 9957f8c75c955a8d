//! Restart decision for one check cycle
//!
//! ```text
//! Evaluating --healthy--------------------------------> done (Healthy)
//!     | below threshold
//!     v
//! WaitingGrace --dry run-----------------------------> done (DryRun)
//!     |
//!     v
//! ReEvaluating --healthy again------------------------> done (Recovered)
//!     | still below threshold
//!     v
//! Restarting -----------------------------------------> done (Restarted | RestartFailed)
//! ```
//!
//! The threshold is inclusive on the healthy side for both evaluations. A read
//! failure or a sample without running pods ends the cycle without restarting.

use super::guard::{CyclePermit, CycleState};
use super::readiness::{HealthEvaluator, ReadinessSample};
use super::workload::{WorkloadController, WorkloadError};
use crate::config::{CheckConfig, WorkloadId};
use crate::server::SharedMetrics;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};

/// How a check cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Ready percentage at or above the threshold
    Healthy,
    /// No running pods, nothing to judge
    NoRunningPods,
    /// Below threshold at first, healthy after the grace period
    Recovered,
    /// Below threshold, restart skipped because of dry run
    DryRun,
    /// Restart annotation written
    Restarted,
    /// Reading the deployment or its pods failed
    EvaluationFailed,
    /// Writing the restart annotation failed
    RestartFailed,
}

impl CycleOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleOutcome::Healthy => "healthy",
            CycleOutcome::NoRunningPods => "no_running_pods",
            CycleOutcome::Recovered => "recovered",
            CycleOutcome::DryRun => "dry_run",
            CycleOutcome::Restarted => "restarted",
            CycleOutcome::EvaluationFailed => "evaluation_failed",
            CycleOutcome::RestartFailed => "restart_failed",
        }
    }
}

/// Result of one evaluation, before the cycle decides what to do with it
enum Verdict {
    Healthy(f64),
    Unhealthy(f64),
    NoRunningPods,
}

pub struct RestartDecider {
    workload: Arc<dyn WorkloadController>,
    evaluator: HealthEvaluator,
    config: CheckConfig,
    metrics: SharedMetrics,
}

impl RestartDecider {
    pub fn new(
        workload: Arc<dyn WorkloadController>,
        config: CheckConfig,
        metrics: SharedMetrics,
    ) -> Self {
        let evaluator = HealthEvaluator::new(Arc::clone(&workload), metrics.clone());
        Self {
            workload,
            evaluator,
            config,
            metrics,
        }
    }

    pub fn workload_id(&self) -> &WorkloadId {
        self.workload.id()
    }

    pub fn config(&self) -> &CheckConfig {
        &self.config
    }

    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }

    /// Run one cycle while holding `permit`
    ///
    /// The permit is released when this returns.
    pub async fn run_cycle(&self, permit: CyclePermit) -> CycleOutcome {
        let id = self.workload_id();
        let span = info_span!("check", namespace = %id.namespace, deployment = %id.name);

        let outcome = self.decide(&permit).instrument(span.clone()).await;

        self.metrics.record_cycle(id, outcome.as_str());
        span.in_scope(|| info!(outcome = outcome.as_str(), "Check cycle finished"));
        outcome
    }

    async fn decide(&self, permit: &CyclePermit) -> CycleOutcome {
        permit.enter(CycleState::Evaluating);
        self.metrics.record_check(self.workload_id());

        let percentage = match self.evaluate().await {
            Ok(Verdict::Healthy(percentage)) => {
                info!(ready = %format_percentage(percentage), "Deployment is healthy");
                return CycleOutcome::Healthy;
            }
            Ok(Verdict::Unhealthy(percentage)) => percentage,
            Ok(Verdict::NoRunningPods) => {
                warn!("Deployment has no running pods, skipping check");
                return CycleOutcome::NoRunningPods;
            }
            Err(e) => {
                error!(error = %e, "Could not get ready status of deployment");
                return CycleOutcome::EvaluationFailed;
            }
        };

        permit.enter(CycleState::WaitingGrace);
        self.metrics.record_restart_attempt(self.workload_id());
        info!(
            ready = %format_percentage(percentage),
            threshold = self.config.threshold_percent,
            duration = %humantime::format_duration(self.config.grace_period),
            "Deployment ready status is less than threshold, waiting"
        );

        tokio::time::sleep(self.config.grace_period).await;

        if self.config.dry_run {
            info!("Deployment ready status is less than threshold but dry run is on, doing nothing");
            return CycleOutcome::DryRun;
        }

        permit.enter(CycleState::ReEvaluating);
        match self.evaluate().await {
            Ok(Verdict::Healthy(percentage)) => {
                info!(
                    ready = %format_percentage(percentage),
                    "Deployment is healthy again, skipping restart"
                );
                return CycleOutcome::Recovered;
            }
            Ok(Verdict::Unhealthy(percentage)) => {
                info!(
                    ready = %format_percentage(percentage),
                    "Deployment is still below threshold, restarting"
                );
            }
            Ok(Verdict::NoRunningPods) => {
                warn!("Deployment has no running pods after grace period, skipping restart");
                return CycleOutcome::NoRunningPods;
            }
            Err(e) => {
                error!(error = %e, "Could not get ready status of deployment");
                return CycleOutcome::EvaluationFailed;
            }
        }

        permit.enter(CycleState::Restarting);
        match self.workload.restart().await {
            Ok(()) => {
                info!("Deployment restarted");
                CycleOutcome::Restarted
            }
            Err(e) => {
                // Not retried here; the next tick starts over
                error!(error = %e, "Failed to restart deployment");
                CycleOutcome::RestartFailed
            }
        }
    }

    async fn evaluate(&self) -> Result<Verdict, WorkloadError> {
        let sample: ReadinessSample = self.evaluator.evaluate().await?;
        let verdict = match sample.percentage() {
            None => Verdict::NoRunningPods,
            Some(p) if p >= self.config.threshold_percent => Verdict::Healthy(p),
            Some(p) => Verdict::Unhealthy(p),
        };
        info!(
            running = sample.total_running,
            ready = sample.total_ready,
            "Got deployment ready status"
        );
        Ok(verdict)
    }
}

fn format_percentage(percentage: f64) -> String {
    format!("{:.2}%", percentage)
}

#[cfg(test)]
#[path = "decider_test.rs"]
mod tests;
