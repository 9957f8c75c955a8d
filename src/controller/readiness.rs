//! Pod readiness evaluation
//!
//! A pod counts as running when its phase is `Running`. A running pod counts
//! as ready when it carries a `Ready` condition with status `True`.

use super::workload::{WorkloadController, WorkloadError};
use crate::server::SharedMetrics;
use k8s_openapi::api::core::v1::Pod;
use std::sync::Arc;
use tracing::debug;

const PHASE_RUNNING: &str = "Running";
const CONDITION_READY: &str = "Ready";
const CONDITION_TRUE: &str = "True";

/// Running/ready pod counts for one observation of a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadinessSample {
    pub total_running: u32,
    pub total_ready: u32,
}

impl ReadinessSample {
    /// `total_ready` is capped at `total_running`
    pub fn new(total_running: u32, total_ready: u32) -> Self {
        Self {
            total_running,
            total_ready: total_ready.min(total_running),
        }
    }

    /// Fold a pod listing into a sample
    pub fn from_pods(pods: &[Pod]) -> Self {
        let mut sample = Self::default();
        for pod in pods.iter().filter(|p| is_running(p)) {
            sample.total_running += 1;
            if is_ready(pod) {
                sample.total_ready += 1;
            }
        }
        sample
    }

    /// Ready pods as a percentage of running pods
    ///
    /// `None` when no pod is running: there is nothing to measure.
    pub fn percentage(&self) -> Option<f64> {
        if self.total_running == 0 {
            return None;
        }
        // Scale before dividing so whole percentages come out exact
        Some(f64::from(self.total_ready) * 100.0 / f64::from(self.total_running))
    }
}

fn is_running(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .is_some_and(|phase| phase == PHASE_RUNNING)
}

fn is_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == CONDITION_READY && c.status == CONDITION_TRUE)
        })
}

/// Reads a readiness sample from the workload and publishes the pod gauges
pub struct HealthEvaluator {
    workload: Arc<dyn WorkloadController>,
    metrics: SharedMetrics,
}

impl HealthEvaluator {
    pub fn new(workload: Arc<dyn WorkloadController>, metrics: SharedMetrics) -> Self {
        Self { workload, metrics }
    }

    pub async fn evaluate(&self) -> Result<ReadinessSample, WorkloadError> {
        let sample = self.workload.readiness().await?;

        self.metrics
            .set_pod_counts(self.workload.id(), sample.total_running, sample.total_ready);
        debug!(
            running = sample.total_running,
            ready = sample.total_ready,
            "Evaluated pod readiness"
        );

        Ok(sample)
    }
}

#[cfg(test)]
#[path = "readiness_test.rs"]
mod tests;
