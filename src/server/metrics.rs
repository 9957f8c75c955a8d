//! Prometheus metrics for the restarter
//!
//! Per-deployment observations:
//! - Running and ready pod gauges from the latest evaluation
//! - Check, restart-attempt and cycle-outcome counters
//! - Ticks skipped because a cycle was still in flight

use crate::config::WorkloadId;
use prometheus::{self, Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Restarter metrics registry
///
/// Thread-safe container for all Prometheus metrics.
/// Clone is cheap (Arc internally).
#[derive(Clone)]
pub struct RestarterMetrics {
    registry: Registry,
    /// Running pods seen by the latest evaluation
    pub running_pods: IntGaugeVec,
    /// Ready pods seen by the latest evaluation
    pub ready_pods: IntGaugeVec,
    /// Health checks started
    pub checks_total: IntCounterVec,
    /// Restart attempts (cycles that entered the grace period)
    pub restarts_total: IntCounterVec,
    /// Finished cycles by outcome
    pub cycles_total: IntCounterVec,
    /// Ticks dropped because a cycle was already running
    pub skipped_ticks_total: IntCounterVec,
}

impl RestarterMetrics {
    /// Create a new metrics registry with all restarter metrics
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let running_pods = IntGaugeVec::new(
            Opts::new(
                "restarter_running_pods",
                "Number of pods of the deployment in the Running phase",
            ),
            &["namespace", "deployment"],
        )?;
        registry.register(Box::new(running_pods.clone()))?;

        let ready_pods = IntGaugeVec::new(
            Opts::new(
                "restarter_ready_pods",
                "Number of running pods of the deployment reporting Ready",
            ),
            &["namespace", "deployment"],
        )?;
        registry.register(Box::new(ready_pods.clone()))?;

        let checks_total = IntCounterVec::new(
            Opts::new("restarter_checks_total", "Total number of health checks"),
            &["namespace", "deployment"],
        )?;
        registry.register(Box::new(checks_total.clone()))?;

        let restarts_total = IntCounterVec::new(
            Opts::new(
                "restarter_restarts_total",
                "Total number of restart attempts (checks below the ready threshold)",
            ),
            &["namespace", "deployment"],
        )?;
        registry.register(Box::new(restarts_total.clone()))?;

        let cycles_total = IntCounterVec::new(
            Opts::new(
                "restarter_cycles_total",
                "Total number of completed check cycles by outcome",
            ),
            &["namespace", "deployment", "outcome"],
        )?;
        registry.register(Box::new(cycles_total.clone()))?;

        let skipped_ticks_total = IntCounterVec::new(
            Opts::new(
                "restarter_skipped_ticks_total",
                "Total number of ticks skipped because a check was still running",
            ),
            &["namespace", "deployment"],
        )?;
        registry.register(Box::new(skipped_ticks_total.clone()))?;

        Ok(Self {
            registry,
            running_pods,
            ready_pods,
            checks_total,
            restarts_total,
            cycles_total,
            skipped_ticks_total,
        })
    }

    /// Publish the pod counts of the latest evaluation
    pub fn set_pod_counts(&self, workload: &WorkloadId, running: u32, ready: u32) {
        let labels = [workload.namespace.as_str(), workload.name.as_str()];
        self.running_pods
            .with_label_values(&labels)
            .set(i64::from(running));
        self.ready_pods.with_label_values(&labels).set(i64::from(ready));
    }

    /// Record that a health check started
    pub fn record_check(&self, workload: &WorkloadId) {
        self.checks_total
            .with_label_values(&[workload.namespace.as_str(), workload.name.as_str()])
            .inc();
    }

    /// Record a restart attempt
    pub fn record_restart_attempt(&self, workload: &WorkloadId) {
        self.restarts_total
            .with_label_values(&[workload.namespace.as_str(), workload.name.as_str()])
            .inc();
    }

    /// Record how a cycle ended
    pub fn record_cycle(&self, workload: &WorkloadId, outcome: &str) {
        self.cycles_total
            .with_label_values(&[workload.namespace.as_str(), workload.name.as_str(), outcome])
            .inc();
    }

    /// Record a tick dropped while a cycle was in flight
    pub fn record_skipped_tick(&self, workload: &WorkloadId) {
        self.skipped_ticks_total
            .with_label_values(&[workload.namespace.as_str(), workload.name.as_str()])
            .inc();
    }

    /// Encode all metrics to Prometheus text format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| {
            prometheus::Error::Msg(format!("Failed to encode metrics as UTF-8: {}", e))
        })
    }
}

/// Shared metrics handle for use across the restarter
pub type SharedMetrics = Arc<RestarterMetrics>;

/// Create a new shared metrics instance
pub fn create_metrics() -> Result<SharedMetrics, prometheus::Error> {
    Ok(Arc::new(RestarterMetrics::new()?))
}
