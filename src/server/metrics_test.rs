//! Tests for restarter metrics

use super::metrics::{create_metrics, RestarterMetrics};
use crate::config::WorkloadId;

fn workload() -> WorkloadId {
    WorkloadId::new("default", "web")
}

#[test]
fn test_metrics_creation() {
    let metrics = RestarterMetrics::new().expect("should create metrics");
    let workload = workload();

    // Prometheus only outputs vectors that have at least one child
    metrics.set_pod_counts(&workload, 4, 3);
    metrics.record_check(&workload);
    metrics.record_restart_attempt(&workload);
    metrics.record_cycle(&workload, "healthy");
    metrics.record_skipped_tick(&workload);

    let output = metrics.encode().expect("should encode metrics");
    assert!(output.contains("restarter_running_pods"));
    assert!(output.contains("restarter_ready_pods"));
    assert!(output.contains("restarter_checks_total"));
    assert!(output.contains("restarter_restarts_total"));
    assert!(output.contains("restarter_cycles_total"));
    assert!(output.contains("restarter_skipped_ticks_total"));
}

#[test]
fn test_set_pod_counts_overwrites_previous_values() {
    let metrics = RestarterMetrics::new().expect("should create metrics");
    let workload = workload();

    metrics.set_pod_counts(&workload, 10, 2);
    metrics.set_pod_counts(&workload, 10, 9);

    let output = metrics.encode().expect("should encode metrics");
    assert!(output.contains("restarter_running_pods{deployment=\"web\",namespace=\"default\"} 10"));
    assert!(output.contains("restarter_ready_pods{deployment=\"web\",namespace=\"default\"} 9"));
}

#[test]
fn test_counters_are_labelled_per_deployment() {
    let metrics = RestarterMetrics::new().expect("should create metrics");
    let web = workload();
    let worker = WorkloadId::new("jobs", "worker");

    metrics.record_check(&web);
    metrics.record_check(&web);
    metrics.record_check(&worker);
    metrics.record_restart_attempt(&worker);

    let output = metrics.encode().expect("should encode metrics");
    assert!(output.contains("restarter_checks_total{deployment=\"web\",namespace=\"default\"} 2"));
    assert!(output.contains("restarter_checks_total{deployment=\"worker\",namespace=\"jobs\"} 1"));
    assert!(
        output.contains("restarter_restarts_total{deployment=\"worker\",namespace=\"jobs\"} 1")
    );
}

#[test]
fn test_record_cycle_by_outcome() {
    let metrics = RestarterMetrics::new().expect("should create metrics");
    let workload = workload();

    metrics.record_cycle(&workload, "restarted");
    metrics.record_cycle(&workload, "recovered");
    metrics.record_cycle(&workload, "recovered");

    let output = metrics.encode().expect("should encode metrics");
    assert!(output.contains(
        "restarter_cycles_total{deployment=\"web\",namespace=\"default\",outcome=\"recovered\"} 2"
    ));
    assert!(output.contains(
        "restarter_cycles_total{deployment=\"web\",namespace=\"default\",outcome=\"restarted\"} 1"
    ));
}

#[test]
fn test_create_shared_metrics() {
    let metrics = create_metrics().expect("should create shared metrics");

    // Verify Arc sharing works
    let metrics2 = metrics.clone();
    metrics.record_skipped_tick(&workload());

    let output = metrics2.encode().expect("should encode from clone");
    assert!(output
        .contains("restarter_skipped_ticks_total{deployment=\"web\",namespace=\"default\"} 1"));
}
