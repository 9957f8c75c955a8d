//! HTTP server and process lifecycle
//!
//! Provides:
//! - `/healthz` - Liveness probe (process is running)
//! - `/readyz` - Readiness probe (deployment lookup succeeded)
//! - `/metrics` - Prometheus metrics
//!
//! Also provides graceful shutdown handling for SIGTERM/SIGINT.

mod health;
pub mod metrics;
pub mod shutdown;

pub use health::{router, run_health_server, ReadinessState};
pub use metrics::{create_metrics, RestarterMetrics, SharedMetrics};
pub use shutdown::{shutdown_channel, wait_for_signal, ShutdownController, ShutdownSignal};

#[cfg(test)]
#[path = "health_test.rs"]
mod health_tests;

#[cfg(test)]
#[path = "metrics_test.rs"]
mod metrics_tests;

#[cfg(test)]
#[path = "shutdown_test.rs"]
mod shutdown_tests;
