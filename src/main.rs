use anyhow::Context as _;
use clap::Parser;
use restarter::config::{kube_client, Cli, LogFormat, LogLevel};
use restarter::controller::{
    lookup_workload, KubeDeployment, RestartDecider, Scheduler, WorkloadController,
};
use restarter::server::{
    create_metrics, run_health_server, shutdown_channel, wait_for_signal, ReadinessState,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins over `--log-level` when it parses
fn log_filter(level: LogLevel, rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(level.as_filter()))
}

fn init_tracing(level: LogLevel, format: LogFormat) {
    let rust_log = std::env::var("RUST_LOG").ok();
    let builder = tracing_subscriber::fmt().with_env_filter(log_filter(level, rust_log.as_deref()));
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level, cli.log_format);

    let workload_id = cli.workload_id()?;
    let check_config = cli.check_config()?;
    info!(
        namespace = %workload_id.namespace,
        deployment = %workload_id.name,
        threshold = check_config.threshold_percent,
        interval = %humantime::format_duration(check_config.tick_interval),
        restart_after = %humantime::format_duration(check_config.grace_period),
        dry_run = check_config.dry_run,
        "Starting restarter"
    );

    let metrics = create_metrics().context("Failed to create metrics registry")?;
    let readiness = ReadinessState::new();
    let (shutdown, signal) = shutdown_channel();

    // Start metrics and health server in background
    let server_readiness = readiness.clone();
    let server_metrics = metrics.clone();
    let server_signal = shutdown.signal();
    let metrics_port = cli.metrics_port;
    tokio::spawn(async move {
        if let Err(e) =
            run_health_server(metrics_port, server_readiness, server_metrics, server_signal).await
        {
            warn!(error = %e, port = metrics_port, "Metrics server failed");
        }
    });

    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.shutdown();
    });

    let client = match kube_client(cli.kube_config.as_deref()).await {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Failed to create Kubernetes client");
            return Err(e.into());
        }
    };

    let workload: Arc<dyn WorkloadController> =
        Arc::new(KubeDeployment::new(client, workload_id.clone()));
    if let Err(e) = lookup_workload(workload.as_ref()).await {
        error!(error = %e, "Deployment lookup failed");
        return Err(e).with_context(|| format!("deployment {} does not exist", workload_id));
    }

    // Deployment found - ready to run checks
    readiness.set_ready();

    let decider = Arc::new(RestartDecider::new(workload, check_config, metrics));
    Scheduler::new(decider).run(signal).await;

    info!("Restarter stopped");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
