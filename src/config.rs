//! Startup configuration
//!
//! Everything here is resolved once at startup and is read-only afterwards:
//! - CLI flags (with env fallbacks) via clap
//! - The validated `CheckConfig` driving the decision loop
//! - Kubernetes client construction (in-cluster first, then kubeconfig)

use clap::{Parser, ValueEnum};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Default port for the metrics and health server
pub const DEFAULT_METRICS_PORT: u16 = 8766;

/// Startup errors. All of these are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("ready threshold must be between 0 and 100, got {0}")]
    InvalidThreshold(f64),

    #[error("check interval must be greater than zero")]
    ZeroInterval,

    #[error("deployment name must not be empty")]
    EmptyDeployment,

    #[error("could not resolve home directory for kubeconfig path {0}")]
    HomeDirectory(String),

    #[error("failed to load kubeconfig: {0}")]
    Kubeconfig(String),

    #[error("failed to create Kubernetes client: {0}")]
    Client(String),
}

/// Log verbosity accepted by `--log-level`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Info,
    Error,
    Debug,
}

impl LogLevel {
    /// Directive for `tracing_subscriber::EnvFilter`
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Error => "error",
            LogLevel::Debug => "debug",
        }
    }
}

/// Log output format accepted by `--log-format`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Json,
    Text,
}

/// Restart a Kubernetes deployment when it is unhealthy
#[derive(Debug, Parser)]
#[command(name = "restarter")]
#[command(version, about = "Restart a kubernetes deployment when it is unhealthy", long_about = None)]
pub struct Cli {
    /// The path to your kubeconfig file (ignored when running in-cluster)
    ///
    /// Without it, `KUBECONFIG` and then `~/.kube/config` are used.
    #[arg(long = "kube-config", short = 'c')]
    pub kube_config: Option<String>,

    /// The namespace the deployment is in
    #[arg(long, short = 'n', env = "RESTARTER_NAMESPACE", default_value = "default")]
    pub namespace: String,

    /// The name of the deployment
    #[arg(long, short = 'd', env = "RESTARTER_DEPLOYMENT")]
    pub deployment: String,

    /// Restart when the percentage of ready pods drops below this value
    #[arg(long, short = 'k', env = "RESTARTER_RESTART_WHEN", default_value_t = 100.0)]
    pub restart_when: f64,

    /// The interval the ready status is evaluated at
    #[arg(long, short = 'i', env = "RESTARTER_INTERVAL", default_value = "30s", value_parser = humantime::parse_duration)]
    pub interval: Duration,

    /// How long to wait before checking again and restarting
    #[arg(long, env = "RESTARTER_RESTART_AFTER", default_value = "1m", value_parser = humantime::parse_duration)]
    pub restart_after: Duration,

    /// Log the restart decision without restarting the deployment
    #[arg(long, env = "RESTARTER_DRY_RUN")]
    pub dry_run: bool,

    /// The port the metrics server listens on
    #[arg(long, env = "RESTARTER_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// The log level
    #[arg(long, env = "RESTARTER_LOG_LEVEL", value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// The log output format
    #[arg(long, env = "RESTARTER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,
}

impl Cli {
    /// The workload this process watches
    pub fn workload_id(&self) -> Result<WorkloadId, ConfigError> {
        if self.deployment.trim().is_empty() {
            return Err(ConfigError::EmptyDeployment);
        }
        Ok(WorkloadId::new(&self.namespace, &self.deployment))
    }

    /// Validate the decision-loop settings
    pub fn check_config(&self) -> Result<CheckConfig, ConfigError> {
        CheckConfig::new(
            self.restart_when,
            self.interval,
            self.restart_after,
            self.dry_run,
        )
    }
}

/// Namespaced name of the watched deployment
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkloadId {
    pub namespace: String,
    pub name: String,
}

impl WorkloadId {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for WorkloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Settings for the health-check / debounce / restart loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckConfig {
    /// Ready percentage at or above which the deployment is healthy (0-100)
    pub threshold_percent: f64,
    /// Time between scheduled checks
    pub tick_interval: Duration,
    /// Wait between the first unhealthy observation and the re-check
    pub grace_period: Duration,
    /// Log restarts instead of performing them
    pub dry_run: bool,
}

impl CheckConfig {
    pub fn new(
        threshold_percent: f64,
        tick_interval: Duration,
        grace_period: Duration,
        dry_run: bool,
    ) -> Result<Self, ConfigError> {
        if !threshold_percent.is_finite() || !(0.0..=100.0).contains(&threshold_percent) {
            return Err(ConfigError::InvalidThreshold(threshold_percent));
        }
        if tick_interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }

        Ok(Self {
            threshold_percent,
            tick_interval,
            grace_period,
            dry_run,
        })
    }
}

/// Where the kubeconfig is read from outside a cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KubeconfigSource {
    /// An explicit `--kube-config` file
    File(PathBuf),
    /// `KUBECONFIG` (a path list, merged) or the default location
    Environment,
}

impl KubeconfigSource {
    pub fn resolve(flag: Option<&str>, home: Option<&str>) -> Result<Self, ConfigError> {
        match flag {
            Some(path) => Ok(Self::File(expand_home(path, home)?)),
            None => Ok(Self::Environment),
        }
    }

    fn load(&self) -> Result<Kubeconfig, ConfigError> {
        match self {
            Self::File(path) => Kubeconfig::read_from(path)
                .map_err(|e| ConfigError::Kubeconfig(format!("{}: {}", path.display(), e))),
            Self::Environment => {
                Kubeconfig::read().map_err(|e| ConfigError::Kubeconfig(e.to_string()))
            }
        }
    }
}

impl fmt::Display for KubeconfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Environment => f.write_str("KUBECONFIG or ~/.kube/config"),
        }
    }
}

/// Expand a leading `~` or `~/` against `home`
///
/// `~user` forms are left as written.
pub fn expand_home(path: &str, home: Option<&str>) -> Result<PathBuf, ConfigError> {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => return Ok(PathBuf::from(path)),
    };
    let home = home.ok_or_else(|| ConfigError::HomeDirectory(path.to_string()))?;
    Ok(PathBuf::from(format!("{}{}", home, rest)))
}

/// Build a Kubernetes client
///
/// Prefers the in-cluster service account. Outside a cluster the kubeconfig
/// at `kube_config` is used, or kube's default lookup when it is `None`.
pub async fn kube_client(kube_config: Option<&str>) -> Result<Client, ConfigError> {
    let config = match Config::incluster() {
        Ok(config) => {
            info!("Using in-cluster Kubernetes configuration");
            config
        }
        Err(e) => {
            debug!(error = %e, "In-cluster configuration unavailable, falling back to kubeconfig");
            let home = std::env::var("HOME").ok();
            let source = KubeconfigSource::resolve(kube_config, home.as_deref())?;
            let kubeconfig = source.load()?;
            let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| ConfigError::Kubeconfig(e.to_string()))?;
            info!(source = %source, "Using kubeconfig");
            config
        }
    };

    Client::try_from(config).map_err(|e| ConfigError::Client(e.to_string()))
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
