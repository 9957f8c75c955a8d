//! Access to the watched Deployment
//!
//! `WorkloadController` is the seam between the decision loop and the
//! Kubernetes API. `KubeDeployment` is the production implementation.

use super::readiness::ReadinessSample;
use crate::config::WorkloadId;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::Client;
use thiserror::Error;
use tracing::info;

/// Pod template annotation `kubectl rollout restart` uses to roll pods
pub const RESTARTED_AT_ANNOTATION: &str = "kubectl.kubernetes.io/restartedAt";

#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error("deployment {namespace}/{name} not found")]
    NotFound { namespace: String, name: String },

    #[error("failed to read deployment state: {0}")]
    Read(String),

    #[error("failed to restart deployment: {0}")]
    Write(String),
}

/// Operations the decision loop needs on its workload
///
/// Implementations hold the workload identity; every call targets that one
/// deployment.
#[async_trait]
pub trait WorkloadController: Send + Sync {
    /// The watched deployment
    fn id(&self) -> &WorkloadId;

    /// Fetch the deployment
    ///
    /// # Errors
    /// `NotFound` when the deployment does not exist, `Read` otherwise.
    async fn get(&self) -> Result<Deployment, WorkloadError>;

    /// Count running and ready pods selected by the deployment
    async fn readiness(&self) -> Result<ReadinessSample, WorkloadError>;

    /// Trigger a rolling restart
    ///
    /// Safe to call repeatedly: each call just moves the restart timestamp.
    async fn restart(&self) -> Result<(), WorkloadError>;
}

/// `WorkloadController` backed by an `apps/v1` Deployment
pub struct KubeDeployment {
    id: WorkloadId,
    deployments: Api<Deployment>,
    pods: Api<Pod>,
}

impl KubeDeployment {
    pub fn new(client: Client, id: WorkloadId) -> Self {
        let deployments = Api::namespaced(client.clone(), &id.namespace);
        let pods = Api::namespaced(client, &id.namespace);
        Self {
            id,
            deployments,
            pods,
        }
    }
}

#[async_trait]
impl WorkloadController for KubeDeployment {
    fn id(&self) -> &WorkloadId {
        &self.id
    }

    async fn get(&self) -> Result<Deployment, WorkloadError> {
        match self.deployments.get(&self.id.name).await {
            Ok(deployment) => Ok(deployment),
            Err(kube::Error::Api(err)) if err.code == 404 => Err(WorkloadError::NotFound {
                namespace: self.id.namespace.clone(),
                name: self.id.name.clone(),
            }),
            Err(e) => Err(WorkloadError::Read(e.to_string())),
        }
    }

    async fn readiness(&self) -> Result<ReadinessSample, WorkloadError> {
        let deployment = self.get().await?;

        let selector = deployment
            .spec
            .as_ref()
            .map(|spec| format_label_selector(&spec.selector))
            .filter(|s| !s.is_empty())
            .ok_or_else(|| missing_selector(&self.id))?;

        let pods = self
            .pods
            .list(&ListParams::default().labels(&selector))
            .await
            .map_err(|e| WorkloadError::Read(format!("list pods for deployment: {}", e)))?;

        Ok(ReadinessSample::from_pods(&pods.items))
    }

    async fn restart(&self) -> Result<(), WorkloadError> {
        let restarted_at = Utc::now();
        let patch = restart_patch(restarted_at);

        self.deployments
            .patch(&self.id.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| WorkloadError::Write(e.to_string()))?;

        info!(
            namespace = %self.id.namespace,
            deployment = %self.id.name,
            restarted_at = %format_restarted_at(restarted_at),
            "Patched restart annotation"
        );
        Ok(())
    }
}

/// Look up the deployment at startup
///
/// The caller treats any error as fatal.
pub async fn lookup_workload(workload: &dyn WorkloadController) -> Result<Deployment, WorkloadError> {
    let deployment = workload.get().await?;
    let replicas = deployment.spec.as_ref().and_then(|s| s.replicas);
    info!(
        namespace = %workload.id().namespace,
        deployment = %workload.id().name,
        replicas = ?replicas,
        "Found deployment"
    );
    Ok(deployment)
}

/// Render a `LabelSelector` in the `key=value,...` list-option syntax
///
/// `matchLabels` come first (sorted by key), then `matchExpressions` in
/// declaration order. Unknown operators are skipped.
pub fn format_label_selector(selector: &LabelSelector) -> String {
    let mut parts: Vec<String> = selector
        .match_labels
        .iter()
        .flatten()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();

    for expr in selector.match_expressions.iter().flatten() {
        let values = expr.values.as_deref().unwrap_or_default().join(",");
        match expr.operator.as_str() {
            "In" => parts.push(format!("{} in ({})", expr.key, values)),
            "NotIn" => parts.push(format!("{} notin ({})", expr.key, values)),
            "Exists" => parts.push(expr.key.clone()),
            "DoesNotExist" => parts.push(format!("!{}", expr.key)),
            _ => {}
        }
    }

    parts.join(",")
}

fn missing_selector(id: &WorkloadId) -> WorkloadError {
    WorkloadError::Read(format!("deployment {} has no pod selector", id))
}

/// RFC 3339 timestamp, second precision, `Z` suffix
pub fn format_restarted_at(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Merge patch setting the restart annotation on the pod template
pub fn restart_patch(at: DateTime<Utc>) -> serde_json::Value {
    let mut annotations = serde_json::Map::new();
    annotations.insert(
        RESTARTED_AT_ANNOTATION.to_string(),
        serde_json::Value::String(format_restarted_at(at)),
    );

    serde_json::json!({
        "spec": {
            "template": {
                "metadata": {
                    "annotations": annotations
                }
            }
        }
    })
}

#[cfg(test)]
#[path = "workload_test.rs"]
mod tests;
