use crate::error::{self, Result};
use crate::wait::{wait_for, Polling};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;
use kube::api::ListParams;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config, ResourceExt};
use log::{debug, info};
use snafu::{OptionExt, ResultExt};
use std::path::Path;

/// Cluster checks needed to follow the operator's deployment. The provided `wait_*` functions poll
/// these checks until they succeed or time out.
#[async_trait]
pub trait DeploymentWaiter: Send + Sync {
    /// The names of all deployments in `namespace` whose name starts with `prefix`. OLM names the
    /// operator deployment after the bundle version, so during an upgrade rollout the old and the
    /// new deployment are both listed.
    async fn deployment_names_by_prefix(&self, namespace: &str, prefix: &str)
        -> Result<Vec<String>>;

    /// `true` once deployment `name` exists and it and `replicas` of its pods are ready.
    async fn is_deployment_ready(&self, namespace: &str, name: &str, replicas: i32)
        -> Result<bool>;

    async fn deployment_exists(&self, namespace: &str, name: &str) -> Result<bool>;

    /// The number of running pods whose name starts with `prefix`.
    async fn running_pods_by_prefix(&self, namespace: &str, prefix: &str) -> Result<usize>;

    /// The name of the first deployment in `namespace` whose name starts with `prefix`.
    async fn deployment_name_by_prefix(
        &self,
        namespace: &str,
        prefix: &str,
    ) -> Result<Option<String>> {
        Ok(self
            .deployment_names_by_prefix(namespace, prefix)
            .await?
            .into_iter()
            .next())
    }

    /// Wait until a deployment named with `prefix` exists and return its name.
    async fn wait_for_deployment(
        &self,
        namespace: &str,
        prefix: &str,
        polling: Polling,
    ) -> Result<String> {
        let what = format!("deployment with prefix '{}'", prefix);
        wait_for(&what, namespace, polling, move || async move {
            Ok(self.deployment_name_by_prefix(namespace, prefix).await?.is_some())
        })
        .await?;
        self.deployment_name_by_prefix(namespace, prefix)
            .await?
            .context(error::MissingFieldSnafu {
                field: prefix,
                what: "deployments",
            })
    }

    /// Wait until deployment `name` and its pods are ready.
    async fn wait_for_deployment_ready(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
        polling: Polling,
    ) -> Result<()> {
        info!("Waiting for deployment '{}' in namespace '{}'", name, namespace);
        let what = format!("deployment '{}' to be ready", name);
        wait_for(&what, namespace, polling, move || async move {
            self.is_deployment_ready(namespace, name, replicas).await
        })
        .await?;
        info!("Deployment '{}' in namespace '{}' is ready", name, namespace);
        Ok(())
    }

    /// Wait until deployment `name` is gone.
    async fn wait_for_deployment_deletion(
        &self,
        namespace: &str,
        name: &str,
        polling: Polling,
    ) -> Result<()> {
        let what = format!("deletion of deployment '{}'", name);
        wait_for(&what, namespace, polling, move || async move {
            Ok(!self.deployment_exists(namespace, name).await?)
        })
        .await
    }
}

/// A [`DeploymentWaiter`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeDeploymentWaiter {
    client: Client,
}

impl KubeDeploymentWaiter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Create a `KubeDeploymentWaiter` from the path to a kubeconfig file.
    pub async fn new_from_kubeconfig_path(kubeconfig_path: &Path) -> Result<Self> {
        let kubeconfig = Kubeconfig::read_from(kubeconfig_path).context(error::ConfigReadSnafu)?;
        let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .context(error::ClientCreateKubeconfigSnafu)?;
        Ok(Self::new(config.try_into().context(error::KubeSnafu {
            action: "create client from `Kubeconfig`",
        })?))
    }

    /// Create a `KubeDeploymentWaiter` using the default `kube::Client`.
    pub async fn try_default() -> Result<Self> {
        Ok(Self::new(Client::try_default().await.context(
            error::KubeSnafu {
                action: "create default client",
            },
        )?))
    }

    fn deployments(&self, namespace: &str) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl DeploymentWaiter for KubeDeploymentWaiter {
    async fn deployment_names_by_prefix(
        &self,
        namespace: &str,
        prefix: &str,
    ) -> Result<Vec<String>> {
        let deployments = self
            .deployments(namespace)
            .list(&ListParams::default())
            .await
            .context(error::KubeSnafu {
                action: "list deployments",
            })?;
        Ok(deployments
            .into_iter()
            .map(|deployment| deployment.name_any())
            .filter(|name| name.starts_with(prefix))
            .collect())
    }

    async fn is_deployment_ready(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<bool> {
        let deployment = match self
            .deployments(namespace)
            .get_opt(name)
            .await
            .context(error::KubeSnafu {
                action: "get deployment",
            })? {
            Some(deployment) => deployment,
            None => return Ok(false),
        };
        if !deployment_ready(&deployment, replicas) {
            debug!("Deployment '{}' is not ready yet", name);
            return Ok(false);
        }
        let params = match pod_selector(&deployment) {
            Some(selector) => ListParams::default().labels(&selector),
            None => ListParams::default(),
        };
        let pods = self
            .pods(namespace)
            .list(&params)
            .await
            .context(error::KubeSnafu { action: "list pods" })?;
        let ready = pods
            .iter()
            .filter(|pod| pod.name_any().starts_with(name))
            .filter(|pod| pod_ready(pod))
            .count();
        debug!("{} of {} pods of '{}' are ready", ready, replicas, name);
        Ok(ready >= replicas.max(0) as usize)
    }

    async fn deployment_exists(&self, namespace: &str, name: &str) -> Result<bool> {
        Ok(self
            .deployments(namespace)
            .get_opt(name)
            .await
            .context(error::KubeSnafu {
                action: "get deployment",
            })?
            .is_some())
    }

    async fn running_pods_by_prefix(&self, namespace: &str, prefix: &str) -> Result<usize> {
        let pods = self
            .pods(namespace)
            .list(&ListParams::default())
            .await
            .context(error::KubeSnafu { action: "list pods" })?;
        Ok(pods
            .iter()
            .filter(|pod| pod.name_any().starts_with(prefix))
            .filter(|pod| pod_phase(pod) == Some("Running"))
            .count())
    }
}

/// A deployment is ready when at least `replicas` replicas are updated, ready and available.
pub fn deployment_ready(deployment: &Deployment, replicas: i32) -> bool {
    let status = deployment.status.as_ref();
    let ready = status.and_then(|s| s.ready_replicas).unwrap_or(0);
    let updated = status.and_then(|s| s.updated_replicas).unwrap_or(0);
    let available = status.and_then(|s| s.available_replicas).unwrap_or(0);
    ready >= replicas && updated >= replicas && available >= replicas
}

/// A pod is ready when it is running and every container reports ready.
pub fn pod_ready(pod: &Pod) -> bool {
    if pod_phase(pod) != Some("Running") {
        return false;
    }
    pod.status
        .as_ref()
        .and_then(|status| status.container_statuses.as_ref())
        .map(|statuses| !statuses.is_empty() && statuses.iter().all(|s| s.ready))
        .unwrap_or(false)
}

fn pod_phase(pod: &Pod) -> Option<&str> {
    pod.status.as_ref()?.phase.as_deref()
}

fn pod_selector(deployment: &Deployment) -> Option<String> {
    let labels = deployment.spec.as_ref()?.selector.match_labels.as_ref()?;
    if labels.is_empty() {
        return None;
    }
    Some(
        labels
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join(","),
    )
}
